use std::collections::HashMap;
use std::fmt;

use crate::engine::Facade;
use crate::error::{BridgeError, BridgeResult};
use crate::properties::Property;

/// Capability family a wrapper exposes, chosen from the engine's type tag
/// when the wrapper is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    Point,
    Vector,
    Line,
    Segment,
    Circle,
    Polygon,
    Numeric,
    Boolean,
    Text,
}

const POINT_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Size,
    Property::LineThickness,
    Property::X,
    Property::Y,
    Property::Label,
];

const LINE_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Size,
    Property::LineThickness,
    Property::Label,
];

const SEGMENT_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Size,
    Property::LineThickness,
    Property::Length,
    Property::Label,
];

const CIRCLE_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Size,
    Property::LineThickness,
    Property::Radius,
    Property::Label,
];

const POLYGON_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Size,
    Property::LineThickness,
    Property::Area,
    Property::Label,
];

const VALUE_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Size,
    Property::LineThickness,
    Property::Value,
    Property::Label,
];

const TEXT_PROPERTIES: &[Property] = &[
    Property::IsVisible,
    Property::IsIndependent,
    Property::Color,
    Property::Label,
];

impl WrapperKind {
    pub const ALL: [WrapperKind; 9] = [
        WrapperKind::Point,
        WrapperKind::Vector,
        WrapperKind::Line,
        WrapperKind::Segment,
        WrapperKind::Circle,
        WrapperKind::Polygon,
        WrapperKind::Numeric,
        WrapperKind::Boolean,
        WrapperKind::Text,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            WrapperKind::Point => "point",
            WrapperKind::Vector => "vector",
            WrapperKind::Line => "line",
            WrapperKind::Segment => "segment",
            WrapperKind::Circle => "circle",
            WrapperKind::Polygon => "polygon",
            WrapperKind::Numeric => "numeric",
            WrapperKind::Boolean => "boolean",
            WrapperKind::Text => "text",
        }
    }

    pub fn capabilities(self) -> &'static [Property] {
        match self {
            WrapperKind::Point | WrapperKind::Vector => POINT_PROPERTIES,
            WrapperKind::Line => LINE_PROPERTIES,
            WrapperKind::Segment => SEGMENT_PROPERTIES,
            WrapperKind::Circle => CIRCLE_PROPERTIES,
            WrapperKind::Polygon => POLYGON_PROPERTIES,
            WrapperKind::Numeric | WrapperKind::Boolean => VALUE_PROPERTIES,
            WrapperKind::Text => TEXT_PROPERTIES,
        }
    }

    pub fn supports(self, property: Property) -> bool {
        self.capabilities().contains(&property)
    }

    /// Kinds that can be moved by Rotate, Translate, Reflect and Dilate.
    pub const GEOMETRIC: &'static [WrapperKind] = &[
        WrapperKind::Point,
        WrapperKind::Vector,
        WrapperKind::Line,
        WrapperKind::Segment,
        WrapperKind::Circle,
        WrapperKind::Polygon,
    ];
}

impl fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Script-side handle for one engine object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper {
    label: String,
    kind: WrapperKind,
    serial: u64,
}

impl Wrapper {
    pub fn new(label: impl Into<String>, kind: WrapperKind, serial: u64) -> Self {
        Wrapper {
            label: label.into(),
            kind,
            serial,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Creation serial of the wrapped object. A later object that reuses the
    /// label has a different one.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn kind(&self) -> WrapperKind {
        self.kind
    }

    pub fn capabilities(&self) -> &'static [Property] {
        self.kind.capabilities()
    }
}

impl fmt::Display for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.label)
    }
}

pub type WrapperConstructor = fn(&str, u64) -> Wrapper;

fn wrap_point(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Point, serial)
}

fn wrap_vector(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Vector, serial)
}

fn wrap_line(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Line, serial)
}

fn wrap_segment(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Segment, serial)
}

fn wrap_circle(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Circle, serial)
}

fn wrap_polygon(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Polygon, serial)
}

fn wrap_numeric(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Numeric, serial)
}

fn wrap_boolean(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Boolean, serial)
}

fn wrap_text(label: &str, serial: u64) -> Wrapper {
    Wrapper::new(label, WrapperKind::Text, serial)
}

/// Engine type tag to wrapper constructor.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    constructors: HashMap<String, WrapperConstructor>,
}

impl TypeRegistry {
    /// Registry with no entries; every lookup fails until tags are added.
    pub fn empty() -> Self {
        TypeRegistry::default()
    }

    /// Registry covering every tag the construction engine reports.
    pub fn standard() -> Self {
        let mut registry = TypeRegistry::empty();
        for kind in WrapperKind::ALL {
            let constructor: WrapperConstructor = match kind {
                WrapperKind::Point => wrap_point,
                WrapperKind::Vector => wrap_vector,
                WrapperKind::Line => wrap_line,
                WrapperKind::Segment => wrap_segment,
                WrapperKind::Circle => wrap_circle,
                WrapperKind::Polygon => wrap_polygon,
                WrapperKind::Numeric => wrap_numeric,
                WrapperKind::Boolean => wrap_boolean,
                WrapperKind::Text => wrap_text,
            };
            registry.register(kind.tag(), constructor);
        }
        registry
    }

    /// Adds or replaces the constructor for `tag`.
    pub fn register(&mut self, tag: &str, constructor: WrapperConstructor) {
        self.constructors.insert(tag.to_string(), constructor);
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn wrap(&self, tag: &str, label: &str, serial: u64) -> BridgeResult<Wrapper> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| BridgeError::UnknownType {
                tag: tag.to_string(),
                label: label.to_string(),
            })?;
        Ok(constructor(label, serial))
    }

    /// Wraps a live object according to the type tag the engine reports now.
    pub fn wrap_existing(&self, facade: &Facade, label: &str) -> BridgeResult<Wrapper> {
        let tag = facade.get_object_type(label)?;
        self.wrap(&tag, label, facade.serial(label)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_construction::Construction;

    #[test]
    fn every_engine_tag_has_a_constructor() {
        let registry = TypeRegistry::standard();
        for kind in geo_construction::ObjectType::ALL {
            assert!(registry.is_registered(kind.tag()), "{kind} missing");
        }
    }

    #[test]
    fn wrapped_objects_expose_their_kind_capabilities() {
        let facade = Facade::from_engine(Construction::new());
        let registry = TypeRegistry::standard();
        for (command, kind) in [
            ("A = (1, 1)", WrapperKind::Point),
            ("B = (2, 3)", WrapperKind::Point),
            ("C = (0, 4)", WrapperKind::Point),
            ("v = Vector[A, B]", WrapperKind::Vector),
            ("f = Line[A, B]", WrapperKind::Line),
            ("poly = Polygon[A, B, C]", WrapperKind::Polygon),
            ("s = Segment[A, B]", WrapperKind::Segment),
            ("c = Circle[A, 2]", WrapperKind::Circle),
            ("n = 4", WrapperKind::Numeric),
            ("flag = true", WrapperKind::Boolean),
            ("t = \"hi\"", WrapperKind::Text),
        ] {
            let labels = facade.eval_command_get_labels(command).expect(command);
            let wrapper = registry.wrap_existing(&facade, &labels[0]).expect(command);
            assert_eq!(wrapper.kind(), kind);
            assert_eq!(wrapper.capabilities(), kind.capabilities());
        }
        let text = registry.wrap_existing(&facade, "t").unwrap();
        assert!(!text.kind().supports(Property::Size));
        let circle = registry.wrap_existing(&facade, "c").unwrap();
        assert!(circle.kind().supports(Property::Radius));
        assert!(!circle.kind().supports(Property::X));
        let line = registry.wrap_existing(&facade, "f").unwrap();
        assert!(!line.kind().supports(Property::Length));
        let polygon = registry.wrap_existing(&facade, "poly").unwrap();
        assert!(polygon.kind().supports(Property::Area));
        let vector = registry.wrap_existing(&facade, "v").unwrap();
        assert!(vector.kind().supports(Property::X));
    }

    #[test]
    fn wrappers_carry_the_creation_serial() {
        let facade = Facade::from_engine(Construction::new());
        let registry = TypeRegistry::standard();
        facade.eval_command_get_labels("A = (0, 0)").unwrap();
        let first = registry.wrap_existing(&facade, "A").unwrap();
        facade.object("A").delete().unwrap();
        facade.eval_command_get_labels("A = (0, 0)").unwrap();
        let second = registry.wrap_existing(&facade, "A").unwrap();
        assert_eq!(first.label(), second.label());
        assert_ne!(first.serial(), second.serial());
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_tags_are_recoverable_errors() {
        let facade = Facade::from_engine(Construction::new());
        facade.eval_command_get_labels("A = (0, 0)").unwrap();
        let err = TypeRegistry::empty().wrap_existing(&facade, "A").unwrap_err();
        match err {
            BridgeError::UnknownType { tag, label } => {
                assert_eq!(tag, "point");
                assert_eq!(label, "A");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn registering_a_tag_does_not_disturb_others() {
        let mut registry = TypeRegistry::empty();
        registry.register("point", wrap_point);
        assert!(registry.wrap("point", "A", 1).is_ok());
        assert!(registry.wrap("line", "f", 2).is_err());
    }
}
