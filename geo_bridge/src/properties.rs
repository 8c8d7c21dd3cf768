use std::fmt;
use std::ops::RangeInclusive;

use geo_construction::Rgb;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::ObjectApi;
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{Wrapper, WrapperKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    IsVisible,
    IsIndependent,
    Color,
    Size,
    LineThickness,
    X,
    Y,
    Value,
    Length,
    Area,
    Radius,
    Label,
}

impl Property {
    /// Properties common to most object types.
    pub const SHARED: [Property; 5] = [
        Property::IsVisible,
        Property::IsIndependent,
        Property::Color,
        Property::Size,
        Property::LineThickness,
    ];

    const ALL: [Property; 12] = [
        Property::IsVisible,
        Property::IsIndependent,
        Property::Color,
        Property::Size,
        Property::LineThickness,
        Property::X,
        Property::Y,
        Property::Value,
        Property::Length,
        Property::Area,
        Property::Radius,
        Property::Label,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Property::IsVisible => "is_visible",
            Property::IsIndependent => "is_independent",
            Property::Color => "color",
            Property::Size => "size",
            Property::LineThickness => "line_thickness",
            Property::X => "x",
            Property::Y => "y",
            Property::Value => "value",
            Property::Length => "length",
            Property::Area => "area",
            Property::Radius => "radius",
            Property::Label => "label",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Property::ALL.into_iter().find(|property| property.name() == name)
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Property::IsVisible
                | Property::Color
                | Property::Size
                | Property::LineThickness
                | Property::X
                | Property::Y
                | Property::Value
        )
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Script-native property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Number(_) => "number",
            PropertyValue::Text(_) => "string",
        }
    }
}

/// A validated write, ready to hand to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutation {
    Visible(bool),
    Color(Rgb),
    PointSize(u8),
    LineThickness(u8),
    X(f64),
    Y(f64),
    Number(f64),
    Boolean(bool),
}

pub const SIZE_RANGE: RangeInclusive<u8> = 1..=9;
pub const LINE_THICKNESS_RANGE: RangeInclusive<u8> = 1..=13;

/// Resolves a property name against the wrapper's capability set.
pub fn resolve(wrapper: &Wrapper, name: &str) -> BridgeResult<Property> {
    Property::from_name(name)
        .filter(|property| wrapper.kind().supports(*property))
        .ok_or_else(|| {
            BridgeError::type_error(format!("{} has no property '{name}'", wrapper.kind()))
        })
}

/// Checks type and domain of a write without touching the engine.
pub fn validate(
    wrapper: &Wrapper,
    property: Property,
    value: &PropertyValue,
) -> BridgeResult<Mutation> {
    if !wrapper.kind().supports(property) {
        return Err(BridgeError::type_error(format!(
            "{} has no property '{property}'",
            wrapper.kind()
        )));
    }
    if !property.is_writable() {
        return Err(BridgeError::type_error(format!(
            "property '{property}' is read-only"
        )));
    }
    let name = property.name();
    let mutation = match (property, value) {
        (Property::IsVisible, PropertyValue::Bool(visible)) => Mutation::Visible(*visible),
        (Property::Color, PropertyValue::Text(text)) => {
            let color = parse_color(text).ok_or_else(|| {
                BridgeError::validation(
                    name,
                    format!("must be a color name or hex triplet, got '{text}'"),
                )
            })?;
            Mutation::Color(color)
        }
        (Property::Size, PropertyValue::Number(n)) => {
            Mutation::PointSize(integer_in(name, *n, SIZE_RANGE)?)
        }
        (Property::LineThickness, PropertyValue::Number(n)) => {
            Mutation::LineThickness(integer_in(name, *n, LINE_THICKNESS_RANGE)?)
        }
        (Property::X, PropertyValue::Number(n)) => Mutation::X(finite(name, *n)?),
        (Property::Y, PropertyValue::Number(n)) => Mutation::Y(finite(name, *n)?),
        (Property::Value, PropertyValue::Bool(flag)) if wrapper.kind() == WrapperKind::Boolean => {
            Mutation::Boolean(*flag)
        }
        (Property::Value, PropertyValue::Number(n)) if wrapper.kind() == WrapperKind::Numeric => {
            Mutation::Number(finite(name, *n)?)
        }
        (property, other) => {
            return Err(BridgeError::type_error(format!(
                "property '{property}' of {} expects {}, got {}",
                wrapper.kind(),
                expected_type(wrapper, property),
                other.type_name()
            )))
        }
    };
    Ok(mutation)
}

/// Rejects value writes on derived objects. Runs before any write of a batch
/// so a derived target never leaves earlier writes applied.
pub fn check_writable(object: &ObjectApi<'_>, property: Property) -> BridgeResult<()> {
    if !matches!(property, Property::X | Property::Y | Property::Value) {
        return Ok(());
    }
    if object.is_independent()? {
        Ok(())
    } else {
        Err(BridgeError::type_error(format!(
            "property '{property}' of {} is read-only because it is derived from other objects",
            object.label()
        )))
    }
}

/// Applies a validated write. Liveness is re-checked by the facade.
pub fn apply(object: &ObjectApi<'_>, mutation: Mutation) -> BridgeResult<()> {
    match mutation {
        Mutation::Visible(visible) => object.set_visible(visible),
        Mutation::Color(color) => object.set_color(color),
        Mutation::PointSize(size) => object.set_point_size(size),
        Mutation::LineThickness(thickness) => object.set_line_thickness(thickness),
        Mutation::X(x) => {
            let (_, y) = object.coords()?;
            object.set_coords(x, y)
        }
        Mutation::Y(y) => {
            let (x, _) = object.coords()?;
            object.set_coords(x, y)
        }
        Mutation::Number(value) => object.set_numeric_value(value),
        Mutation::Boolean(value) => object.set_boolean_value(value),
    }
}

/// Reads a property through the facade.
pub fn read(
    object: &ObjectApi<'_>,
    wrapper: &Wrapper,
    property: Property,
) -> BridgeResult<PropertyValue> {
    if !wrapper.kind().supports(property) {
        return Err(BridgeError::type_error(format!(
            "{} has no property '{property}'",
            wrapper.kind()
        )));
    }
    let value = match property {
        Property::IsVisible => PropertyValue::Bool(object.is_visible()?),
        Property::IsIndependent => PropertyValue::Bool(object.is_independent()?),
        Property::Color => PropertyValue::Text(format_color(object.color()?)),
        Property::Size => PropertyValue::Number(f64::from(object.point_size()?)),
        Property::LineThickness => PropertyValue::Number(f64::from(object.line_thickness()?)),
        Property::X => PropertyValue::Number(object.coords()?.0),
        Property::Y => PropertyValue::Number(object.coords()?.1),
        Property::Value if wrapper.kind() == WrapperKind::Boolean => {
            PropertyValue::Bool(object.boolean_value()?)
        }
        Property::Value | Property::Length | Property::Area => {
            PropertyValue::Number(object.numeric_value()?)
        }
        Property::Radius => PropertyValue::Number(object.radius()?),
        Property::Label => {
            object.ensure_live()?;
            PropertyValue::Text(object.label().to_string())
        }
    };
    Ok(value)
}

fn expected_type(wrapper: &Wrapper, property: Property) -> &'static str {
    match property {
        Property::IsVisible => "a boolean",
        Property::Color => "a string",
        Property::Value if wrapper.kind() == WrapperKind::Boolean => "a boolean",
        _ => "a number",
    }
}

fn integer_in(property: &str, value: f64, range: RangeInclusive<u8>) -> BridgeResult<u8> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(BridgeError::validation(
            property,
            format!("must be an integer, got {value}"),
        ));
    }
    if value < f64::from(*range.start()) || value > f64::from(*range.end()) {
        return Err(BridgeError::validation(
            property,
            format!(
                "must be between {} and {}, got {value}",
                range.start(),
                range.end()
            ),
        ));
    }
    Ok(value as u8)
}

fn finite(property: &str, value: f64) -> BridgeResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BridgeError::validation(
            property,
            format!("must be a finite number, got {value}"),
        ))
    }
}

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#?(?:(?P<long>[0-9a-fA-F]{6})|(?P<short>[0-9a-fA-F]{3}))$")
        .expect("hex color pattern compiles")
});

const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", Rgb::new(0x00, 0x00, 0x00)),
    ("white", Rgb::new(0xff, 0xff, 0xff)),
    ("red", Rgb::new(0xff, 0x00, 0x00)),
    ("green", Rgb::new(0x00, 0x80, 0x00)),
    ("blue", Rgb::new(0x00, 0x00, 0xff)),
    ("yellow", Rgb::new(0xff, 0xff, 0x00)),
    ("cyan", Rgb::new(0x00, 0xff, 0xff)),
    ("magenta", Rgb::new(0xff, 0x00, 0xff)),
    ("orange", Rgb::new(0xff, 0x7f, 0x00)),
    ("purple", Rgb::new(0x80, 0x00, 0x80)),
    ("grey", Rgb::new(0x80, 0x80, 0x80)),
    ("gray", Rgb::new(0x80, 0x80, 0x80)),
    ("brown", Rgb::new(0x99, 0x33, 0x00)),
    ("pink", Rgb::new(0xff, 0xc0, 0xcb)),
];

/// Accepts a color name (case-insensitive) or a `#rrggbb`, `rrggbb` or
/// `#rgb` hex triplet.
pub fn parse_color(text: &str) -> Option<Rgb> {
    let trimmed = text.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lowered) {
        return Some(*rgb);
    }
    let captures = HEX_COLOR.captures(trimmed)?;
    if let Some(long) = captures.name("long") {
        let digits = long.as_str();
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        return Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?));
    }
    let short = captures.name("short")?.as_str();
    let channel = |i: usize| u8::from_str_radix(&short[i..i + 1], 16).ok().map(|v| v * 17);
    Some(Rgb::new(channel(0)?, channel(1)?, channel(2)?))
}

pub fn format_color(color: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Wrapper {
        Wrapper::new("A", WrapperKind::Point, 1)
    }

    #[test]
    fn size_outside_one_to_nine_fails_validation() {
        for bad in [0.0, 10.0, -3.0] {
            let err = validate(&point(), Property::Size, &PropertyValue::Number(bad)).unwrap_err();
            assert!(matches!(err, BridgeError::Validation { .. }), "{bad}: {err}");
        }
        for good in 1..=9u8 {
            let value = PropertyValue::Number(f64::from(good));
            let mutation = validate(&point(), Property::Size, &value).unwrap();
            assert_eq!(mutation, Mutation::PointSize(good));
        }
    }

    #[test]
    fn fractional_sizes_are_rejected() {
        let err =
            validate(&point(), Property::LineThickness, &PropertyValue::Number(2.5)).unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }));
    }

    #[test]
    fn wrong_value_types_are_type_errors() {
        let err = validate(&point(), Property::IsVisible, &PropertyValue::Number(1.0)).unwrap_err();
        assert!(matches!(err, BridgeError::Type(_)));
        let err =
            validate(&point(), Property::IsIndependent, &PropertyValue::Bool(true)).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn capabilities_limit_properties() {
        let text = Wrapper::new("t", WrapperKind::Text, 1);
        assert!(resolve(&text, "size").is_err());
        assert_eq!(resolve(&text, "color").unwrap(), Property::Color);
        assert!(resolve(&point(), "radius").is_err());
        assert!(resolve(&point(), "nonsense").is_err());
    }

    #[test]
    fn colors_parse_names_and_hex_triplets() {
        assert_eq!(parse_color("Red"), Some(Rgb::new(255, 0, 0)));
        assert_eq!(parse_color("#00ff7f"), Some(Rgb::new(0, 255, 127)));
        assert_eq!(parse_color("102030"), Some(Rgb::new(0x10, 0x20, 0x30)));
        assert_eq!(parse_color("#0f8"), Some(Rgb::new(0x00, 0xff, 0x88)));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("chartreuse-ish"), None);
        assert_eq!(format_color(Rgb::new(0, 255, 127)), "#00FF7F");
    }
}
