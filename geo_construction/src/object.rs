use std::fmt;

use serde::Serialize;

use crate::expr::Expr;

/// Classification the engine reports for every live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
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

impl ObjectType {
    pub const ALL: [ObjectType; 9] = [
        ObjectType::Point,
        ObjectType::Vector,
        ObjectType::Line,
        ObjectType::Segment,
        ObjectType::Circle,
        ObjectType::Polygon,
        ObjectType::Numeric,
        ObjectType::Boolean,
        ObjectType::Text,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            ObjectType::Point => "point",
            ObjectType::Vector => "vector",
            ObjectType::Line => "line",
            ObjectType::Segment => "segment",
            ObjectType::Circle => "circle",
            ObjectType::Polygon => "polygon",
            ObjectType::Numeric => "numeric",
            ObjectType::Boolean => "boolean",
            ObjectType::Text => "text",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        ObjectType::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
    }

    /// Points and vectors get upper-case labels, everything else lower-case.
    pub(crate) fn uses_upper_case_labels(self) -> bool {
        matches!(self, ObjectType::Point | ObjectType::Vector)
    }

    fn default_color(self) -> Rgb {
        match self {
            ObjectType::Point => Rgb::new(0x15, 0x65, 0xc0),
            ObjectType::Vector | ObjectType::Line | ObjectType::Segment => {
                Rgb::new(0x1a, 0x1a, 0x1a)
            }
            ObjectType::Circle | ObjectType::Polygon => Rgb::new(0x99, 0x33, 0x00),
            ObjectType::Numeric | ObjectType::Boolean | ObjectType::Text => Rgb::new(0, 0, 0),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub const POINT_SIZE_RANGE: std::ops::RangeInclusive<u8> = 1..=9;
pub const LINE_THICKNESS_RANGE: std::ops::RangeInclusive<u8> = 1..=13;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub visible: bool,
    pub color: Rgb,
    pub point_size: u8,
    pub line_thickness: u8,
}

impl Style {
    pub fn for_type(kind: ObjectType) -> Self {
        Style {
            visible: true,
            color: kind.default_color(),
            point_size: 5,
            line_thickness: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
}

impl Coords {
    pub const ORIGIN: Coords = Coords { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn undefined() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn add(self, other: Coords) -> Coords {
        Coords::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Coords) -> Coords {
        Coords::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f64) -> Coords {
        Coords::new(self.x * factor, self.y * factor)
    }

    pub fn distance(self, other: Coords) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Line in implicit form `a*x + b*y = c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineEq {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LineEq {
    pub fn through(p: Coords, q: Coords) -> Self {
        let a = p.y - q.y;
        let b = q.x - p.x;
        LineEq {
            a,
            b,
            c: a * p.x + b * p.y,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.a == 0.0 && self.b == 0.0
    }

    /// Two distinct points on the line: the foot of the origin and one step
    /// along the direction vector.
    pub fn two_points(&self) -> (Coords, Coords) {
        let norm = self.a * self.a + self.b * self.b;
        let foot = Coords::new(self.a * self.c / norm, self.b * self.c / norm);
        (foot, foot.add(Coords::new(-self.b, self.a)))
    }
}

/// Engine-side value of an object or of an evaluated expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Point(Coords),
    Vector(Coords),
    Line(LineEq),
    Segment { start: Coords, end: Coords },
    Circle { center: Coords, radius: f64 },
    Polygon { vertices: Vec<Coords> },
    Number { value: f64 },
    Boolean { value: bool },
    Text { text: String },
}

impl Value {
    pub fn number(value: f64) -> Self {
        Value::Number { value }
    }

    pub fn boolean(value: bool) -> Self {
        Value::Boolean { value }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Value::Point(_) => ObjectType::Point,
            Value::Vector(_) => ObjectType::Vector,
            Value::Line(_) => ObjectType::Line,
            Value::Segment { .. } => ObjectType::Segment,
            Value::Circle { .. } => ObjectType::Circle,
            Value::Polygon { .. } => ObjectType::Polygon,
            Value::Number { .. } => ObjectType::Numeric,
            Value::Boolean { .. } => ObjectType::Boolean,
            Value::Text { .. } => ObjectType::Text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Coords> {
        match self {
            Value::Point(coords) => Some(*coords),
            _ => None,
        }
    }

    /// Scalar measure the engine reports as an object's value.
    pub fn measure(&self) -> Option<f64> {
        match self {
            Value::Number { value } => Some(*value),
            Value::Boolean { value } => Some(if *value { 1.0 } else { 0.0 }),
            Value::Segment { start, end } => Some(start.distance(*end)),
            Value::Polygon { vertices } => Some(polygon_area(vertices)),
            _ => None,
        }
    }
}

pub(crate) fn polygon_area(vertices: &[Coords]) -> f64 {
    let mut twice_area = 0.0;
    for (index, current) in vertices.iter().enumerate() {
        let next = vertices[(index + 1) % vertices.len()];
        twice_area += current.x * next.y - next.x * current.y;
    }
    (twice_area / 2.0).abs()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Point(p) => write!(f, "({}, {})", p.x, p.y),
            Value::Vector(v) => write!(f, "Vector[{}, {}]", v.x, v.y),
            Value::Line(line) => write!(f, "{}x + {}y = {}", line.a, line.b, line.c),
            Value::Segment { start, end } => write!(
                f,
                "Segment[({}, {}), ({}, {})]",
                start.x, start.y, end.x, end.y
            ),
            Value::Circle { center, radius } => {
                write!(f, "Circle[({}, {}), {}]", center.x, center.y, radius)
            }
            Value::Polygon { vertices } => {
                let parts: Vec<String> = vertices
                    .iter()
                    .map(|v| format!("({}, {})", v.x, v.y))
                    .collect();
                write!(f, "Polygon[{}]", parts.join(", "))
            }
            Value::Number { value } => write!(f, "{value}"),
            Value::Boolean { value } => write!(f, "{value}"),
            Value::Text { text } => write!(f, "\"{text}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Free,
    Derived {
        expr: Expr,
        output: usize,
        dependencies: Vec<String>,
    },
}

impl Definition {
    pub fn depends_on(&self, label: &str) -> bool {
        match self {
            Definition::Free => false,
            Definition::Derived { dependencies, .. } => {
                dependencies.iter().any(|dep| dep == label)
            }
        }
    }
}

/// One live object of the construction.
#[derive(Debug, Clone)]
pub struct GeoObject {
    pub label: String,
    /// Creation serial, unique for the lifetime of the construction. A label
    /// can be reused after a delete; the serial never is.
    pub serial: u64,
    pub object_type: ObjectType,
    /// `None` while the object is undefined (a failed recomputation).
    pub value: Option<Value>,
    pub style: Style,
    pub definition: Definition,
}

impl GeoObject {
    pub fn is_independent(&self) -> bool {
        matches!(self.definition, Definition::Free)
    }
}
