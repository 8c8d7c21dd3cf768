use crate::object::{Coords, LineEq, Value};

/// Applies an affine point map to every geometric part of `value`.
///
/// Vectors only see the linear part of the map. Circle radii are multiplied
/// by `radius_scale`, which callers pass as the map's scale factor.
pub(crate) fn map_affine<F>(value: &Value, map: F, radius_scale: f64) -> Option<Value>
where
    F: Fn(Coords) -> Coords,
{
    let mapped = match value {
        Value::Point(p) => Value::Point(map(*p)),
        Value::Vector(v) => Value::Vector(map(*v).sub(map(Coords::ORIGIN))),
        Value::Line(line) => {
            if line.is_degenerate() {
                return None;
            }
            let (p, q) = line.two_points();
            Value::Line(LineEq::through(map(p), map(q)))
        }
        Value::Segment { start, end } => Value::Segment {
            start: map(*start),
            end: map(*end),
        },
        Value::Circle { center, radius } => Value::Circle {
            center: map(*center),
            radius: radius * radius_scale.abs(),
        },
        Value::Polygon { vertices } => Value::Polygon {
            vertices: vertices.iter().map(|v| map(*v)).collect(),
        },
        Value::Number { .. } | Value::Boolean { .. } | Value::Text { .. } => return None,
    };
    Some(mapped)
}

pub(crate) fn rotate_about(center: Coords, angle: f64) -> impl Fn(Coords) -> Coords {
    let (sin, cos) = angle.sin_cos();
    move |p| {
        let d = p.sub(center);
        Coords::new(
            center.x + d.x * cos - d.y * sin,
            center.y + d.x * sin + d.y * cos,
        )
    }
}

pub(crate) fn dilate_from(center: Coords, factor: f64) -> impl Fn(Coords) -> Coords {
    move |p| center.add(p.sub(center).scale(factor))
}

pub(crate) fn reflect_in_point(center: Coords) -> impl Fn(Coords) -> Coords {
    move |p| center.scale(2.0).sub(p)
}

pub(crate) fn reflect_in_line(line: LineEq) -> impl Fn(Coords) -> Coords {
    let norm = line.a * line.a + line.b * line.b;
    move |p| {
        let offset = 2.0 * (line.a * p.x + line.b * p.y - line.c) / norm;
        Coords::new(p.x - offset * line.a, p.y - offset * line.b)
    }
}

/// Shortest distance from `p` to the infinite line.
pub(crate) fn distance_to_line(p: Coords, line: LineEq) -> f64 {
    (line.a * p.x + line.b * p.y - line.c).abs() / line.a.hypot(line.b)
}

pub(crate) fn distance_to_segment(p: Coords, start: Coords, end: Coords) -> f64 {
    let d = end.sub(start);
    let len_sq = d.x * d.x + d.y * d.y;
    if len_sq == 0.0 {
        return p.distance(start);
    }
    let t = ((p.x - start.x) * d.x + (p.y - start.y) * d.y) / len_sq;
    let t = t.clamp(0.0, 1.0);
    p.distance(start.add(d.scale(t)))
}

/// Linear objects usable as intersection operands.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Curve {
    Line(LineEq),
    Segment(Coords, Coords),
    Circle(Coords, f64),
}

impl Curve {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Line(line) => Some(Curve::Line(*line)),
            Value::Segment { start, end } => Some(Curve::Segment(*start, *end)),
            Value::Circle { center, radius } => Some(Curve::Circle(*center, *radius)),
            _ => None,
        }
    }

    fn carrier(self) -> Option<LineEq> {
        match self {
            Curve::Line(line) => Some(line),
            Curve::Segment(start, end) => Some(LineEq::through(start, end)),
            Curve::Circle(..) => None,
        }
    }

    /// Whether a point already known to be on the carrier lies on the curve.
    fn contains_on_carrier(self, p: Coords) -> bool {
        match self {
            Curve::Segment(start, end) => {
                let d = end.sub(start);
                let len_sq = d.x * d.x + d.y * d.y;
                let t = ((p.x - start.x) * d.x + (p.y - start.y) * d.y) / len_sq;
                (-1e-9..=1.0 + 1e-9).contains(&t)
            }
            _ => true,
        }
    }

    fn is_circle(self) -> bool {
        matches!(self, Curve::Circle(..))
    }
}

/// Intersection points in a stable order. Pairs involving a circle always
/// yield two slots; missing intersections are undefined (NaN) points.
pub(crate) fn intersect(a: Curve, b: Curve) -> Vec<Coords> {
    let slots = if a.is_circle() || b.is_circle() { 2 } else { 1 };
    let mut points = match (a.carrier(), b.carrier()) {
        (Some(l1), Some(l2)) => line_line(l1, l2).into_iter().collect(),
        (Some(line), None) => match b {
            Curve::Circle(center, radius) => line_circle(line, center, radius),
            _ => Vec::new(),
        },
        (None, Some(line)) => match a {
            Curve::Circle(center, radius) => line_circle(line, center, radius),
            _ => Vec::new(),
        },
        (None, None) => match (a, b) {
            (Curve::Circle(c1, r1), Curve::Circle(c2, r2)) => circle_circle(c1, r1, c2, r2),
            _ => Vec::new(),
        },
    };
    for point in points.iter_mut() {
        if !(a.contains_on_carrier(*point) && b.contains_on_carrier(*point)) {
            *point = Coords::undefined();
        }
    }
    points.resize(slots, Coords::undefined());
    points
}

fn line_line(l1: LineEq, l2: LineEq) -> Option<Coords> {
    let det = l1.a * l2.b - l2.a * l1.b;
    if det == 0.0 {
        return None;
    }
    Some(Coords::new(
        (l1.c * l2.b - l2.c * l1.b) / det,
        (l1.a * l2.c - l2.a * l1.c) / det,
    ))
}

fn line_circle(line: LineEq, center: Coords, radius: f64) -> Vec<Coords> {
    let norm = line.a.hypot(line.b);
    if norm == 0.0 {
        return Vec::new();
    }
    let signed = (line.a * center.x + line.b * center.y - line.c) / norm;
    if signed.abs() > radius {
        return Vec::new();
    }
    let foot = center.sub(Coords::new(line.a, line.b).scale(signed / norm));
    let half = (radius * radius - signed * signed).max(0.0).sqrt();
    let dir = Coords::new(-line.b / norm, line.a / norm);
    vec![foot.add(dir.scale(half)), foot.sub(dir.scale(half))]
}

fn circle_circle(c1: Coords, r1: f64, c2: Coords, r2: f64) -> Vec<Coords> {
    let d = c1.distance(c2);
    if d == 0.0 || d > r1 + r2 || d < (r1 - r2).abs() {
        return Vec::new();
    }
    let along = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let half = (r1 * r1 - along * along).max(0.0).sqrt();
    let unit = c2.sub(c1).scale(1.0 / d);
    let base = c1.add(unit.scale(along));
    let perp = Coords::new(-unit.y, unit.x);
    vec![base.add(perp.scale(half)), base.sub(perp.scale(half))]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Coords, b: Coords) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn rotation_about_origin_quarter_turn() {
        let rotate = rotate_about(Coords::ORIGIN, std::f64::consts::FRAC_PI_2);
        assert!(close(rotate(Coords::new(1.0, 0.0)), Coords::new(0.0, 1.0)));
    }

    #[test]
    fn vectors_ignore_translation_part() {
        let shifted = map_affine(
            &Value::Vector(Coords::new(1.0, 1.0)),
            |p| p.add(Coords::new(5.0, 5.0)),
            1.0,
        )
        .expect("vector maps");
        assert_eq!(shifted, Value::Vector(Coords::new(1.0, 1.0)));
    }

    #[test]
    fn reflecting_in_line_is_an_involution() {
        let line = LineEq::through(Coords::new(0.0, 1.0), Coords::new(2.0, 3.0));
        let reflect = reflect_in_line(line);
        let p = Coords::new(4.0, -1.0);
        assert!(close(reflect(reflect(p)), p));
    }

    #[test]
    fn line_and_circle_meet_twice() {
        let line = Curve::Line(LineEq::through(Coords::new(-5.0, 0.0), Coords::new(5.0, 0.0)));
        let circle = Curve::Circle(Coords::ORIGIN, 2.0);
        let points = intersect(line, circle);
        assert_eq!(points.len(), 2);
        assert!(points.iter().any(|p| close(*p, Coords::new(2.0, 0.0))));
        assert!(points.iter().any(|p| close(*p, Coords::new(-2.0, 0.0))));
    }

    #[test]
    fn disjoint_segments_produce_an_undefined_point() {
        let a = Curve::Segment(Coords::new(0.0, 0.0), Coords::new(1.0, 0.0));
        let b = Curve::Segment(Coords::new(5.0, -1.0), Coords::new(5.0, 1.0));
        let points = intersect(a, b);
        assert_eq!(points.len(), 1);
        assert!(!points[0].is_finite());
    }
}
