use crate::error::EngineError;
use crate::object::{polygon_area, Coords, LineEq, Value};
use crate::transform::{
    dilate_from, distance_to_line, distance_to_segment, intersect, map_affine, reflect_in_line,
    reflect_in_point, rotate_about, Curve,
};

/// Commands the construction handles itself because they act on labels
/// rather than values.
pub const STRUCTURAL_COMMANDS: [&str; 2] = ["Delete", "CopyFreeObject"];

/// Evaluates a command on already-evaluated arguments.
pub fn apply(name: &str, args: Vec<Value>) -> Result<Vec<Value>, EngineError> {
    let single = |value: Value| -> Result<Vec<Value>, EngineError> { Ok(vec![value]) };
    match name {
        "Point" => match args.as_slice() {
            [Value::Number { value: x }, Value::Number { value: y }] => {
                single(Value::Point(Coords::new(*x, *y)))
            }
            [Value::Point(p)] => single(Value::Point(*p)),
            _ => Err(usage(name, "Point[ <x>, <y> ]")),
        },
        "Vector" => match args.as_slice() {
            [Value::Number { value: x }, Value::Number { value: y }] => {
                single(Value::Vector(Coords::new(*x, *y)))
            }
            [Value::Point(start), Value::Point(end)] => single(Value::Vector(end.sub(*start))),
            [Value::Point(p)] => single(Value::Vector(*p)),
            _ => Err(usage(name, "Vector[ <x>, <y> ] or Vector[ <Start Point>, <End Point> ]")),
        },
        "Line" => match args.as_slice() {
            [Value::Point(p), Value::Point(q)] => {
                if p == q {
                    return Err(EngineError::invalid_arguments(name, "points coincide"));
                }
                single(Value::Line(LineEq::through(*p, *q)))
            }
            [Value::Point(p), Value::Vector(d)] => {
                single(Value::Line(LineEq::through(*p, p.add(*d))))
            }
            _ => Err(usage(name, "Line[ <Point>, <Point> ]")),
        },
        "Segment" => match args.as_slice() {
            [Value::Point(start), Value::Point(end)] => single(Value::Segment {
                start: *start,
                end: *end,
            }),
            _ => Err(usage(name, "Segment[ <Point>, <Point> ]")),
        },
        "Circle" => match args.as_slice() {
            [Value::Point(center), Value::Number { value: radius }] => {
                if *radius < 0.0 {
                    return Err(EngineError::invalid_arguments(name, "radius must not be negative"));
                }
                single(Value::Circle {
                    center: *center,
                    radius: *radius,
                })
            }
            [Value::Point(center), Value::Point(through)] => single(Value::Circle {
                center: *center,
                radius: center.distance(*through),
            }),
            _ => Err(usage(name, "Circle[ <Center>, <Radius or Point> ]")),
        },
        "Polygon" => {
            let vertices = args
                .iter()
                .map(Value::as_point)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| usage(name, "Polygon[ <Point>, ..., <Point> ]"))?;
            if vertices.len() < 3 {
                return Err(EngineError::invalid_arguments(name, "needs at least three vertices"));
            }
            single(Value::Polygon { vertices })
        }
        "Midpoint" => match args.as_slice() {
            [Value::Point(p), Value::Point(q)] => single(Value::Point(p.add(*q).scale(0.5))),
            [Value::Segment { start, end }] => single(Value::Point(start.add(*end).scale(0.5))),
            _ => Err(usage(name, "Midpoint[ <Point>, <Point> ] or Midpoint[ <Segment> ]")),
        },
        "Distance" => match args.as_slice() {
            [Value::Point(p), Value::Point(q)] => single(Value::number(p.distance(*q))),
            [Value::Point(p), Value::Line(line)] | [Value::Line(line), Value::Point(p)] => {
                single(Value::number(distance_to_line(*p, *line)))
            }
            [Value::Point(p), Value::Segment { start, end }] => {
                single(Value::number(distance_to_segment(*p, *start, *end)))
            }
            _ => Err(usage(name, "Distance[ <Point>, <Object> ]")),
        },
        "Area" => match args.as_slice() {
            [Value::Polygon { vertices }] => single(Value::number(polygon_area(vertices))),
            [Value::Circle { radius, .. }] => {
                single(Value::number(std::f64::consts::PI * radius * radius))
            }
            _ => Err(usage(name, "Area[ <Polygon or Circle> ]")),
        },
        "Radius" => match args.as_slice() {
            [Value::Circle { radius, .. }] => single(Value::number(*radius)),
            _ => Err(usage(name, "Radius[ <Circle> ]")),
        },
        "Rotate" => {
            let (object, angle, center) = match args.as_slice() {
                [object, Value::Number { value: angle }] => (object, *angle, Coords::ORIGIN),
                [object, Value::Number { value: angle }, Value::Point(center)] => {
                    (object, *angle, *center)
                }
                _ => return Err(usage(name, "Rotate[ <Object>, <Angle>, <Point> ]")),
            };
            transformed(name, object, rotate_about(center, angle), 1.0)
        }
        "Translate" => match args.as_slice() {
            [object, Value::Vector(shift)] => {
                let shift = *shift;
                transformed(name, object, move |p| p.add(shift), 1.0)
            }
            _ => Err(usage(name, "Translate[ <Object>, <Vector> ]")),
        },
        "Reflect" => match args.as_slice() {
            [object, Value::Point(center)] => {
                transformed(name, object, reflect_in_point(*center), 1.0)
            }
            [object, Value::Line(line)] => transformed(name, object, reflect_in_line(*line), 1.0),
            [object, Value::Segment { start, end }] => transformed(
                name,
                object,
                reflect_in_line(LineEq::through(*start, *end)),
                1.0,
            ),
            _ => Err(usage(name, "Reflect[ <Object>, <Point or Line> ]")),
        },
        "Dilate" => {
            let (object, factor, center) = match args.as_slice() {
                [object, Value::Number { value: factor }] => (object, *factor, Coords::ORIGIN),
                [object, Value::Number { value: factor }, Value::Point(center)] => {
                    (object, *factor, *center)
                }
                _ => return Err(usage(name, "Dilate[ <Object>, <Factor>, <Point> ]")),
            };
            transformed(name, object, dilate_from(center, factor), factor)
        }
        "Intersect" => match args.as_slice() {
            [a, b] => {
                let (Some(a), Some(b)) = (Curve::from_value(a), Curve::from_value(b)) else {
                    return Err(usage(name, "Intersect[ <Object>, <Object> ]"));
                };
                Ok(intersect(a, b).into_iter().map(Value::Point).collect())
            }
            _ => Err(usage(name, "Intersect[ <Object>, <Object> ]")),
        },
        "Number" => match args.as_slice() {
            [Value::Number { value }] => single(Value::number(*value)),
            _ => Err(usage(name, "Number[ <Number> ]")),
        },
        "Boolean" => match args.as_slice() {
            [Value::Boolean { value }] => single(Value::boolean(*value)),
            _ => Err(usage(name, "Boolean[ <Boolean> ]")),
        },
        "Text" => match args.as_slice() {
            [Value::Text { text }] => single(Value::Text { text: text.clone() }),
            [other] => single(Value::Text {
                text: other.to_string(),
            }),
            _ => Err(usage(name, "Text[ <Object> ]")),
        },
        _ if STRUCTURAL_COMMANDS.contains(&name) => Err(EngineError::invalid_arguments(
            name,
            "must be used on its own, not inside an expression",
        )),
        _ => Err(EngineError::UnknownCommand(name.to_string())),
    }
}

fn transformed<F>(
    name: &str,
    object: &Value,
    map: F,
    radius_scale: f64,
) -> Result<Vec<Value>, EngineError>
where
    F: Fn(Coords) -> Coords,
{
    map_affine(object, map, radius_scale)
        .map(|value| vec![value])
        .ok_or_else(|| {
            EngineError::invalid_arguments(
                name,
                format!("cannot transform {}", object.object_type()),
            )
        })
}

fn usage(name: &str, syntax: &str) -> EngineError {
    EngineError::invalid_arguments(name, format!("illegal arguments, expected {syntax}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_keep_the_input_type() {
        let segment = Value::Segment {
            start: Coords::new(0.0, 0.0),
            end: Coords::new(1.0, 0.0),
        };
        for (command, extra) in [
            ("Rotate", vec![Value::number(1.0)]),
            ("Translate", vec![Value::Vector(Coords::new(1.0, 1.0))]),
            ("Reflect", vec![Value::Point(Coords::new(2.0, 2.0))]),
            ("Dilate", vec![Value::number(3.0)]),
        ] {
            let mut args = vec![segment.clone()];
            args.extend(extra);
            let out = apply(command, args).expect(command);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].object_type(), segment.object_type(), "{command}");
        }
    }

    #[test]
    fn dilate_scales_circle_radius() {
        let circle = Value::Circle {
            center: Coords::new(1.0, 1.0),
            radius: 2.0,
        };
        let out = apply("Dilate", vec![circle, Value::number(-3.0)]).expect("dilated");
        assert_eq!(
            out[0],
            Value::Circle {
                center: Coords::new(-3.0, -3.0),
                radius: 6.0
            }
        );
    }

    #[test]
    fn structural_commands_refuse_nested_use() {
        let err = apply("Delete", vec![Value::number(1.0)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments { .. }));
        assert!(matches!(
            apply("Frobnicate", Vec::new()),
            Err(EngineError::UnknownCommand(_))
        ));
    }

    #[test]
    fn text_renders_non_text_arguments() {
        let out = apply("Text", vec![Value::number(2.5)]).expect("text");
        assert_eq!(
            out[0],
            Value::Text {
                text: "2.5".to_string()
            }
        );
    }
}
