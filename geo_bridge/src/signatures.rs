use crate::assembler::{coerce, Accepts, CommandArg, Operand, Param};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::WrapperKind;

const POINT: Accepts = Accepts::Kinds(&[WrapperKind::Point]);
const VECTOR: Accepts = Accepts::Kinds(&[WrapperKind::Vector]);
const SEGMENT: Accepts = Accepts::Kinds(&[WrapperKind::Segment]);
const GEOMETRIC: Accepts = Accepts::Kinds(WrapperKind::GEOMETRIC);
const MIRROR: Accepts =
    Accepts::Kinds(&[WrapperKind::Point, WrapperKind::Line, WrapperKind::Segment]);
const CURVE: Accepts =
    Accepts::Kinds(&[WrapperKind::Line, WrapperKind::Segment, WrapperKind::Circle]);

/// One accepted argument list. A variadic form repeats its last parameter.
#[derive(Debug, Clone, Copy)]
pub struct Form {
    pub params: &'static [Param],
    pub variadic: bool,
}

impl Form {
    const fn fixed(params: &'static [Param]) -> Self {
        Form {
            params,
            variadic: false,
        }
    }

    fn accepts_count(&self, count: usize) -> bool {
        if self.variadic {
            count >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    fn param(&self, index: usize) -> &Param {
        let last = self.params.len() - 1;
        &self.params[index.min(last)]
    }
}

/// Script-callable engine command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSignature {
    pub name: &'static str,
    pub forms: &'static [Form],
    /// Commands that report several labels return them as a list.
    pub multiple_outputs: bool,
}

impl CommandSignature {
    const fn single(name: &'static str, forms: &'static [Form]) -> Self {
        CommandSignature {
            name,
            forms,
            multiple_outputs: false,
        }
    }

    /// Coerces operands against the first form whose arity matches and
    /// whose parameters all accept their operands.
    pub fn bind(&self, operands: &[Operand]) -> BridgeResult<Vec<CommandArg>> {
        let mut first_error = None;
        for form in self.forms.iter().filter(|form| form.accepts_count(operands.len())) {
            let bound = operands
                .iter()
                .enumerate()
                .map(|(index, operand)| coerce(self.name, form.param(index), operand))
                .collect::<BridgeResult<Vec<_>>>();
            match bound {
                Ok(args) => return Ok(args),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| {
            BridgeError::type_error(format!(
                "{} does not take {} argument(s); expected {}",
                self.name,
                operands.len(),
                self.usage()
            ))
        }))
    }

    pub fn usage(&self) -> String {
        let forms: Vec<String> = self
            .forms
            .iter()
            .map(|form| {
                let mut roles: Vec<&str> = form.params.iter().map(|param| param.role).collect();
                if form.variadic {
                    roles.push("...");
                }
                format!("{}({})", self.name, roles.join(", "))
            })
            .collect();
        forms.join(" or ")
    }
}

pub const SIGNATURES: &[CommandSignature] = &[
    CommandSignature::single(
        "Point",
        &[Form::fixed(&[
            Param::new("x", Accepts::Number),
            Param::new("y", Accepts::Number),
        ])],
    ),
    CommandSignature::single(
        "Vector",
        &[
            Form::fixed(&[
                Param::new("x", Accepts::Number),
                Param::new("y", Accepts::Number),
            ]),
            Form::fixed(&[Param::new("start", POINT), Param::new("end", POINT)]),
        ],
    ),
    CommandSignature::single(
        "Line",
        &[
            Form::fixed(&[Param::new("first point", POINT), Param::new("second point", POINT)]),
            Form::fixed(&[Param::new("point", POINT), Param::new("direction", VECTOR)]),
        ],
    ),
    CommandSignature::single(
        "Segment",
        &[Form::fixed(&[Param::new("start", POINT), Param::new("end", POINT)])],
    ),
    CommandSignature::single(
        "Circle",
        &[
            Form::fixed(&[Param::new("center", POINT), Param::new("radius", Accepts::Number)]),
            Form::fixed(&[Param::new("center", POINT), Param::new("point on circle", POINT)]),
        ],
    ),
    CommandSignature::single(
        "Polygon",
        &[Form {
            params: &[
                Param::new("vertex", POINT),
                Param::new("vertex", POINT),
                Param::new("vertex", POINT),
            ],
            variadic: true,
        }],
    ),
    CommandSignature::single("Number", &[Form::fixed(&[Param::new("value", Accepts::Number)])]),
    CommandSignature::single("Boolean", &[Form::fixed(&[Param::new("value", Accepts::Boolean)])]),
    CommandSignature::single("Text", &[Form::fixed(&[Param::new("text", Accepts::Text)])]),
    CommandSignature::single(
        "Midpoint",
        &[
            Form::fixed(&[Param::new("first point", POINT), Param::new("second point", POINT)]),
            Form::fixed(&[Param::new("segment", SEGMENT)]),
        ],
    ),
    CommandSignature::single(
        "Distance",
        &[Form::fixed(&[
            Param::new("point", POINT),
            Param::new("object", MIRROR),
        ])],
    ),
    CommandSignature::single(
        "Rotate",
        &[
            Form::fixed(&[Param::new("object", GEOMETRIC), Param::new("angle", Accepts::Number)]),
            Form::fixed(&[
                Param::new("object", GEOMETRIC),
                Param::new("angle", Accepts::Number),
                Param::new("center", POINT),
            ]),
        ],
    ),
    CommandSignature::single(
        "Translate",
        &[Form::fixed(&[Param::new("object", GEOMETRIC), Param::new("vector", VECTOR)])],
    ),
    CommandSignature::single(
        "Reflect",
        &[Form::fixed(&[Param::new("object", GEOMETRIC), Param::new("mirror", MIRROR)])],
    ),
    CommandSignature::single(
        "Dilate",
        &[
            Form::fixed(&[Param::new("object", GEOMETRIC), Param::new("factor", Accepts::Number)]),
            Form::fixed(&[
                Param::new("object", GEOMETRIC),
                Param::new("factor", Accepts::Number),
                Param::new("center", POINT),
            ]),
        ],
    ),
    CommandSignature {
        name: "Intersect",
        forms: &[Form::fixed(&[
            Param::new("first object", CURVE),
            Param::new("second object", CURVE),
        ])],
        multiple_outputs: true,
    },
];

pub fn signature(name: &str) -> Option<&'static CommandSignature> {
    SIGNATURES.iter().find(|signature| signature.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Wrapper;

    fn object(label: &str, kind: WrapperKind) -> Operand {
        Operand::Object(Wrapper::new(label, kind, 1))
    }

    #[test]
    fn overloads_pick_the_matching_form() {
        let vector = signature("Vector").unwrap();
        let args = vector
            .bind(&[object("A", WrapperKind::Point), object("B", WrapperKind::Point)])
            .unwrap();
        assert_eq!(args, vec![CommandArg::Label("A".into()), CommandArg::Label("B".into())]);
        let args = vector.bind(&[Operand::Number(1.0), Operand::Number(2.0)]).unwrap();
        assert_eq!(args, vec![CommandArg::Number(1.0), CommandArg::Number(2.0)]);
    }

    #[test]
    fn polygon_takes_three_or_more_vertices() {
        let polygon = signature("Polygon").unwrap();
        let vertices: Vec<Operand> = ["A", "B", "C", "D"]
            .iter()
            .map(|label| object(label, WrapperKind::Point))
            .collect();
        assert_eq!(polygon.bind(&vertices).unwrap().len(), 4);
        let err = polygon.bind(&vertices[..2]).unwrap_err();
        assert!(err.to_string().contains("Polygon(vertex, vertex, vertex, ...)"), "{err}");
    }

    #[test]
    fn wrong_kinds_report_the_role() {
        let rotate = signature("Rotate").unwrap();
        let err = rotate
            .bind(&[Operand::Number(1.0), Operand::Number(2.0)])
            .unwrap_err();
        assert!(err.to_string().contains("'object'"), "{err}");
        assert!(signature("Frobnicate").is_none());
    }
}
