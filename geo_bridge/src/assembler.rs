use std::fmt;

use crate::error::{BridgeError, BridgeResult};
use crate::registry::{Wrapper, WrapperKind};

/// Encodes a finite double as `(S*10^(E))`.
///
/// `S` and `E` come from Rust's shortest round-trip scientific formatting,
/// so the engine parser reads back the identical value. Native exponent
/// syntax (`1e5`) is never emitted.
pub fn encode_number(value: f64) -> BridgeResult<String> {
    if !value.is_finite() {
        return Err(BridgeError::validation(
            "number",
            format!("must be finite to be sent to the engine, got {value}"),
        ));
    }
    let scientific = format!("{value:e}");
    let (significand, exponent) = scientific.split_once('e').ok_or_else(|| {
        BridgeError::InternalInvariant(format!("scientific form without exponent: {scientific}"))
    })?;
    Ok(format!("({significand}*10^({exponent}))"))
}

/// One resolved command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Label(String),
    Number(f64),
    Bool(bool),
    Text(String),
}

impl CommandArg {
    fn render(&self) -> BridgeResult<String> {
        match self {
            CommandArg::Label(label) => Ok(label.clone()),
            CommandArg::Number(value) => encode_number(*value),
            CommandArg::Bool(flag) => Ok(flag.to_string()),
            CommandArg::Text(text) => {
                let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
                Ok(format!("\"{escaped}\""))
            }
        }
    }
}

/// Engine command text, `Name[arg1,arg2,...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    text: String,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds command text. Pure: nothing is sent to the engine.
pub fn assemble(name: &str, args: &[CommandArg]) -> BridgeResult<Command> {
    let valid_name = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid_name {
        return Err(BridgeError::InternalInvariant(format!(
            "invalid command name '{name}'"
        )));
    }
    let rendered = args
        .iter()
        .map(CommandArg::render)
        .collect::<BridgeResult<Vec<_>>>()?;
    Ok(Command {
        name: name.to_string(),
        text: format!("{name}[{}]", rendered.join(",")),
    })
}

/// A script-side value offered as a command argument or operator operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Object(Wrapper),
    Number(f64),
    Bool(bool),
    Text(String),
    /// Any other script value, by type name.
    Other(&'static str),
}

impl Operand {
    pub fn describe(&self) -> String {
        match self {
            Operand::Object(wrapper) => format!("{} object", wrapper.kind()),
            Operand::Number(_) => "number".to_string(),
            Operand::Bool(_) => "boolean".to_string(),
            Operand::Text(_) => "string".to_string(),
            Operand::Other(name) => (*name).to_string(),
        }
    }
}

/// What a parameter position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    /// Host number or numeric object.
    Number,
    Kinds(&'static [WrapperKind]),
    /// Host string or text object.
    Text,
    /// Host boolean or boolean object.
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub role: &'static str,
    pub accepts: Accepts,
}

impl Param {
    pub const fn new(role: &'static str, accepts: Accepts) -> Self {
        Param { role, accepts }
    }

    fn expected(&self) -> String {
        match self.accepts {
            Accepts::Number => "a number or numeric object".to_string(),
            Accepts::Kinds(kinds) => {
                let names: Vec<&str> = kinds.iter().map(|kind| kind.tag()).collect();
                format!("a {} object", names.join(" or "))
            }
            Accepts::Text => "a string or text object".to_string(),
            Accepts::Boolean => "a boolean or boolean object".to_string(),
        }
    }
}

/// Coerces one operand for `param`: numeric objects pass their label, host
/// numbers their encoded literal, anything else is a TypeError naming the
/// parameter's role.
pub fn coerce(command: &str, param: &Param, operand: &Operand) -> BridgeResult<CommandArg> {
    let arg = match (param.accepts, operand) {
        (Accepts::Number, Operand::Object(w)) if w.kind() == WrapperKind::Numeric => {
            Some(CommandArg::Label(w.label().to_string()))
        }
        (Accepts::Number, Operand::Number(value)) => Some(CommandArg::Number(*value)),
        (Accepts::Kinds(kinds), Operand::Object(w)) if kinds.contains(&w.kind()) => {
            Some(CommandArg::Label(w.label().to_string()))
        }
        (Accepts::Text, Operand::Object(w)) if w.kind() == WrapperKind::Text => {
            Some(CommandArg::Label(w.label().to_string()))
        }
        (Accepts::Text, Operand::Text(text)) => Some(CommandArg::Text(text.clone())),
        (Accepts::Boolean, Operand::Object(w)) if w.kind() == WrapperKind::Boolean => {
            Some(CommandArg::Label(w.label().to_string()))
        }
        (Accepts::Boolean, Operand::Bool(flag)) => Some(CommandArg::Bool(*flag)),
        _ => None,
    };
    arg.ok_or_else(|| {
        BridgeError::type_error(format!(
            "{command}: argument '{}' must be {}, got {}",
            param.role,
            param.expected(),
            operand.describe()
        ))
    })
}
