use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("undefined variable {0}")]
    UnknownLabel(String),
    #[error("{command}: {message}")]
    InvalidArguments { command: String, message: String },
    #[error("{0}")]
    Evaluation(String),
    #[error("label {0} is already in use")]
    LabelInUse(String),
    #[error("{0} is not a free object")]
    NotFree(String),
    #[error("{label} has no {attribute}")]
    MissingAttribute {
        label: String,
        attribute: &'static str,
    },
    #[error("{0} is undefined")]
    Undefined(String),
    #[error("{attribute} {value} is out of range for {label}")]
    AttributeRange {
        label: String,
        attribute: &'static str,
        value: i64,
    },
}

impl EngineError {
    pub(crate) fn invalid_arguments(command: &str, message: impl Into<String>) -> Self {
        EngineError::InvalidArguments {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
