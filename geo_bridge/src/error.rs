use geo_construction::EngineError;
use thiserror::Error;

/// Failures raised by bridge operations.
///
/// `Type`, `Validation` and `UnknownType` mean the script misused the API;
/// `InternalInvariant` means the bridge itself is wrong. Engine failures are
/// carried through untouched.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("TypeError: {0}")]
    Type(String),
    #[error("ValidationError: {property} {constraint}")]
    Validation { property: String, constraint: String },
    #[error("UnknownTypeError: no wrapper registered for type '{tag}' (object {label})")]
    UnknownType { tag: String, label: String },
    #[error("InternalInvariantError: {0}")]
    InternalInvariant(String),
    #[error("ObjectDeletedError: object {0} no longer exists")]
    ObjectDeleted(String),
    #[error("EvaluationError: {0}")]
    Engine(#[from] EngineError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        BridgeError::Type(message.into())
    }

    pub(crate) fn validation(property: &str, constraint: impl Into<String>) -> Self {
        BridgeError::Validation {
            property: property.to_string(),
            constraint: constraint.into(),
        }
    }

    /// True for errors caused by script misuse rather than a bridge bug.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, BridgeError::InternalInvariant(_))
    }
}

impl From<BridgeError> for mlua::Error {
    fn from(err: BridgeError) -> Self {
        mlua::Error::external(err)
    }
}

/// Finds the bridge error behind a Lua error, looking through callback
/// wrappers added while the error crossed Lua frames.
pub fn bridge_error(err: &mlua::Error) -> Option<&BridgeError> {
    match err {
        mlua::Error::CallbackError { cause, .. } => bridge_error(cause),
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<BridgeError>(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_lead_with_the_error_kind() {
        let err = BridgeError::validation("size", "must be between 1 and 9, got 10");
        assert_eq!(
            err.to_string(),
            "ValidationError: size must be between 1 and 9, got 10"
        );
        let err = BridgeError::from(EngineError::UnknownLabel("Q".to_string()));
        assert_eq!(err.to_string(), "EvaluationError: undefined variable Q");
    }

    #[test]
    fn bridge_errors_survive_the_trip_through_lua_errors() {
        let lua_err: mlua::Error = BridgeError::type_error("bad operand").into();
        let wrapped = mlua::Error::CallbackError {
            traceback: String::new(),
            cause: std::sync::Arc::new(lua_err),
        };
        match bridge_error(&wrapped) {
            Some(BridgeError::Type(message)) => assert_eq!(message, "bad operand"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!BridgeError::InternalInvariant("x".into()).is_user_error());
    }
}
