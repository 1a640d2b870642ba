use thiserror::Error;

/// Typed failure for a rejected diagram operation. A rejected operation
/// never leaves a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagramError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl DiagramError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidOperation { .. })
    }
}

pub type DiagramResult<T> = Result<T, DiagramError>;

#[cfg(test)]
mod tests {
    use super::DiagramError;

    #[test]
    fn helper_constructors_set_variants() {
        let err = DiagramError::not_found("node n4");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: node n4");

        let err = DiagramError::invalid("self connection");
        assert!(err.is_invalid());
        assert_eq!(err.to_string(), "invalid operation: self connection");
    }
}
