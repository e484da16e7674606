use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The host cannot provide directory access for the requested root.
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// A tree path that is not registered in the node map.
    #[error("No such node in tree: {0}")]
    NodeNotFound(String),

    /// An explicitly requested config file could not be used.
    #[error("Config error: {0}")]
    Config(String),

    /// Generation was aborted at a yield point.
    #[error("Generation cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn invalid_path_error_display() {
        let err = AppError::InvalidPath("/nonexistent".into());
        assert_eq!(err.to_string(), "Invalid path: /nonexistent");
    }

    #[test]
    fn unsupported_environment_display() {
        let err = AppError::UnsupportedEnvironment("/dev/null is not a directory".into());
        assert_eq!(
            err.to_string(),
            "Unsupported environment: /dev/null is not a directory"
        );
    }

    #[test]
    fn node_not_found_display() {
        let err = AppError::NodeNotFound("src/missing.rs".into());
        assert_eq!(err.to_string(), "No such node in tree: src/missing.rs");
    }

    #[test]
    fn cancelled_display() {
        assert_eq!(AppError::Cancelled.to_string(), "Generation cancelled");
    }
}
