use std::path::PathBuf;

/// Failures surfaced to the caller of a scenario.
///
/// Degenerate fitness evaluations are not errors: the evaluator maps them to
/// [`crate::fitness::DEGENERATE_FITNESS`] and the search goes on.
#[derive(Debug, thiserror::Error)]
pub enum GasvmError {
    #[error("ConfigurationError: {0}")]
    Configuration(String),
    #[error("DataError: {0}")]
    Data(String),
    #[error("IOError: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ReportError: {0}")]
    Report(String),
    #[error("ResourceError: {0}")]
    Resource(String),
}

impl GasvmError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error: 2 for usage problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            GasvmError::Configuration(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_separates_usage_errors() {
        assert_eq!(GasvmError::configuration("missing Source").exit_code(), 2);
        assert_eq!(GasvmError::data("empty partition").exit_code(), 1);
        let io = GasvmError::io(
            "/nowhere/data.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert_eq!(io.exit_code(), 1);
    }

    #[test]
    fn test_messages_name_the_error_kind() {
        let message = GasvmError::configuration("Source is required").to_string();
        assert!(
            message.starts_with("ConfigurationError"),
            "unexpected message: {}",
            message
        );
        let io = GasvmError::io(
            "data.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(io.to_string().contains("data.csv"));
    }
}
