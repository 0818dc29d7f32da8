//! Error types for pipeline stages and shutdown.

use std::sync::Arc;

/// The main error type for pipelines.
///
/// Errors are `Clone` so that a single fault can be recorded in the
/// pipeline's fault report and attached to the failed stream at once.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A stage's transform returned an error
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: String,
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A stage's transform panicked
    #[error("stage `{stage}` panicked: {message}")]
    Panicked { stage: String, message: String },

    /// The pipeline signal fired before an operation could complete
    #[error("pipeline was cancelled")]
    Cancelled,

    /// Workers did not finish within the shutdown timeout
    #[error("workers still running after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),

    /// Multiple errors occurred (e.g. several merge inputs failed)
    #[error("multiple errors occurred: {}", join_errors(.0))]
    Multiple(Vec<Error>),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}]", e))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a stage error from any error type
    pub fn stage<S, E>(stage: S, error: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Stage {
            stage: stage.into(),
            source: Arc::new(error),
        }
    }

    /// Create a panic error from the payload returned by `catch_unwind`
    pub fn panicked<S: Into<String>>(stage: S, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked {
            stage: stage.into(),
            message,
        }
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Error::Timeout { duration_ms }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Collapse a list of errors into one, or `None` if the list is empty
    pub fn from_many(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }

    /// Whether this error (or any nested error) came from a panicking stage
    pub fn is_panic(&self) -> bool {
        match self {
            Error::Panicked { .. } => true,
            Error::Multiple(errors) => errors.iter().any(Error::is_panic),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for turning foreign errors into stage errors
pub trait IntoError<T> {
    fn into_stage_error(self, stage: &str) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_stage_error(self, stage: &str) -> Result<T> {
        self.map_err(|e| Error::stage(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_many() {
        assert!(Error::from_many(vec![]).is_none());

        let single = Error::from_many(vec![Error::custom("a")]).unwrap();
        assert!(matches!(single, Error::Custom(ref m) if m == "a"));

        let many = Error::from_many(vec![Error::custom("a"), Error::Cancelled]).unwrap();
        assert_eq!(
            many.to_string(),
            "multiple errors occurred: [a], [pipeline was cancelled]"
        );
    }

    #[test]
    fn test_panic_payloads() {
        let err = Error::panicked("double", Box::new("boom"));
        assert_eq!(err.to_string(), "stage `double` panicked: boom");
        assert!(err.is_panic());

        let err = Error::panicked("double", Box::new(String::from("owned")));
        assert!(matches!(err, Error::Panicked { ref message, .. } if message == "owned"));

        let nested = Error::Multiple(vec![Error::Cancelled, err]);
        assert!(nested.is_panic());
    }

    #[test]
    fn test_stage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = Err::<(), _>(io).into_stage_error("reader");
        let err = err.unwrap_err();
        assert_eq!(err.to_string(), "stage `reader` failed: disk");
        assert!(std::error::Error::source(&err).is_some());
    }
}
