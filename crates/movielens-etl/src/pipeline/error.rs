//! Pipeline Error Types
//!
//! Each variant is one failure class of the run. The orchestrator decides
//! abort-vs-continue from the variant alone via [`PipelineError::disposition`].

use std::fmt;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// What the orchestrator does after a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Stop the run; cleanup is skipped
    Abort,
    /// Continue only if previously staged data can stand in
    FallbackToStaged,
    /// Log and carry on
    Continue,
}

/// Main error type for pipeline stages
#[derive(Debug)]
pub enum PipelineError {
    /// Download or archive extraction failed
    Acquisition {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Upload to durable storage or warehouse load failed
    Staging {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Source tables missing/malformed, or the ranked export could not be written
    Transformation {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Reading back or displaying the export failed
    Export {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Removing durable working paths failed
    Cleanup {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Pipeline could not be assembled
    Configuration(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Acquisition { message, .. } => {
                write!(f, "Acquisition failed: {message}")
            }
            PipelineError::Staging { message, .. } => write!(f, "Staging failed: {message}"),
            PipelineError::Transformation { message, .. } => {
                write!(f, "Transformation failed: {message}")
            }
            PipelineError::Export { message, .. } => write!(f, "Export failed: {message}"),
            PipelineError::Cleanup { message, .. } => write!(f, "Cleanup failed: {message}"),
            PipelineError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Acquisition { source: Some(e), .. }
            | PipelineError::Staging { source: Some(e), .. }
            | PipelineError::Transformation { source: Some(e), .. }
            | PipelineError::Export { source: Some(e), .. }
            | PipelineError::Cleanup { source: Some(e), .. } => Some(e.as_ref()),
            _ => None,
        }
    }
}

// Helper methods for creating specific error types
impl PipelineError {
    pub fn acquisition(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        PipelineError::Acquisition {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn staging(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        PipelineError::Staging {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn transformation(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        PipelineError::Transformation {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn export(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        PipelineError::Export {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn cleanup(message: impl Into<String>) -> Self {
        PipelineError::Cleanup {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    pub fn disposition(&self) -> FailureDisposition {
        match self {
            PipelineError::Acquisition { .. }
            | PipelineError::Transformation { .. }
            | PipelineError::Configuration(_) => FailureDisposition::Abort,
            PipelineError::Staging { .. } => FailureDisposition::FallbackToStaged,
            PipelineError::Export { .. } | PipelineError::Cleanup { .. } => {
                FailureDisposition::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_dispositions_follow_failure_class() {
        let io_err = || io::Error::new(io::ErrorKind::NotFound, "gone");

        assert_eq!(
            PipelineError::acquisition("download", io_err()).disposition(),
            FailureDisposition::Abort
        );
        assert_eq!(
            PipelineError::staging("upload", io_err()).disposition(),
            FailureDisposition::FallbackToStaged
        );
        assert_eq!(
            PipelineError::transformation("movies", io_err()).disposition(),
            FailureDisposition::Abort
        );
        assert_eq!(
            PipelineError::export("read back", io_err()).disposition(),
            FailureDisposition::Continue
        );
        assert_eq!(
            PipelineError::cleanup("rm").disposition(),
            FailureDisposition::Continue
        );
    }

    #[test]
    fn test_source_is_preserved() {
        let err = PipelineError::staging(
            "upload of ml-latest-small",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Staging failed: upload of ml-latest-small");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("denied"));
    }
}
