use thiserror::Error;

use crate::overlay::AttachError;

/// Main error type for the CHONKER highlight engine
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Extraction payload rejected: {message}")]
    Payload {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Overlay could not attach: {0}")]
    Attach(#[from] AttachError),

    #[error("Invalid viewport scale: {value}")]
    InvalidScale { value: f64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("System resource error: {resource}")]
    SystemResource {
        resource: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SyncError {
    /// Create a payload error without an underlying parse error
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
            source: None,
        }
    }

    /// Create a payload error from a JSON parse failure
    pub fn payload_with_source(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Payload {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    /// Check if error is recoverable (the engine keeps running and degrades
    /// to "no highlight drawn")
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Attach(AttachError::TornDown) => false,
            SyncError::Attach(_) => true,
            SyncError::InvalidScale { .. } => true,
            SyncError::Payload { .. } => false,
            SyncError::Configuration { .. } => false,
            SyncError::SystemResource { .. } => false,
            _ => true,
        }
    }

    /// Get user-friendly error message
    ///
    /// Only upstream failures deserve a real message; everything that happens
    /// inside the sync engine maps to the generic one.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Payload { .. } => {
                "🐹 CHONKER couldn't read the extraction result for this document.".to_string()
            }
            SyncError::FileIO { path, .. } => {
                format!("📁 Could not read {}. Check the path and permissions.", path)
            }
            SyncError::Configuration { .. } => {
                "⚙️  Configuration is invalid. Check your config file.".to_string()
            }
            _ => "🐹 Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type SyncResult<T> = Result<T, SyncError>;

/// Error context for adding additional information
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> SyncResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context(self, context: &str) -> SyncResult<T> {
        self.map_err(|e| SyncError::SystemResource {
            resource: context.to_string(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_errors_are_user_facing() {
        let err = SyncError::payload("fragments missing");
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("extraction result"));
    }

    #[test]
    fn test_attach_errors_are_recoverable() {
        let err: SyncError = AttachError::AnchorMissing {
            selector: ".rpv-core__page-layer".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
        assert!(err.user_message().contains("Something went wrong"));

        let err: SyncError = AttachError::TornDown.into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_with_context_wraps_source() {
        let io: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = io.with_context("log directory").unwrap_err();
        assert!(matches!(err, SyncError::SystemResource { ref resource, .. } if resource == "log directory"));
    }
}
