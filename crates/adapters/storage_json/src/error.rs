//! Storage-specific error type wrapping IO and JSON errors.

use geohub_domain::error::GeohubError;

/// Errors originating from the JSON storage layer.
#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    /// Reading or writing the file failed.
    #[error("config file IO error")]
    Io(#[from] std::io::Error),

    /// The stored document is not valid JSON for a configuration.
    #[error("config file JSON error")]
    Json(#[from] serde_json::Error),

    /// The background writer is gone.
    #[error("config writer is closed")]
    WriterClosed,
}

impl From<JsonStoreError> for GeohubError {
    fn from(err: JsonStoreError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_into_storage_error() {
        let err: GeohubError = JsonStoreError::WriterClosed.into();
        assert!(matches!(err, GeohubError::Storage(_)));
    }
}
