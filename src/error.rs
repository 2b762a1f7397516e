use thiserror::Error;

/// Engine-level errors using thiserror for structured error handling.
///
/// None of these ever reach the UI layer: the playback controller logs them
/// and degrades to a no-op. They exist so every fallible step can be written
/// with `?` and the failure policy lives in one place.

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio asset: {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to decode audio asset: {path}")]
    DecodeFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to initialize audio output stream")]
    StreamInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Audio output stream is not configured")]
    NotConfigured,

    #[error("Audio playback failed")]
    PlaybackFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Resource handle already released")]
    Released,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings blob {key}")]
    LoadFailed {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write settings blob {key}")]
    SaveFailed {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Malformed settings blob {key}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize settings")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to create settings directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = AudioError::NotConfigured;
        assert_eq!(err.to_string(), "Audio output stream is not configured");

        let err = AudioError::Released;
        assert_eq!(err.to_string(), "Resource handle already released");
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let err = SettingsError::SaveFailed {
            key: "ambient_soundscape_settings".to_string(),
            source: Box::new(io_err),
        };

        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "Failed to write settings blob ambient_soundscape_settings"
        );
    }
}
