//! Error taxonomy shared by every propstore crate.
//!
//! Request-time errors (`MalformedInput`, `UnknownStore`, `Backend`) are
//! surfaced synchronously to the caller and never crash the process.
//! `Configuration` and `Initialization` on a primary backend are fatal at
//! startup. `Network` is confined to the aggregation task.

use thiserror::Error;

/// Errors produced by store configuration, backends, and the index engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid backend kind, path, or store declaration at setup time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Backend resource acquisition failed on open.
    #[error("backend initialization failed: {0}")]
    Initialization(String),

    /// Invalid JSON on update, query, or restore.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Request against an undeclared store name.
    #[error("unknown store: {0}")]
    UnknownStore(String),

    /// Underlying read/write failure in a backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// Aggregation peer unreachable or misbehaving. Never fatal.
    #[error("network error: {0}")]
    Network(String),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::MalformedInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = StoreError::UnknownStore("machines".to_string());
        assert_eq!(err.to_string(), "unknown store: machines");

        let err = StoreError::Backend("disk full".to_string());
        assert_eq!(err.to_string(), "backend error: disk full");
    }

    #[test]
    fn test_json_error_maps_to_malformed_input() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StoreError = parse_err.into();
        assert!(matches!(err, StoreError::MalformedInput(_)));
    }
}
