//! Error types module
//!
//! All client-side failures are unified under [`ClientError`]. The variants follow
//! the error taxonomy of the backend contract: transport failures abort the current
//! operation, structured API failures carry the backend message verbatim, and the
//! upload phases (start, chunk, finish) each get their own variant so callers can
//! tell where an upload broke.
//!
//! Degraded (unparseable) validation responses are NOT errors; they are returned as
//! unstructured [`ValidationResult`](crate::models::ValidationResult)s instead.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like missing login or bad input
    Debug,
    /// Warning level - for backend rejections the user can act on
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the user.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "CHUNK_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same operation may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Human-readable status text
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Not authenticated: log in first")]
    NotAuthenticated,

    #[error("Upload start failed ({status}): {message}")]
    Session { status: u16, message: String },

    #[error("Chunk {index} failed ({status}): {message}")]
    Chunk {
        index: u64,
        status: u16,
        message: String,
    },

    #[error("Upload finish failed ({status}): {message}")]
    Finish { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn client_error_static_metadata(
    err: &ClientError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        ClientError::NotAuthenticated => (
            "NOT_AUTHENTICATED",
            false,
            Some("Run `saft-doctor login` or set SAFT_DOCTOR_TOKEN"),
            LogLevel::Debug,
        ),
        ClientError::Session { .. } => (
            "SESSION_ERROR",
            false,
            Some("Check credentials and file size, then start a new upload"),
            LogLevel::Warn,
        ),
        ClientError::Chunk { .. } => (
            "CHUNK_ERROR",
            true,
            Some("Restart the upload from the beginning"),
            LogLevel::Warn,
        ),
        ClientError::Finish { .. } => (
            "FINISH_ERROR",
            true,
            Some("Restart the upload from the beginning"),
            LogLevel::Warn,
        ),
        ClientError::Transport(_) => (
            "TRANSPORT_ERROR",
            true,
            Some("Check connectivity to the backend and retry"),
            LogLevel::Error,
        ),
        ClientError::Api { status, .. } if *status == 401 || *status == 403 => (
            "UNAUTHORIZED",
            false,
            Some("Log in again to refresh the token"),
            LogLevel::Warn,
        ),
        ClientError::Api { status, .. } if *status >= 500 => (
            "API_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        ClientError::Api { .. } => (
            "API_ERROR",
            false,
            Some("Check request parameters and try again"),
            LogLevel::Warn,
        ),
        ClientError::InvalidResponse(_) => (
            "INVALID_RESPONSE",
            false,
            Some("Check that the backend version matches this client"),
            LogLevel::Error,
        ),
        ClientError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check command arguments and try again"),
            LogLevel::Debug,
        ),
        ClientError::Io(_) => (
            "IO_ERROR",
            false,
            Some("Check that the file exists and is readable"),
            LogLevel::Error,
        ),
        ClientError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Check the SAFT_DOCTOR_* environment variables"),
            LogLevel::Error,
        ),
    }
}

impl ClientError {
    /// HTTP status associated with the failure, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Session { status, .. }
            | ClientError::Chunk { status, .. }
            | ClientError::Finish { status, .. }
            | ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl ErrorMetadata for ClientError {
    fn error_code(&self) -> &'static str {
        client_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        client_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        client_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        client_error_static_metadata(self).3
    }

    fn user_message(&self) -> String {
        match self {
            ClientError::NotAuthenticated => "Log in first".to_string(),
            ClientError::Session { message, .. } => format!("Upload start failed: {}", message),
            ClientError::Chunk {
                index,
                status,
                message,
            } => format!("Chunk {} failed ({}): {}", index, status, message),
            ClientError::Finish { message, .. } => format!("Upload finish failed: {}", message),
            ClientError::Transport(msg) => format!("Backend unreachable: {}", msg),
            ClientError::Api { message, .. } => message.clone(),
            ClientError::InvalidResponse(msg) => format!("Unexpected backend response: {}", msg),
            ClientError::InvalidInput(msg) => msg.clone(),
            ClientError::Io(err) => format!("File error: {}", err),
            ClientError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }
}

/// Extract the most useful message from an error body: the JSON `detail` (or
/// `error`) field when present, otherwise the raw text, otherwise a generic text.
pub fn backend_message(body: &str, fallback: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["detail", "error", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(v) if !v.is_null() && !v.is_string() => return v.to_string(),
                _ => {}
            }
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_prefers_detail() {
        assert_eq!(
            backend_message(r#"{"detail":"quota exceeded"}"#, "Unknown error"),
            "quota exceeded"
        );
        assert_eq!(
            backend_message(r#"{"ok":false,"error":"no AT password"}"#, "Unknown error"),
            "no AT password"
        );
    }

    #[test]
    fn backend_message_falls_back_to_raw_text() {
        assert_eq!(
            backend_message("Internal Server Error", "Unknown error"),
            "Internal Server Error"
        );
        assert_eq!(backend_message("   ", "Unknown error"), "Unknown error");
    }

    #[test]
    fn backend_message_serializes_structured_detail() {
        let msg = backend_message(
            r#"{"detail":[{"loc":["body","size"],"msg":"field required"}]}"#,
            "x",
        );
        assert!(msg.contains("field required"));
    }

    #[test]
    fn chunk_error_carries_index_and_status() {
        let err = ClientError::Chunk {
            index: 2,
            status: 500,
            message: "disk full".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.error_code(), "CHUNK_ERROR");
        assert_eq!(err.user_message(), "Chunk 2 failed (500): disk full");
    }

    #[test]
    fn api_error_metadata_depends_on_status() {
        let unauthorized = ClientError::Api {
            status: 401,
            message: "bad token".to_string(),
        };
        assert_eq!(unauthorized.error_code(), "UNAUTHORIZED");
        assert!(!unauthorized.is_recoverable());

        let server = ClientError::Api {
            status: 503,
            message: "busy".to_string(),
        };
        assert!(server.is_recoverable());
        assert_eq!(server.log_level(), LogLevel::Error);
    }

    #[test]
    fn not_authenticated_has_no_status() {
        assert_eq!(ClientError::NotAuthenticated.status(), None);
        assert_eq!(ClientError::NotAuthenticated.log_level(), LogLevel::Debug);
    }
}
