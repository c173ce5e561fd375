use thiserror::Error;

/// Failure of a remote photo-service call.
///
/// `Status` carries the service's gRPC-style status code, which the core's
/// failure classifiers inspect to decide between retry, per-file failure,
/// and abort. The type is `Clone` so one failure can be observed by every
/// caller attached to a shared upload future.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteApiError {
    #[error("{}: {message}", code_name(*code))]
    Status { code: i32, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteApiError {
    /// Status code, if this is a service-level failure.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Transport(_) => None,
        }
    }
}

/// Human-readable name for a gRPC-style status code.
pub fn code_name(code: i32) -> &'static str {
    match code {
        0 => "OK",
        1 => "CANCELLED",
        2 => "UNKNOWN",
        3 => "INVALID_ARGUMENT",
        4 => "DEADLINE_EXCEEDED",
        5 => "NOT_FOUND",
        6 => "ALREADY_EXISTS",
        7 => "PERMISSION_DENIED",
        8 => "RESOURCE_EXHAUSTED",
        9 => "FAILED_PRECONDITION",
        10 => "ABORTED",
        11 => "OUT_OF_RANGE",
        12 => "UNIMPLEMENTED",
        13 => "INTERNAL",
        14 => "UNAVAILABLE",
        15 => "DATA_LOSS",
        16 => "UNAUTHENTICATED",
        _ => "UNKNOWN",
    }
}

/// Failure of the durable upload-state store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store failure: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RemoteApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_uses_code_name() {
        let error = RemoteApiError::Status {
            code: 7,
            message: "no access to album".to_string(),
        };
        assert_eq!(error.to_string(), "PERMISSION_DENIED: no access to album");
    }

    #[test]
    fn test_unknown_code_name() {
        assert_eq!(code_name(42), "UNKNOWN");
        assert_eq!(code_name(-1), "UNKNOWN");
    }

    #[test]
    fn test_status_code_accessor() {
        let status = RemoteApiError::Status {
            code: 14,
            message: "down".to_string(),
        };
        assert_eq!(status.status_code(), Some(14));
        assert_eq!(
            RemoteApiError::Transport("reset".to_string()).status_code(),
            None
        );
    }
}
