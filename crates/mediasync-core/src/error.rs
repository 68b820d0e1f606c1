//! Error taxonomy shared by the engine and its callers.

use thiserror::Error;

/// Why a job ended in `Failed`. Cloneable so it can live inside `JobResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Connection/timeout/5xx (transient, retries exhausted) or a 4xx that
    /// retrying cannot fix (permanent).
    #[error("network error ({}): {message}", transience(.transient))]
    Network { transient: bool, message: String },
    /// Unwritable directory, disk full, permission denied. Never retried.
    #[error("filesystem error: {0}")]
    Filesystem(String),
    /// Corrupt or incomplete archive; the downloaded archive is kept.
    #[error("extraction error: {0}")]
    Extraction(String),
    /// The job's pipeline panicked; reported instead of being lost.
    #[error("internal error: {0}")]
    Internal(String),
}

fn transience(transient: &bool) -> &'static str {
    if *transient {
        "transient"
    } else {
        "permanent"
    }
}

impl ErrorKind {
    pub fn filesystem(context: &str, err: &std::io::Error) -> Self {
        ErrorKind::Filesystem(format!("{}: {}", context, err))
    }
}

/// Invalid engine configuration. Raised before any job starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("concurrency must be between 1 and {max}, got {got}")]
    Concurrency { got: usize, max: usize },
    #[error("max_attempts must be at least 1")]
    MaxAttempts,
    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    Seconds { field: &'static str, value: f64 },
    #[error("unknown placeholder {{{0}}} in filename format")]
    UnknownPlaceholder(String),
    #[error("filename format must not be empty")]
    EmptyFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_display_names_transience() {
        let e = ErrorKind::Network {
            transient: true,
            message: "HTTP 503".to_string(),
        };
        assert_eq!(e.to_string(), "network error (transient): HTTP 503");
        let e = ErrorKind::Network {
            transient: false,
            message: "HTTP 404".to_string(),
        };
        assert_eq!(e.to_string(), "network error (permanent): HTTP 404");
    }

    #[test]
    fn config_error_display() {
        let e = ConfigError::Concurrency { got: 40, max: 32 };
        assert_eq!(e.to_string(), "concurrency must be between 1 and 32, got 40");
        let e = ConfigError::UnknownPlaceholder("album".to_string());
        assert_eq!(e.to_string(), "unknown placeholder {album} in filename format");
    }
}
