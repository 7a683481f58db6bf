// Error taxonomy shared by the clients and the orchestrator. Client
// operations never surface these to callers directly: they log them and
// collapse to `bool`/`Option`. The orchestrator keeps the first fatal one
// (auth or container) in its report.

use std::path::PathBuf;

/// Result type alias for transfer operations.
pub type Result<T, E = TransferError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The identity service did not hand out a token.
    #[error("authentication failed")]
    Authentication,

    /// The container existence check did not return 200.
    #[error("invalid [{container}] container")]
    ContainerNotFound { container: String },

    /// The container listing could not be retrieved in full.
    #[error("failed to list [{container}] container")]
    Listing { container: String },

    /// Network-level failure or undecodable response body.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered, but not with the status the operation expects.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    /// An endpoint URL could not be parsed or extended with path segments.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be read, parsed or written.
    #[error("settings error: {0}")]
    Settings(String),
}

impl TransferError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_not_found_names_the_container() {
        let err = TransferError::ContainerNotFound {
            container: "photos".into(),
        };
        assert_eq!(err.to_string(), "invalid [photos] container");
    }

    #[test]
    fn io_error_mentions_path() {
        let err = TransferError::io(
            "/tmp/missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing.txt"));
    }
}
