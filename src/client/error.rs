//! Error types for torrent client backends.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`TorrentClient`](super::TorrentClient) call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, connection refused, TLS, timeout).
    #[error("network error calling {endpoint}: {source}")]
    Http {
        /// API endpoint that was called.
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        /// API endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Login was rejected.
    #[error("[AUTH] login to {url} rejected: {reason}\n  Suggestion: check user and password for this client")]
    Auth {
        /// Base URL of the backend.
        url: String,
        /// Why the login failed.
        reason: String,
    },

    /// The backend API is too old.
    #[error("unsupported web API version {version} (minimum {minimum})")]
    UnsupportedVersion {
        /// Version reported by the backend.
        version: String,
        /// Minimum supported version.
        minimum: String,
    },

    /// A response body could not be decoded.
    #[error("failed decoding response from {endpoint}: {reason}")]
    Decode {
        /// API endpoint that was called.
        endpoint: String,
        /// Decoder message.
        reason: String,
    },

    /// The backend URL cannot be used as an API base.
    #[error("invalid client url '{url}': {reason}")]
    InvalidUrl {
        /// The URL as configured.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A call was made before `connect` succeeded.
    #[error("client is not connected")]
    NotConnected,

    /// Hardlink relabel needs a directory for the label and the backend has none.
    #[error("no save path known for label '{label}'\n  Suggestion: create the category in the client first")]
    LabelPathMissing {
        /// Requested label.
        label: String,
    },

    /// A torrent file to hardlink does not exist locally.
    #[error("source file {} is missing: {source}", path.display())]
    MissingSource {
        /// Local path of the missing file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file name reported by the backend would resolve outside its torrent directory.
    #[error("refusing to link unsafe file name {}", name.display())]
    UnsafeFileName {
        /// Name as reported by the backend.
        name: PathBuf,
    },

    /// Creating a directory or link failed.
    #[error("failed linking {} -> {}: {source}", source_path.display(), target.display())]
    Hardlink {
        /// Existing file.
        source_path: PathBuf,
        /// Link to create.
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Free space could not be measured.
    #[error("failed measuring free space at {}: {reason}", path.display())]
    FreeSpace {
        /// Path being measured.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl ClientError {
    /// Creates an `Http` error.
    #[must_use]
    pub fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a `Status` error, truncating long bodies.
    #[must_use]
    pub fn status(endpoint: impl Into<String>, status: u16, body: &str) -> Self {
        const MAX_BODY: usize = 200;
        let body = match body.char_indices().nth(MAX_BODY) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Status {
            endpoint: endpoint.into(),
            status,
            body,
        }
    }

    /// Creates an `Auth` error.
    #[must_use]
    pub fn auth(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `UnsupportedVersion` error.
    #[must_use]
    pub fn unsupported_version(version: impl Into<String>, minimum: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            version: version.into(),
            minimum: minimum.into(),
        }
    }

    /// Creates a `Decode` error.
    #[must_use]
    pub fn decode(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `LabelPathMissing` error.
    #[must_use]
    pub fn label_path_missing(label: impl Into<String>) -> Self {
        Self::LabelPathMissing {
            label: label.into(),
        }
    }

    /// Creates a `MissingSource` error.
    #[must_use]
    pub fn missing_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MissingSource {
            path: path.into(),
            source,
        }
    }

    /// Creates an `UnsafeFileName` error.
    #[must_use]
    pub fn unsafe_file_name(name: impl Into<PathBuf>) -> Self {
        Self::UnsafeFileName { name: name.into() }
    }

    /// Creates a `Hardlink` error.
    #[must_use]
    pub fn hardlink(
        source_path: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Hardlink {
            source_path: source_path.into(),
            target: target.into(),
            source,
        }
    }

    /// Creates a `FreeSpace` error.
    #[must_use]
    pub fn free_space(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::FreeSpace {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
