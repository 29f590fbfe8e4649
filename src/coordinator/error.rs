//! Errors that end a client run.

use thiserror::Error;

use crate::client::ClientError;

/// A failure that stops one client's run before any torrent is processed.
///
/// Other clients are unaffected.
#[derive(Debug, Error)]
pub enum RunError {
    /// Login or handshake failed.
    #[error("client '{client}': connection failed: {source}")]
    Connection {
        client: String,
        #[source]
        source: ClientError,
    },

    /// The torrent list could not be retrieved in full.
    #[error("client '{client}': failed listing torrents: {source}")]
    Enumeration {
        client: String,
        #[source]
        source: ClientError,
    },
}

impl RunError {
    /// Creates a `Connection` error.
    #[must_use]
    pub fn connection(client: &str, source: ClientError) -> Self {
        Self::Connection {
            client: client.to_string(),
            source,
        }
    }

    /// Creates an `Enumeration` error.
    #[must_use]
    pub fn enumeration(client: &str, source: ClientError) -> Self {
        Self::Enumeration {
            client: client.to_string(),
            source,
        }
    }

    /// Name of the client whose run failed.
    #[must_use]
    pub fn client(&self) -> &str {
        match self {
            Self::Connection { client, .. } | Self::Enumeration { client, .. } => client,
        }
    }
}
