//! Torrent client backends.
//!
//! Every backend implements [`TorrentClient`]. The coordinator only ever talks
//! to a `Box<dyn TorrentClient>`, so backends are picked from configuration at
//! runtime by [`build_client`].

mod error;
pub mod hardlink;
pub mod http;
pub mod qbittorrent;

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;

use crate::config::{BackendConfig, ClientConfig};
use crate::torrent::TorrentMap;

pub use error::ClientError;
pub use qbittorrent::QbittorrentClient;

/// Capabilities the coordinator needs from a torrent client.
///
/// Calls on one client are issued strictly one at a time by its coordinator.
///
/// This trait uses `async_trait` so backends can be boxed as `dyn TorrentClient`.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Configured client name, used in logs and reports.
    fn name(&self) -> &str;

    /// Backend type, e.g. `"qbittorrent"`.
    fn kind(&self) -> &'static str;

    /// Authenticates and loads whatever the backend needs before enumeration.
    async fn connect(&mut self) -> Result<(), ClientError>;

    /// Enumerates every torrent, keyed by hash.
    async fn list_torrents(&self) -> Result<TorrentMap, ClientError>;

    /// Measures free bytes for `path`. An empty path means the backend's
    /// default download location.
    async fn current_free_space(&self, path: &Path) -> Result<u64, ClientError>;

    /// Removes a torrent. `Ok(true)` means it is gone (with its data when
    /// `delete_data` is set); `Ok(false)` means nothing was removed.
    async fn remove_torrent(&self, hash: &str, delete_data: bool) -> Result<bool, ClientError>;

    /// Moves a torrent to `label`, hardlinking its files into the label
    /// directory first when `hardlink` is set.
    async fn relabel(&self, hash: &str, label: &str, hardlink: bool) -> Result<(), ClientError>;

    /// Adds tags; an empty set is a successful no-op.
    async fn add_tags(&self, hash: &str, tags: &BTreeSet<String>) -> Result<(), ClientError>;

    /// Removes tags; an empty set is a successful no-op.
    async fn remove_tags(&self, hash: &str, tags: &BTreeSet<String>) -> Result<(), ClientError>;
}

/// Builds the backend for one configured client. The client is not connected yet.
///
/// # Errors
///
/// Returns [`ClientError`] if the backend cannot be constructed.
pub fn build_client(name: &str, config: &ClientConfig) -> Result<Box<dyn TorrentClient>, ClientError> {
    match &config.backend {
        BackendConfig::Qbittorrent(qbt) => Ok(Box::new(QbittorrentClient::new(
            name,
            qbt,
            config.path_mapper(),
        )?)),
    }
}

/// Joins tag names the way web APIs expect them.
pub(crate) fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
