//! In-memory `TorrentClient` that records every call.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use curator_core::client::{ClientError, TorrentClient};
use curator_core::torrent::{TorrentMap, TorrentRecord};

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    List,
    FreeSpace(PathBuf),
    Remove { hash: String, delete_data: bool },
    Relabel { hash: String, label: String, hardlink: bool },
    AddTags { hash: String, tags: Vec<String> },
    RemoveTags { hash: String, tags: Vec<String> },
}

impl Call {
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Remove { .. } | Self::Relabel { .. } | Self::AddTags { .. } | Self::RemoveTags { .. }
        )
    }
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Default)]
pub struct MockClient {
    name: String,
    torrents: TorrentMap,
    free_space: Option<u64>,
    fail_connect: bool,
    fail_list: bool,
    fail_remove: HashSet<String>,
    keep_on_remove: HashSet<String>,
    fail_relabel: HashSet<String>,
    fail_tags: HashSet<String>,
    calls: CallLog,
}

impl MockClient {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_torrent(mut self, record: TorrentRecord) -> Self {
        self.torrents.insert(record.hash.clone(), record);
        self
    }

    #[must_use]
    pub fn with_free_space(mut self, bytes: u64) -> Self {
        self.free_space = Some(bytes);
        self
    }

    #[must_use]
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    #[must_use]
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    #[must_use]
    pub fn failing_remove(mut self, hash: &str) -> Self {
        self.fail_remove.insert(hash.to_string());
        self
    }

    /// `remove_torrent` answers `Ok(false)` for this hash.
    #[must_use]
    pub fn keeping_on_remove(mut self, hash: &str) -> Self {
        self.keep_on_remove.insert(hash.to_string());
        self
    }

    #[must_use]
    pub fn failing_relabel(mut self, hash: &str) -> Self {
        self.fail_relabel.insert(hash.to_string());
        self
    }

    #[must_use]
    pub fn failing_tags(mut self, hash: &str) -> Self {
        self.fail_tags.insert(hash.to_string());
        self
    }

    /// Handle to the call log, usable after the client is boxed.
    #[must_use]
    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected(operation: &str) -> ClientError {
        ClientError::status(operation, 500, "injected failure")
    }
}

/// Snapshot of the recorded calls.
#[must_use]
pub fn recorded(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

#[async_trait]
impl TorrentClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self) -> Result<(), ClientError> {
        self.record(Call::Connect);
        if self.fail_connect {
            return Err(ClientError::auth("mock://", "rejected"));
        }
        Ok(())
    }

    async fn list_torrents(&self) -> Result<TorrentMap, ClientError> {
        self.record(Call::List);
        if self.fail_list {
            return Err(Self::injected("torrents/info"));
        }
        Ok(self.torrents.clone())
    }

    async fn current_free_space(&self, path: &Path) -> Result<u64, ClientError> {
        self.record(Call::FreeSpace(path.to_path_buf()));
        self.free_space
            .ok_or_else(|| ClientError::free_space(path, "not available"))
    }

    async fn remove_torrent(&self, hash: &str, delete_data: bool) -> Result<bool, ClientError> {
        self.record(Call::Remove {
            hash: hash.to_string(),
            delete_data,
        });
        if self.fail_remove.contains(hash) {
            return Err(Self::injected("torrents/delete"));
        }
        Ok(!self.keep_on_remove.contains(hash))
    }

    async fn relabel(&self, hash: &str, label: &str, hardlink: bool) -> Result<(), ClientError> {
        self.record(Call::Relabel {
            hash: hash.to_string(),
            label: label.to_string(),
            hardlink,
        });
        if self.fail_relabel.contains(hash) {
            return Err(ClientError::label_path_missing(label));
        }
        Ok(())
    }

    async fn add_tags(&self, hash: &str, tags: &BTreeSet<String>) -> Result<(), ClientError> {
        self.record(Call::AddTags {
            hash: hash.to_string(),
            tags: tags.iter().cloned().collect(),
        });
        if self.fail_tags.contains(hash) {
            return Err(Self::injected("torrents/addTags"));
        }
        Ok(())
    }

    async fn remove_tags(&self, hash: &str, tags: &BTreeSet<String>) -> Result<(), ClientError> {
        self.record(Call::RemoveTags {
            hash: hash.to_string(),
            tags: tags.iter().cloned().collect(),
        });
        if self.fail_tags.contains(hash) {
            return Err(Self::injected("torrents/removeTags"));
        }
        Ok(())
    }
}
