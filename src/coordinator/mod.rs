//! Sequential per-client pipeline: enumerate, decide, act.
//!
//! One [`ActionCoordinator`] owns one client connection, one compiled filter
//! and one free-space ledger. Torrents are processed strictly one at a time in
//! enumeration order, so a removal is credited to the ledger before the next
//! torrent's rules are evaluated.

mod error;
mod report;

pub use error::RunError;
pub use report::{Operation, RunReport, RunStats, TorrentFailure, TorrentOutcome, TorrentReport};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::client::{ClientError, TorrentClient};
use crate::config::ClientConfig;
use crate::decision::{Decision, decide};
use crate::expression::ExpressionSet;
use crate::ledger::FreeSpaceLedger;
use crate::torrent::TorrentRecord;

/// Where the ledger's starting value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreeSpaceSource {
    /// Not measured; rules see `freeSpaceSet == false`.
    Unmeasured,
    /// Ask the client about this daemon-side path (empty means its default).
    Client(PathBuf),
    /// Measure a local filesystem path.
    Local(PathBuf),
}

/// Behaviour switches for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Decide and report, but issue no mutating calls.
    pub dry_run: bool,
    pub delete_data: bool,
    pub hardlink_relabel: bool,
    pub free_space: FreeSpaceSource,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            delete_data: true,
            hardlink_relabel: false,
            free_space: FreeSpaceSource::Unmeasured,
        }
    }
}

impl CoordinatorOptions {
    /// Derives options from a client's configuration.
    ///
    /// Free space is measured when a local path is configured or when any rule
    /// of the filter reads it.
    #[must_use]
    pub fn for_client(config: &ClientConfig, expressions: &ExpressionSet, dry_run: bool) -> Self {
        let free_space = match &config.free_space_path {
            Some(path) => FreeSpaceSource::Local(path.clone()),
            None if expressions.references_free_space() => {
                FreeSpaceSource::Client(config.download_path.clone().unwrap_or_default())
            }
            None => FreeSpaceSource::Unmeasured,
        };
        Self {
            dry_run,
            delete_data: config.delete_data,
            hardlink_relabel: config.hardlink_relabel,
            free_space,
        }
    }
}

/// Runs one client's pipeline.
pub struct ActionCoordinator {
    client: Box<dyn TorrentClient>,
    expressions: Arc<ExpressionSet>,
    options: CoordinatorOptions,
    ledger: FreeSpaceLedger,
}

impl ActionCoordinator {
    #[must_use]
    pub fn new(
        client: Box<dyn TorrentClient>,
        expressions: Arc<ExpressionSet>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            client,
            expressions,
            options,
            ledger: FreeSpaceLedger::unset(),
        }
    }

    /// Name of the client this coordinator drives.
    #[must_use]
    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Connects, enumerates once, seeds the ledger, then decides and acts on
    /// every torrent in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the run cannot start; per-torrent failures are
    /// collected in the report instead.
    #[instrument(skip(self), fields(client = %self.client.name(), dry_run = self.options.dry_run))]
    pub async fn run(mut self) -> Result<RunReport, RunError> {
        let name = self.client.name().to_string();

        self.client
            .connect()
            .await
            .map_err(|error| RunError::connection(&name, error))?;

        let torrents = self
            .client
            .list_torrents()
            .await
            .map_err(|error| RunError::enumeration(&name, error))?;
        info!(client = %name, torrents = torrents.len(), "Retrieved torrents");

        self.seed_ledger(&name).await;

        let mut reports = Vec::with_capacity(torrents.len());
        for record in torrents.values() {
            reports.push(self.process(record).await);
        }

        let stats = RunStats::from_reports(&reports);
        info!(
            client = %name,
            total = stats.total,
            removed = stats.removed,
            updated = stats.updated,
            ignored = stats.ignored,
            failed = stats.failed,
            "Finished processing torrents"
        );

        Ok(RunReport {
            client: name,
            dry_run: self.options.dry_run,
            torrents: reports,
            stats,
            free_space_gb: self
                .ledger
                .is_set()
                .then(|| self.ledger.current_free_gb()),
        })
    }

    async fn seed_ledger(&mut self, name: &str) {
        let measured = match &self.options.free_space {
            FreeSpaceSource::Unmeasured => return,
            FreeSpaceSource::Client(path) => self.client.current_free_space(path).await,
            FreeSpaceSource::Local(path) => local_free_space(path),
        };

        match measured {
            Ok(bytes) => {
                self.ledger = FreeSpaceLedger::from_bytes(bytes);
                info!(
                    client = %name,
                    free_gb = self.ledger.current_free_gb(),
                    "Measured free space"
                );
            }
            Err(error) => {
                warn!(client = %name, error = %error, "Free space unavailable; rules see freeSpaceSet = false");
            }
        }
    }

    #[instrument(skip_all, fields(hash = %record.hash))]
    async fn process(&mut self, record: &TorrentRecord) -> TorrentReport {
        let mut report = TorrentReport::new(&record.hash, &record.name);

        let decision = match decide(record, &self.expressions, self.ledger.view()) {
            Ok(decision) => decision,
            Err(error) => {
                warn!(hash = %record.hash, name = %record.name, error = %error, "Rule evaluation failed; skipping torrent");
                report.fail(Operation::Evaluate, &error);
                return report;
            }
        };

        if decision.should_ignore {
            debug!(hash = %record.hash, name = %record.name, "Ignored");
            report.outcome = TorrentOutcome::Ignored;
            return report;
        }

        if decision.should_remove {
            self.remove(record, &mut report).await;
            return report;
        }

        self.update(record, &decision, &mut report).await;
        report
    }

    async fn remove(&mut self, record: &TorrentRecord, report: &mut TorrentReport) {
        let bytes = u64::try_from(record.total_bytes).unwrap_or(0);

        let removed = if self.options.dry_run {
            Ok(true)
        } else {
            self.client
                .remove_torrent(&record.hash, self.options.delete_data)
                .await
        };

        match removed {
            Ok(true) => {
                self.ledger.record_removal(bytes);
                info!(
                    hash = %record.hash,
                    name = %record.name,
                    bytes,
                    dry_run = self.options.dry_run,
                    "Removed torrent"
                );
                report.outcome = TorrentOutcome::Removed {
                    bytes_freed: bytes,
                    simulated: self.options.dry_run,
                };
            }
            Ok(false) => {
                warn!(hash = %record.hash, name = %record.name, "Client did not remove torrent");
            }
            Err(error) => {
                warn!(hash = %record.hash, name = %record.name, error = %error, "Failed removing torrent");
                report.fail(Operation::Remove, &error);
            }
        }
    }

    async fn update(&mut self, record: &TorrentRecord, decision: &Decision, report: &mut TorrentReport) {
        let mut applied_label = None;
        let mut tags_added = BTreeSet::new();
        let mut tags_removed = BTreeSet::new();

        if let Some(label) = decision.relabel_target(&record.label) {
            match self.relabel(record, label).await {
                Ok(()) => {
                    info!(hash = %record.hash, name = %record.name, from = %record.label, label, "Relabeled torrent");
                    applied_label = Some(label.to_string());
                }
                Err(error) => {
                    warn!(hash = %record.hash, name = %record.name, label, error = %error, "Failed relabeling torrent");
                    report.fail(Operation::Relabel, &error);
                }
            }
        }

        if !decision.tags_to_add.is_empty() {
            match self.tag(record, &decision.tags_to_add, Operation::AddTags).await {
                Ok(()) => {
                    info!(hash = %record.hash, name = %record.name, tags = ?decision.tags_to_add, "Added tags");
                    tags_added = decision.tags_to_add.clone();
                }
                Err(error) => {
                    warn!(hash = %record.hash, name = %record.name, error = %error, "Failed adding tags");
                    report.fail(Operation::AddTags, &error);
                }
            }
        }

        if !decision.tags_to_remove.is_empty() {
            match self.tag(record, &decision.tags_to_remove, Operation::RemoveTags).await {
                Ok(()) => {
                    info!(hash = %record.hash, name = %record.name, tags = ?decision.tags_to_remove, "Removed tags");
                    tags_removed = decision.tags_to_remove.clone();
                }
                Err(error) => {
                    warn!(hash = %record.hash, name = %record.name, error = %error, "Failed removing tags");
                    report.fail(Operation::RemoveTags, &error);
                }
            }
        }

        if applied_label.is_some() || !tags_added.is_empty() || !tags_removed.is_empty() {
            report.outcome = TorrentOutcome::Updated {
                label: applied_label,
                tags_added,
                tags_removed,
            };
        }
    }

    async fn relabel(&self, record: &TorrentRecord, label: &str) -> Result<(), ClientError> {
        if self.options.dry_run {
            return Ok(());
        }
        self.client
            .relabel(&record.hash, label, self.options.hardlink_relabel)
            .await
    }

    async fn tag(
        &self,
        record: &TorrentRecord,
        tags: &BTreeSet<String>,
        operation: Operation,
    ) -> Result<(), ClientError> {
        if self.options.dry_run {
            return Ok(());
        }
        match operation {
            Operation::RemoveTags => self.client.remove_tags(&record.hash, tags).await,
            _ => self.client.add_tags(&record.hash, tags).await,
        }
    }
}

/// Free bytes available to this process at `path`.
///
/// # Errors
///
/// Returns [`ClientError::FreeSpace`] if the path cannot be measured.
pub fn local_free_space(path: &Path) -> Result<u64, ClientError> {
    fs2::available_space(path).map_err(|error| ClientError::free_space(path, error))
}
