//! Per-torrent outcomes and run summaries.

use std::collections::BTreeSet;
use std::fmt;

/// Terminal state of one torrent in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentOutcome {
    /// An ignore rule matched.
    Ignored,
    /// The backend confirmed removal, or a dry run simulated it.
    Removed { bytes_freed: u64, simulated: bool },
    /// At least one relabel or tag change was applied.
    Updated {
        label: Option<String>,
        tags_added: BTreeSet<String>,
        tags_removed: BTreeSet<String>,
    },
    /// Nothing was applied.
    Unchanged,
}

impl TorrentOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Removed { .. } => "removed",
            Self::Updated { .. } => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// The step that failed for a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Evaluate,
    Remove,
    Relabel,
    AddTags,
    RemoveTags,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Remove => "remove",
            Self::Relabel => "relabel",
            Self::AddTags => "add tags",
            Self::RemoveTags => "remove tags",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFailure {
    pub operation: Operation,
    pub message: String,
}

/// What happened to one torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentReport {
    pub hash: String,
    pub name: String,
    pub outcome: TorrentOutcome,
    pub failures: Vec<TorrentFailure>,
}

impl TorrentReport {
    #[must_use]
    pub fn new(hash: &str, name: &str) -> Self {
        Self {
            hash: hash.to_string(),
            name: name.to_string(),
            outcome: TorrentOutcome::Unchanged,
            failures: Vec::new(),
        }
    }

    pub fn fail(&mut self, operation: Operation, error: impl fmt::Display) {
        self.failures.push(TorrentFailure {
            operation,
            message: error.to_string(),
        });
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub ignored: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Torrents with at least one failed step.
    pub failed: usize,
    pub bytes_freed: u64,
}

impl RunStats {
    #[must_use]
    pub fn from_reports(reports: &[TorrentReport]) -> Self {
        let mut stats = Self {
            total: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match &report.outcome {
                TorrentOutcome::Ignored => stats.ignored += 1,
                TorrentOutcome::Removed { bytes_freed, .. } => {
                    stats.removed += 1;
                    stats.bytes_freed = stats.bytes_freed.saturating_add(*bytes_freed);
                }
                TorrentOutcome::Updated { .. } => stats.updated += 1,
                TorrentOutcome::Unchanged => stats.unchanged += 1,
            }
            if report.has_failures() {
                stats.failed += 1;
            }
        }
        stats
    }
}

/// Result of one client's run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub client: String,
    pub dry_run: bool,
    pub torrents: Vec<TorrentReport>,
    pub stats: RunStats,
    /// Ledger value after the last torrent, when it was measured.
    pub free_space_gb: Option<f64>,
}

impl RunReport {
    /// Reports for torrents with at least one failed step.
    pub fn failures(&self) -> impl Iterator<Item = &TorrentReport> {
        self.torrents.iter().filter(|report| report.has_failures())
    }

    /// Looks up a torrent report by hash.
    #[must_use]
    pub fn torrent(&self, hash: &str) -> Option<&TorrentReport> {
        self.torrents.iter().find(|report| report.hash == hash)
    }
}
