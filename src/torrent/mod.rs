//! Per-run torrent snapshots.
//!
//! A [`TorrentRecord`] captures everything the rule engine may inspect about
//! one torrent at enumeration time. Records are built once per run by a
//! [`TorrentClient`](crate::client::TorrentClient) and never mutated afterwards;
//! the only value that changes between evaluations (free space) is read through
//! the ledger instead of being stored here.

mod tracker;

pub use tracker::{
    TrackerEntry, is_pseudo_tracker, is_tracker_down_status, is_unregistered_status,
    load_suffix_list, registrable_domain, select_primary_tracker, tracker_domain,
};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;
const SECONDS_PER_DAY: f64 = SECONDS_PER_HOUR * 24.0;

/// Enumerated torrents keyed by info hash.
pub type TorrentMap = BTreeMap<String, TorrentRecord>;

/// Age and seeding duration of a torrent.
///
/// Hours and days are derived from the second counts, never sourced separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TorrentTiming {
    added_seconds: i64,
    seeding_seconds: i64,
}

impl TorrentTiming {
    /// Creates timing from precomputed second counts.
    #[must_use]
    pub fn new(added_seconds: i64, seeding_seconds: i64) -> Self {
        Self {
            added_seconds: added_seconds.max(0),
            seeding_seconds: seeding_seconds.max(0),
        }
    }

    /// Derives timing from the unix timestamp a torrent was added and its total seeding time.
    #[must_use]
    pub fn from_added_at(added_at_unix: i64, now_unix: i64, seeding_seconds: i64) -> Self {
        Self::new(now_unix.saturating_sub(added_at_unix), seeding_seconds)
    }

    #[must_use]
    pub fn added_seconds(&self) -> i64 {
        self.added_seconds
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn added_hours(&self) -> f64 {
        self.added_seconds as f64 / SECONDS_PER_HOUR
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn added_days(&self) -> f64 {
        self.added_seconds as f64 / SECONDS_PER_DAY
    }

    #[must_use]
    pub fn seeding_seconds(&self) -> i64 {
        self.seeding_seconds
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn seeding_hours(&self) -> f64 {
        self.seeding_seconds as f64 / SECONDS_PER_HOUR
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn seeding_days(&self) -> f64 {
        self.seeding_seconds as f64 / SECONDS_PER_DAY
    }
}

/// Read-only snapshot of one torrent for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentRecord {
    /// Info hash; unique key within a client.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Declared size of the selected data in bytes.
    pub total_bytes: i64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: i64,
    /// True once the backend no longer reports a downloading state.
    pub is_downloaded: bool,
    /// True while the backend reports an active seeding state.
    pub is_seeding: bool,
    /// Upload/download share ratio.
    pub ratio: f64,
    /// Added and seeding durations.
    pub timing: TorrentTiming,
    /// Current save directory as seen by the backend.
    pub path: PathBuf,
    /// Absolute file paths in backend order.
    pub files: Vec<PathBuf>,
    /// Current label (category).
    pub label: String,
    /// Current tags.
    pub tags: BTreeSet<String>,
    /// Backend-native state string.
    pub state: String,
    /// Registrable domain of the primary tracker, empty when none.
    pub tracker_name: String,
    /// Status message of the primary tracker.
    pub tracker_status: String,
    /// Seeds in the swarm.
    pub seeds: i64,
    /// Peers in the swarm.
    pub peers: i64,
}

impl TorrentRecord {
    /// Creates a record with identity set and every other field zeroed.
    #[must_use]
    pub fn new(hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns true if the torrent currently carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true if the primary tracker reports the torrent as unregistered.
    #[must_use]
    pub fn is_unregistered(&self) -> bool {
        is_unregistered_status(&self.tracker_status)
    }

    /// Returns true if the primary tracker could not be reached.
    #[must_use]
    pub fn is_tracker_down(&self) -> bool {
        is_tracker_down_status(&self.tracker_status)
    }
}

/// Splits a backend tag list such as `"a, b,c"` into a tag set.
#[must_use]
pub fn parse_tag_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}
