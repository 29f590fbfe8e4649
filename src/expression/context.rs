//! Record schema and evaluation contexts.
//!
//! Rules see a torrent as a flat set of camelCase variables. The same schema is
//! used to reject unknown identifiers at compile time and to build the
//! per-torrent context at evaluation time.

use evalexpr::{ContextWithMutableVariables, EvalexprError, HashMapContext, Value};

use crate::ledger::{FreeSpaceLedger, FreeSpaceView};
use crate::torrent::TorrentRecord;

use super::error::EvaluationError;

/// Variables that read the free-space ledger instead of the record.
pub const FREE_SPACE_FIELDS: [&str; 2] = ["freeSpaceGB", "freeSpaceSet"];

const TORRENT_FIELDS: [&str; 26] = [
    "hash",
    "name",
    "totalBytes",
    "downloadedBytes",
    "isDownloaded",
    "isSeeding",
    "ratio",
    "addedSeconds",
    "addedHours",
    "addedDays",
    "seedingSeconds",
    "seedingHours",
    "seedingDays",
    "path",
    "files",
    "label",
    "tags",
    "state",
    "trackerName",
    "trackerStatus",
    "seeds",
    "peers",
    "isUnregistered",
    "isTrackerDown",
    "freeSpaceGB",
    "freeSpaceSet",
];

/// The set of variables a predicate may reference.
#[derive(Debug, Clone, Copy)]
pub struct RecordShape {
    fields: &'static [&'static str],
}

impl RecordShape {
    /// The torrent record schema, including the free-space view.
    #[must_use]
    pub fn torrent() -> Self {
        Self {
            fields: &TORRENT_FIELDS,
        }
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }

    #[must_use]
    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }
}

/// Variables for evaluating every predicate against one torrent.
///
/// Built once per torrent per decision; the free-space values are read from
/// the ledger at build time, which is evaluation time for that torrent.
#[derive(Debug, Clone)]
pub struct RecordContext {
    hash: String,
    inner: HashMapContext,
}

impl RecordContext {
    /// Builds the evaluation context for `record` with the current free-space view.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] if a variable cannot be bound.
    pub fn build(record: &TorrentRecord, free_space: FreeSpaceView<'_>) -> Result<Self, EvaluationError> {
        bind_record(record, free_space)
            .map(|inner| Self {
                hash: record.hash.clone(),
                inner,
            })
            .map_err(|error| EvaluationError::new("<context>", &record.hash, error))
    }

    /// A zero-valued context used to type-check rules at compile time.
    pub(crate) fn sample() -> Result<Self, EvaluationError> {
        let ledger = FreeSpaceLedger::unset();
        Self::build(&TorrentRecord::default(), ledger.view())
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub(crate) fn variables(&self) -> &HashMapContext {
        &self.inner
    }
}

fn bind_record(
    record: &TorrentRecord,
    free_space: FreeSpaceView<'_>,
) -> Result<HashMapContext, EvalexprError> {
    let mut ctx = HashMapContext::new();
    let timing = record.timing;

    ctx.set_value("hash".into(), Value::from(record.hash.as_str()))?;
    ctx.set_value("name".into(), Value::from(record.name.as_str()))?;
    ctx.set_value("totalBytes".into(), Value::Int(record.total_bytes))?;
    ctx.set_value("downloadedBytes".into(), Value::Int(record.downloaded_bytes))?;
    ctx.set_value("isDownloaded".into(), Value::Boolean(record.is_downloaded))?;
    ctx.set_value("isSeeding".into(), Value::Boolean(record.is_seeding))?;
    ctx.set_value("ratio".into(), Value::Float(record.ratio))?;
    ctx.set_value("addedSeconds".into(), Value::Int(timing.added_seconds()))?;
    ctx.set_value("addedHours".into(), Value::Float(timing.added_hours()))?;
    ctx.set_value("addedDays".into(), Value::Float(timing.added_days()))?;
    ctx.set_value("seedingSeconds".into(), Value::Int(timing.seeding_seconds()))?;
    ctx.set_value("seedingHours".into(), Value::Float(timing.seeding_hours()))?;
    ctx.set_value("seedingDays".into(), Value::Float(timing.seeding_days()))?;
    ctx.set_value(
        "path".into(),
        Value::String(record.path.to_string_lossy().into_owned()),
    )?;
    ctx.set_value(
        "files".into(),
        Value::Tuple(
            record
                .files
                .iter()
                .map(|file| Value::String(file.to_string_lossy().into_owned()))
                .collect(),
        ),
    )?;
    ctx.set_value("label".into(), Value::from(record.label.as_str()))?;
    ctx.set_value(
        "tags".into(),
        Value::Tuple(record.tags.iter().map(|tag| Value::from(tag.as_str())).collect()),
    )?;
    ctx.set_value("state".into(), Value::from(record.state.as_str()))?;
    ctx.set_value("trackerName".into(), Value::from(record.tracker_name.as_str()))?;
    ctx.set_value(
        "trackerStatus".into(),
        Value::from(record.tracker_status.as_str()),
    )?;
    ctx.set_value("seeds".into(), Value::Int(record.seeds))?;
    ctx.set_value("peers".into(), Value::Int(record.peers))?;
    ctx.set_value("isUnregistered".into(), Value::Boolean(record.is_unregistered()))?;
    ctx.set_value("isTrackerDown".into(), Value::Boolean(record.is_tracker_down()))?;
    ctx.set_value("freeSpaceGB".into(), Value::Float(free_space.free_gb()))?;
    ctx.set_value("freeSpaceSet".into(), Value::Boolean(free_space.is_set()))?;

    Ok(ctx)
}
