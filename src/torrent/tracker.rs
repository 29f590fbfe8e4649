//! Tracker selection and status classification.

use std::net::IpAddr;
use std::path::Path;
use std::sync::LazyLock;

use publicsuffix::{List, Psl};
use tracing::{debug, warn};
use url::Url;

/// Markers used by backends for peer sources that are not real trackers.
const PSEUDO_TRACKER_MARKERS: [&str; 3] = ["[DHT]", "[PeX]", "[LSD]"];

/// Where distributions install the Public Suffix List.
pub const SYSTEM_SUFFIX_LIST: &str = "/usr/share/publicsuffix/public_suffix_list.dat";

static SYSTEM_SUFFIXES: LazyLock<Option<List>> =
    LazyLock::new(|| load_suffix_list(Path::new(SYSTEM_SUFFIX_LIST)));

/// Second-level labels that sit under a country code (`example.co.uk`).
/// Only used when no suffix list is installed.
const COMMON_SECOND_LEVEL_LABELS: [&str; 8] = ["co", "com", "net", "org", "ac", "gov", "edu", "ne"];

const UNREGISTERED_STATUSES: [&str; 14] = [
    "complete season uploaded",
    "dead",
    "dupe",
    "i'm sorry dave, i can't do that",
    "infohash not found",
    "not registered",
    "nuked",
    "pack is available",
    "packs are available",
    "problem with description",
    "problem with file",
    "problem with pack",
    "specifically banned",
    "torrent has been deleted",
];

const TRACKER_DOWN_STATUSES: [&str; 8] = [
    "bad gateway",
    "connection refused",
    "connection timed out",
    "not working",
    "service unavailable",
    "timed out",
    "tracker is down",
    "unreachable",
];

/// One tracker entry as listed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerEntry {
    /// Announce URL or pseudo-tracker marker.
    pub url: String,
    /// Last status message reported for this tracker.
    pub message: String,
}

impl TrackerEntry {
    #[must_use]
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Returns true for DHT, PeX and LSD pseudo-tracker entries.
#[must_use]
pub fn is_pseudo_tracker(url: &str) -> bool {
    PSEUDO_TRACKER_MARKERS
        .iter()
        .any(|marker| url.contains(marker))
}

/// Selects the first real tracker in listed order.
#[must_use]
pub fn select_primary_tracker(entries: &[TrackerEntry]) -> Option<&TrackerEntry> {
    entries.iter().find(|entry| !is_pseudo_tracker(&entry.url))
}

/// Reads a Public Suffix List file, or `None` if it is absent or malformed.
#[must_use]
pub fn load_suffix_list(path: &Path) -> Option<List> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!(path = %path.display(), error = %error, "No public suffix list; using built-in domain rules");
            return None;
        }
    };
    match List::from_bytes(&bytes) {
        Ok(list) => Some(list),
        Err(error) => {
            warn!(path = %path.display(), error = %error, "Ignoring unreadable public suffix list");
            None
        }
    }
}

/// Extracts the registrable domain of a tracker URL using the system suffix list.
///
/// `https://tracker.example.org:443/announce` yields `example.org`; IP hosts
/// are returned verbatim. Unparseable input is returned unchanged.
#[must_use]
pub fn tracker_domain(raw_url: &str) -> String {
    registrable_domain(raw_url, SYSTEM_SUFFIXES.as_ref())
}

/// Like [`tracker_domain`] with an explicit suffix list. Without one, a
/// country-code heuristic decides how many labels to keep.
#[must_use]
pub fn registrable_domain(raw_url: &str, suffixes: Option<&List>) -> String {
    let Ok(url) = Url::parse(raw_url) else {
        return raw_url.to_string();
    };
    let Some(host) = url.host_str() else {
        return raw_url.to_string();
    };
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }

    let listed = suffixes
        .and_then(|list| list.domain(host.as_bytes()))
        .and_then(|domain| std::str::from_utf8(domain.as_bytes()).ok())
        .map(str::to_string);
    if let Some(domain) = listed {
        return domain;
    }

    let labels: Vec<&str> = host.split('.').filter(|label| !label.is_empty()).collect();
    let keep = match labels.as_slice() {
        [.., second, top]
            if top.len() == 2 && COMMON_SECOND_LEVEL_LABELS.contains(second) && labels.len() > 2 =>
        {
            3
        }
        _ => 2,
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}

/// Returns true if a tracker message says the torrent is no longer registered.
#[must_use]
pub fn is_unregistered_status(message: &str) -> bool {
    let message = message.to_lowercase();
    !message.is_empty()
        && UNREGISTERED_STATUSES
            .iter()
            .any(|status| message.contains(status))
}

/// Returns true if a tracker message indicates the tracker itself is unreachable.
#[must_use]
pub fn is_tracker_down_status(message: &str) -> bool {
    let message = message.to_lowercase();
    !message.is_empty()
        && TRACKER_DOWN_STATUSES
            .iter()
            .any(|status| message.contains(status))
}
