//! qBittorrent Web API v2 backend.
//!
//! Authentication is a session cookie (`SID`) kept in a private cookie jar.
//! Enumeration calls `torrents/info` once and then fetches properties,
//! trackers, and files for every torrent; any failure aborts the whole listing.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, RequestBuilder, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, trace};
use url::Url;

use crate::config::{PathMapper, QbittorrentConfig, SettleDelays};
use crate::torrent::{
    TorrentMap, TorrentRecord, TorrentTiming, TrackerEntry, parse_tag_list, select_primary_tracker,
    tracker_domain,
};

use super::hardlink::LinkPlan;
use super::http::{HttpTimeouts, build_http_client};
use super::{ClientError, TorrentClient, join_tags};

/// Oldest Web API version this backend talks to.
pub const MIN_API_VERSION: ApiVersion = ApiVersion::new(2, 2, 0);

/// First Web API version where `pause`/`resume` became `stop`/`start`.
const STOP_START_API_VERSION: ApiVersion = ApiVersion::new(2, 11, 0);

/// States in which a torrent still has data to fetch.
const INCOMPLETE_STATES: [&str; 8] = [
    "downloading",
    "stalledDL",
    "queuedDL",
    "pausedDL",
    "stoppedDL",
    "checkingDL",
    "metaDL",
    "forcedDL",
];

/// States in which a torrent is actively seeding.
const SEEDING_STATES: [&str; 2] = ["uploading", "stalledUP"];

/// A `major.minor.patch` Web API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion(u32, u32, u32);

impl ApiVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self(major, minor, patch)
    }

    /// Parses `2.8.3`, `v2.11` and similar; missing components are zero.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().trim_start_matches('v').split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        Some(Self(major, minor, patch))
    }

    fn uses_stop_start(self) -> bool {
        self >= STOP_START_API_VERSION
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// State learned during `connect`.
#[derive(Debug, Clone)]
struct Session {
    api_version: ApiVersion,
    label_paths: HashMap<String, PathBuf>,
}

/// qBittorrent client.
pub struct QbittorrentClient {
    name: String,
    base: Url,
    user: String,
    password: String,
    enable_auto_tmm_after_relabel: bool,
    settle: SettleDelays,
    mapper: PathMapper,
    http: Client,
    session: Option<Session>,
}

impl fmt::Debug for QbittorrentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QbittorrentClient")
            .field("name", &self.name)
            .field("base", &self.base.as_str())
            .field("user", &self.user)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl QbittorrentClient {
    /// Creates an unconnected client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the URL is unusable or the HTTP client cannot be built.
    pub fn new(name: &str, config: &QbittorrentConfig, mapper: PathMapper) -> Result<Self, ClientError> {
        let mut base =
            Url::parse(&config.url).map_err(|error| ClientError::invalid_url(&config.url, error))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = build_http_client(
            base.as_str(),
            HttpTimeouts::from_secs(config.connect_timeout_secs, config.timeout_secs),
            Arc::new(Jar::default()),
        )?;

        Ok(Self {
            name: name.to_string(),
            base,
            user: config.user.clone(),
            password: config.password.clone(),
            enable_auto_tmm_after_relabel: config.enable_auto_tmm_after_relabel,
            settle: config.settle,
            mapper,
            http,
            session: None,
        })
    }

    /// API version negotiated by `connect`, if connected.
    #[must_use]
    pub fn api_version(&self) -> Option<ApiVersion> {
        self.session.as_ref().map(|session| session.api_version)
    }

    /// Save directory of `label`, if connected and the label exists.
    #[must_use]
    pub fn label_path(&self, label: &str) -> Option<&Path> {
        self.session
            .as_ref()
            .and_then(|session| session.label_paths.get(label))
            .map(PathBuf::as_path)
    }

    fn session(&self) -> Result<&Session, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotConnected)
    }

    fn endpoint(&self, endpoint: &str) -> Result<Url, ClientError> {
        self.base
            .join(&format!("api/v2/{endpoint}"))
            .map_err(|error| ClientError::invalid_url(self.base.as_str(), error))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request
            .header(header::REFERER, self.base.as_str())
            .send()
            .await
            .map_err(|error| ClientError::http(endpoint, error))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ClientError::http(endpoint, error))?;
        if !status.is_success() {
            return Err(ClientError::status(endpoint, status.as_u16(), &body));
        }
        trace!(client = %self.name, endpoint, status = status.as_u16(), "qBittorrent call");
        Ok(body)
    }

    async fn get_text(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<String, ClientError> {
        let url = self.endpoint(endpoint)?;
        self.send(endpoint, self.http.get(url).query(query)).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let body = self.get_text(endpoint, query).await?;
        serde_json::from_str(&body).map_err(|error| ClientError::decode(endpoint, error))
    }

    async fn post_form(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<String, ClientError> {
        let url = self.endpoint(endpoint)?;
        self.send(endpoint, self.http.post(url).form(form)).await
    }

    async fn login(&self) -> Result<(), ClientError> {
        if self.user.is_empty() {
            debug!(client = %self.name, "No user configured; relying on auth bypass");
            return Ok(());
        }

        let endpoint = "auth/login";
        let form = [("username", self.user.as_str()), ("password", self.password.as_str())];
        let body = match self.post_form(endpoint, &form).await {
            Ok(body) => body,
            Err(ClientError::Status { status: 403, .. }) => {
                return Err(ClientError::auth(
                    self.base.as_str(),
                    "too many failed attempts, the client has banned this address",
                ));
            }
            Err(error) => return Err(error),
        };
        if body.trim() != "Ok." {
            return Err(ClientError::auth(self.base.as_str(), body.trim()));
        }
        Ok(())
    }

    async fn fetch_api_version(&self) -> Result<ApiVersion, ClientError> {
        let endpoint = "app/webapiVersion";
        let raw = self.get_text(endpoint, &[]).await?;
        let version = ApiVersion::parse(&raw)
            .ok_or_else(|| ClientError::decode(endpoint, format!("unparseable version {raw:?}")))?;
        if version < MIN_API_VERSION {
            return Err(ClientError::unsupported_version(
                version.to_string(),
                MIN_API_VERSION.to_string(),
            ));
        }
        Ok(version)
    }

    async fn fetch_label_paths(&self) -> Result<HashMap<String, PathBuf>, ClientError> {
        let preferences: Preferences = self.get_json("app/preferences", &[]).await?;
        let categories: HashMap<String, Category> =
            self.get_json("torrents/categories", &[]).await?;
        Ok(label_paths(Path::new(&preferences.save_path), categories))
    }

    async fn torrent_properties(&self, hash: &str) -> Result<TorrentProperties, ClientError> {
        self.get_json("torrents/properties", &[("hash", hash)]).await
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
        self.get_json("torrents/files", &[("hash", hash)]).await
    }

    async fn set_auto_management(&self, hash: &str, enable: bool) -> Result<(), ClientError> {
        let enable = if enable { "true" } else { "false" };
        self.post_form(
            "torrents/setAutoManagement",
            &[("hashes", hash), ("enable", enable)],
        )
        .await
        .map(drop)
    }

    async fn wait(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TorrentClient for QbittorrentClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "qbittorrent"
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn connect(&mut self) -> Result<(), ClientError> {
        self.login().await?;
        let api_version = self.fetch_api_version().await?;
        let label_paths = self.fetch_label_paths().await?;
        info!(
            client = %self.name,
            api_version = %api_version,
            labels = label_paths.len(),
            "Connected to qBittorrent"
        );
        self.session = Some(Session {
            api_version,
            label_paths,
        });
        Ok(())
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn list_torrents(&self) -> Result<TorrentMap, ClientError> {
        self.session()?;
        let listed: Vec<TorrentInfo> = self.get_json("torrents/info", &[]).await?;
        debug!(client = %self.name, count = listed.len(), "Listed torrents");

        let now = unix_now();
        let mut torrents = TorrentMap::new();
        for info in listed {
            let hash = info.hash.as_str();
            let properties = self.torrent_properties(hash).await?;
            let trackers: Vec<TrackerInfo> =
                self.get_json("torrents/trackers", &[("hash", hash)]).await?;
            let files = self.torrent_files(hash).await?;
            let record = build_record(&info, &properties, &trackers, &files, now);
            torrents.insert(record.hash.clone(), record);
        }
        Ok(torrents)
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn current_free_space(&self, path: &Path) -> Result<u64, ClientError> {
        self.session()?;
        let data: MainData = self.get_json("sync/maindata", &[("rid", "0")]).await?;
        u64::try_from(data.server_state.free_space_on_disk).map_err(|_| {
            ClientError::free_space(
                path,
                format!(
                    "client reported {} bytes",
                    data.server_state.free_space_on_disk
                ),
            )
        })
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn remove_torrent(&self, hash: &str, delete_data: bool) -> Result<bool, ClientError> {
        let session = self.session()?;
        let (pause, resume) = if session.api_version.uses_stop_start() {
            ("torrents/stop", "torrents/start")
        } else {
            ("torrents/pause", "torrents/resume")
        };
        let hashes = [("hashes", hash)];

        // Cycling the torrent and reannouncing makes the tracker record the final stats.
        self.post_form(pause, &hashes).await?;
        self.wait(self.settle.after_pause()).await;
        self.post_form(resume, &hashes).await?;
        self.wait(self.settle.after_resume()).await;
        self.post_form("torrents/reannounce", &hashes).await?;
        self.wait(self.settle.after_reannounce()).await;

        let delete_files = if delete_data { "true" } else { "false" };
        self.post_form(
            "torrents/delete",
            &[("hashes", hash), ("deleteFiles", delete_files)],
        )
        .await?;
        Ok(true)
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn relabel(&self, hash: &str, label: &str, hardlink: bool) -> Result<(), ClientError> {
        let session = self.session()?;

        if hardlink {
            let label_path = session
                .label_paths
                .get(label)
                .ok_or_else(|| ClientError::label_path_missing(label))?;
            let properties = self.torrent_properties(hash).await?;
            let save_path = PathBuf::from(&properties.save_path);

            if save_path != *label_path {
                let files: Vec<PathBuf> = self
                    .torrent_files(hash)
                    .await?
                    .into_iter()
                    .map(|file| PathBuf::from(file.name))
                    .collect();
                let plan = LinkPlan::new(&save_path, label_path, &files, &self.mapper)?;
                plan.execute()?;
            }

            // Setting the location before the category makes qBittorrent
            // recheck the linked files instead of moving over them.
            self.set_auto_management(hash, false).await?;
            let location = label_path.to_string_lossy();
            self.post_form(
                "torrents/setLocation",
                &[("hashes", hash), ("location", &*location)],
            )
            .await?;
        }

        self.post_form(
            "torrents/setCategory",
            &[("hashes", hash), ("category", label)],
        )
        .await?;

        if self.enable_auto_tmm_after_relabel && !hardlink {
            self.set_auto_management(hash, true).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn add_tags(&self, hash: &str, tags: &BTreeSet<String>) -> Result<(), ClientError> {
        if tags.is_empty() {
            return Ok(());
        }
        self.session()?;
        let joined = join_tags(tags);
        self.post_form("torrents/addTags", &[("hashes", hash), ("tags", joined.as_str())])
            .await
            .map(drop)
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn remove_tags(&self, hash: &str, tags: &BTreeSet<String>) -> Result<(), ClientError> {
        if tags.is_empty() {
            return Ok(());
        }
        self.session()?;
        let joined = join_tags(tags);
        self.post_form(
            "torrents/removeTags",
            &[("hashes", hash), ("tags", joined.as_str())],
        )
        .await
        .map(drop)
    }
}

#[derive(Debug, Deserialize)]
struct Preferences {
    #[serde(default)]
    save_path: String,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default, rename = "savePath")]
    save_path: String,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    tags: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TorrentProperties {
    save_path: String,
    total_downloaded: i64,
    share_ratio: f64,
    addition_date: i64,
    seeding_time: i64,
    seeds_total: i64,
    peers_total: i64,
}

#[derive(Debug, Deserialize)]
struct TrackerInfo {
    url: String,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TorrentFile {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MainData {
    server_state: ServerState,
}

#[derive(Debug, Deserialize)]
struct ServerState {
    #[serde(default)]
    free_space_on_disk: i64,
}

/// Directory per category: empty path is `<save_path>/<name>`, absolute is
/// used as is, relative is joined onto `save_path`.
fn label_paths(save_path: &Path, categories: HashMap<String, Category>) -> HashMap<String, PathBuf> {
    categories
        .into_iter()
        .map(|(name, category)| {
            let path = if category.save_path.is_empty() {
                save_path.join(&name)
            } else {
                save_path.join(&category.save_path)
            };
            (name, path)
        })
        .collect()
}

fn build_record(
    info: &TorrentInfo,
    properties: &TorrentProperties,
    trackers: &[TrackerInfo],
    files: &[TorrentFile],
    now_unix: i64,
) -> TorrentRecord {
    let entries: Vec<TrackerEntry> = trackers
        .iter()
        .map(|tracker| TrackerEntry::new(&tracker.url, &tracker.msg))
        .collect();
    let (tracker_name, tracker_status) = select_primary_tracker(&entries)
        .map(|entry| (tracker_domain(&entry.url), entry.message.clone()))
        .unwrap_or_default();

    let save_path = PathBuf::from(&properties.save_path);
    let state = info.state.as_str();

    TorrentRecord {
        hash: info.hash.clone(),
        name: info.name.clone(),
        total_bytes: info.size,
        downloaded_bytes: properties.total_downloaded,
        is_downloaded: !state_in(state, &INCOMPLETE_STATES),
        is_seeding: state_in(state, &SEEDING_STATES),
        ratio: properties.share_ratio,
        timing: TorrentTiming::from_added_at(
            properties.addition_date,
            now_unix,
            properties.seeding_time,
        ),
        files: files.iter().map(|file| save_path.join(&file.name)).collect(),
        path: save_path,
        label: info.category.clone(),
        tags: parse_tag_list(&info.tags),
        state: info.state.clone(),
        tracker_name,
        tracker_status,
        seeds: properties.seeds_total,
        peers: properties.peers_total,
    }
}

fn state_in(state: &str, states: &[&str]) -> bool {
    states.iter().any(|candidate| candidate.eq_ignore_ascii_case(state))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
