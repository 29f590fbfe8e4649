//! TOML configuration: clients, filters, and their validation.
//!
//! ```toml
//! [clients.seedbox]
//! type = "qbittorrent"
//! url = "http://localhost:8080"
//! user = "admin"
//! password = "secret"
//! filter = "default"
//! hardlink_relabel = true
//!
//! [clients.seedbox.download_path_mapping]
//! "/downloads" = "/mnt/seedbox/downloads"
//!
//! [filters.default]
//! ignore = ['contains(tags, "keep")']
//! remove = ["isUnregistered", "ratio > 4.0 && seedingDays > 30"]
//!
//! [[filters.default.label]]
//! name = "archive"
//! update = ["isSeeding", "seedingDays > 14"]
//!
//! [[filters.default.tag]]
//! name = "slow"
//! mode = "full"
//! update = ["seeds < 2"]
//! ```

mod error;
mod paths;

pub use error::ConfigError;
pub use paths::PathMapper;

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::expression::{ExpressionSet, TagMode};

/// Directory name under the XDG config home.
pub const CONFIG_DIR_NAME: &str = "curator";
const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_SETTLE_MS: u64 = 60_000;

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Torrent clients keyed by name.
    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,
    /// Rule sets keyed by name.
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,
}

/// One torrent client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Disabled clients are never run.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Name of the filter in `[filters]` applied to this client.
    pub filter: String,
    /// Daemon-side download directory; its free space seeds the ledger.
    #[serde(default)]
    pub download_path: Option<PathBuf>,
    /// Daemon path prefix to local path prefix, used for hardlinking.
    #[serde(default)]
    pub download_path_mapping: BTreeMap<String, String>,
    /// Relabel by hardlinking files into the label directory first.
    #[serde(default)]
    pub hardlink_relabel: bool,
    /// Delete data from disk when removing a torrent.
    #[serde(default = "default_true")]
    pub delete_data: bool,
    /// Measure free space on this local path instead of asking the client.
    #[serde(default)]
    pub free_space_path: Option<PathBuf>,
    /// Backend type and connection settings.
    #[serde(flatten)]
    pub backend: BackendConfig,
}

impl ClientConfig {
    #[must_use]
    pub fn path_mapper(&self) -> PathMapper {
        PathMapper::new(&self.download_path_mapping)
    }
}

/// Backend-specific settings, selected by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Qbittorrent(QbittorrentConfig),
}

impl BackendConfig {
    /// The configured `type` value.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qbittorrent(_) => "qbittorrent",
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Qbittorrent(cfg) => &cfg.url,
        }
    }
}

/// qBittorrent Web API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QbittorrentConfig {
    /// Base URL of the Web UI, e.g. `http://localhost:8080`.
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Turn automatic torrent management back on after a plain relabel.
    #[serde(default)]
    pub enable_auto_tmm_after_relabel: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pauses between the steps of a removal.
    #[serde(default)]
    pub settle: SettleDelays,
}

/// Delays between pause, resume, reannounce and delete when removing a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    pub after_pause_ms: u64,
    pub after_resume_ms: u64,
    pub after_reannounce_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_pause_ms: 1_000,
            after_resume_ms: 2_000,
            after_reannounce_ms: 2_000,
        }
    }
}

impl SettleDelays {
    /// No delays at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            after_pause_ms: 0,
            after_resume_ms: 0,
            after_reannounce_ms: 0,
        }
    }

    #[must_use]
    pub fn after_pause(&self) -> Duration {
        Duration::from_millis(self.after_pause_ms)
    }

    #[must_use]
    pub fn after_resume(&self) -> Duration {
        Duration::from_millis(self.after_resume_ms)
    }

    #[must_use]
    pub fn after_reannounce(&self) -> Duration {
        Duration::from_millis(self.after_reannounce_ms)
    }
}

/// Rule strings of one filter, as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Any match excludes the torrent from every action.
    pub ignore: Vec<String>,
    /// Any match removes the torrent.
    pub remove: Vec<String>,
    /// Ordered; the first rule whose predicates all hold picks the label.
    pub label: Vec<LabelRuleConfig>,
    /// Evaluated independently.
    pub tag: Vec<TagRuleConfig>,
}

/// A label rule: all predicates must hold.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelRuleConfig {
    pub name: String,
    #[serde(default, alias = "update")]
    pub predicates: Vec<String>,
}

/// A tag rule with its add/remove policy.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRuleConfig {
    pub name: String,
    pub mode: TagMode,
    #[serde(default, alias = "update")]
    pub predicates: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/curator/config.toml`
/// 2. `$HOME/.config/curator/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

impl Config {
    /// Reads, parses and validates the config at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|error| ConfigError::read(path, error))?;
        let config = Self::parse(path, &raw)?;
        debug!(
            path = %path.display(),
            clients = config.clients.len(),
            filters = config.filters.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reads the config from `path`, or from the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no path can be derived, or any load error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = resolve_default_config_path().ok_or(ConfigError::NotFound)?;
                Self::load(&path)
            }
        }
    }

    /// Parses and validates TOML text; `path` is only used for messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on syntax, schema, or validation failures.
    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|error| ConfigError::parse(path, error))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-references and value domains.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients.is_empty() {
            return Err(ConfigError::NoClients);
        }

        for (name, client) in &self.clients {
            if !self.filters.contains_key(&client.filter) {
                return Err(ConfigError::unknown_filter(name, &client.filter));
            }
            validate_url(name, client.backend.url())?;

            for remote in client.download_path_mapping.keys() {
                if !Path::new(remote).is_absolute() {
                    return Err(ConfigError::invalid_value(
                        &format!("clients.{name}.download_path_mapping"),
                        &format!("'{remote}' is not an absolute path"),
                    ));
                }
            }

            match &client.backend {
                BackendConfig::Qbittorrent(qbt) => validate_qbittorrent(name, qbt)?,
            }
        }

        for (name, filter) in &self.filters {
            validate_filter(name, filter)?;
        }

        Ok(())
    }

    /// Picks the clients to run: the named ones, or every client when `names` is empty.
    ///
    /// Disabled clients are skipped either way.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownClient`] if a name is not configured.
    pub fn select_clients<'a>(
        &'a self,
        names: &[String],
    ) -> Result<Vec<(&'a str, &'a ClientConfig)>, ConfigError> {
        for name in names {
            if !self.clients.contains_key(name) {
                return Err(ConfigError::unknown_client(name, self.clients.keys()));
            }
        }

        let selected = self
            .clients
            .iter()
            .filter(|(name, _)| names.is_empty() || names.contains(name))
            .filter(|(name, client)| {
                if !client.enabled {
                    warn!(client = %name, "Skipping disabled client");
                }
                client.enabled
            })
            .map(|(name, client)| (name.as_str(), client))
            .collect();
        Ok(selected)
    }

    /// Compiles every filter referenced by `clients`.
    ///
    /// Each filter is compiled once, however many clients share it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Compile`] listing every failing rule of the first bad filter.
    pub fn compile_filters(
        &self,
        clients: &[(&str, &ClientConfig)],
    ) -> Result<HashMap<String, Arc<ExpressionSet>>, ConfigError> {
        let mut compiled: HashMap<String, Arc<ExpressionSet>> = HashMap::new();
        for (client, config) in clients {
            if compiled.contains_key(&config.filter) {
                continue;
            }
            let filter = self
                .filters
                .get(&config.filter)
                .ok_or_else(|| ConfigError::unknown_filter(client, &config.filter))?;
            let set = ExpressionSet::compile(filter)
                .map_err(|errors| ConfigError::compile(&config.filter, errors))?;
            debug!(filter = %config.filter, predicates = set.len(), "Compiled filter");
            compiled.insert(config.filter.clone(), Arc::new(set));
        }
        Ok(compiled)
    }
}

fn validate_url(client: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|error| ConfigError::invalid_url(client, raw, error))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_url(
            client,
            raw,
            "expected an http or https URL",
        ));
    }
    Ok(())
}

fn validate_qbittorrent(client: &str, cfg: &QbittorrentConfig) -> Result<(), ConfigError> {
    validate_timeout_secs(
        &format!("clients.{client}.connect_timeout_secs"),
        cfg.connect_timeout_secs,
    )?;
    validate_timeout_secs(&format!("clients.{client}.timeout_secs"), cfg.timeout_secs)?;
    for (field, value) in [
        ("after_pause_ms", cfg.settle.after_pause_ms),
        ("after_resume_ms", cfg.settle.after_resume_ms),
        ("after_reannounce_ms", cfg.settle.after_reannounce_ms),
    ] {
        if value > MAX_SETTLE_MS {
            return Err(ConfigError::invalid_value(
                &format!("clients.{client}.settle.{field}"),
                &format!("{value}. Expected range: 0..={MAX_SETTLE_MS}"),
            ));
        }
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid_value(
            field,
            &format!("{value}. Expected range: 1..=3600"),
        ));
    }
    Ok(())
}

fn validate_filter(name: &str, filter: &FilterConfig) -> Result<(), ConfigError> {
    for (index, rule) in filter.label.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                &format!("filters.{name}.label[{index}].name"),
                "label name must not be empty",
            ));
        }
    }
    for (index, rule) in filter.tag.iter().enumerate() {
        let field = format!("filters.{name}.tag[{index}].name");
        if rule.name.trim().is_empty() {
            return Err(ConfigError::invalid_value(&field, "tag name must not be empty"));
        }
        if rule.name.contains(',') {
            return Err(ConfigError::invalid_value(
                &field,
                "tag name must not contain ','",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[clients.seedbox]
type = "qbittorrent"
url = "http://localhost:8080"
user = "admin"
password = "secret"
filter = "default"
hardlink_relabel = true
download_path = "/downloads"

[clients.seedbox.download_path_mapping]
"/downloads" = "/mnt/seedbox"

[clients.seedbox.settle]
after_pause_ms = 10

[clients.spare]
type = "qbittorrent"
url = "https://spare.example.com"
filter = "default"
enabled = false

[filters.default]
ignore = ['contains(tags, "keep")']
remove = ["isUnregistered", "ratio > 4.0 && seedingDays > 30"]

[[filters.default.label]]
name = "archive"
update = ["isSeeding", "seedingDays > 14"]

[[filters.default.tag]]
name = "slow"
mode = "full"
update = ["seeds < 2"]
"#;

    fn parse(raw: &str) -> Result<Config, ConfigError> {
        Config::parse(Path::new("config.toml"), raw)
    }

    #[test]
    fn test_parse_sample_config() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.clients.len(), 2);

        let seedbox = &config.clients["seedbox"];
        assert!(seedbox.enabled);
        assert!(seedbox.delete_data, "delete_data defaults to true");
        assert!(seedbox.hardlink_relabel);
        assert_eq!(seedbox.download_path.as_deref(), Some(Path::new("/downloads")));
        assert_eq!(
            seedbox.path_mapper().to_local(Path::new("/downloads/a")),
            PathBuf::from("/mnt/seedbox/a")
        );

        let BackendConfig::Qbittorrent(qbt) = &seedbox.backend;
        assert_eq!(qbt.user, "admin");
        assert_eq!(qbt.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(qbt.settle.after_pause_ms, 10);
        assert_eq!(qbt.settle.after_resume_ms, 2_000);

        let filter = &config.filters["default"];
        assert_eq!(filter.remove.len(), 2);
        assert_eq!(filter.label[0].predicates.len(), 2);
        assert_eq!(filter.tag[0].mode, TagMode::Full);
    }

    #[test]
    fn test_select_clients_skips_disabled() {
        let config = parse(SAMPLE).unwrap();
        let selected = config.select_clients(&[]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "seedbox");

        let selected = config.select_clients(&["spare".to_string()]).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_select_unknown_client_fails() {
        let config = parse(SAMPLE).unwrap();
        let err = config.select_clients(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClient { .. }));
    }

    #[test]
    fn test_compile_filters_shares_sets() {
        let config = parse(SAMPLE).unwrap();
        let selected = config.select_clients(&[]).unwrap();
        let compiled = config.compile_filters(&selected).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled["default"].labels[0].name, "archive");
    }

    #[test]
    fn test_compile_filters_reports_bad_rules() {
        let raw = SAMPLE.replace("seeds < 2", "seeds <");
        let config = parse(&raw).unwrap();
        let selected = config.select_clients(&[]).unwrap();
        let err = config.compile_filters(&selected).unwrap_err();
        assert!(matches!(err, ConfigError::Compile { ref filter, .. } if filter == "default"));
        assert!(err.to_string().contains("tag[0] 'slow'"));
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let raw = SAMPLE.replace("filter = \"default\"\nhardlink", "filter = \"other\"\nhardlink");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFilter { ref filter, .. } if filter == "other"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let raw = SAMPLE.replace("http://localhost:8080", "localhost:8080");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }), "got {err}");
    }

    #[test]
    fn test_unknown_backend_type_is_parse_error() {
        let raw = SAMPLE.replace("type = \"qbittorrent\"\nurl = \"http", "type = \"rtorrent\"\nurl = \"http");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_tag_mode_is_parse_error() {
        let raw = SAMPLE.replace("mode = \"full\"", "mode = \"sometimes\"");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_relative_mapping_key_rejected() {
        let raw = SAMPLE.replace("\"/downloads\" = ", "\"downloads\" = ");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_no_clients_rejected() {
        let err = parse("[filters.default]\nremove = [\"true\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoClients));
    }

    #[test]
    fn test_tag_name_with_comma_rejected() {
        let raw = SAMPLE.replace("name = \"slow\"", "name = \"slow,old\"");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field.contains("tag[0]")));
    }

    #[test]
    fn test_timeout_out_of_range_rejected() {
        let raw = SAMPLE.replace("password = \"secret\"", "password = \"secret\"\ntimeout_secs = 0");
        let err = parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.filters.len(), 1);

        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_config_path_prefers_xdg() {
        let path = config_path_from(Some("/xdg".into()), Some("/home/u".into())).unwrap();
        assert_eq!(path, PathBuf::from("/xdg/curator/config.toml"));

        let path = config_path_from(None, Some("/home/u".into())).unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.config/curator/config.toml"));

        assert!(config_path_from(None, None).is_none());
    }
}
