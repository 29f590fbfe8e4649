//! Configuration errors.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::expression::CompileErrors;

/// Errors raised while loading or validating configuration.
///
/// Every variant is fatal before any client is contacted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config path given and none could be derived from the environment.
    #[error(
        "no configuration file found\n  Suggestion: pass --config PATH or create $XDG_CONFIG_HOME/curator/config.toml"
    )]
    NotFound,

    /// The config file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or does not match the schema.
    #[error("failed to parse config file '{}': {reason}", path.display())]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Deserializer message, including the offending key or line.
        reason: String,
    },

    /// The config declares no clients.
    #[error("configuration declares no clients\n  Suggestion: add a [clients.<name>] table")]
    NoClients,

    /// A client references a filter that is not declared.
    #[error("client '{client}' references unknown filter '{filter}'")]
    UnknownFilter {
        /// Client name.
        client: String,
        /// Missing filter name.
        filter: String,
    },

    /// A client URL does not parse.
    #[error("client '{client}' has invalid url '{url}': {reason}")]
    InvalidUrl {
        /// Client name.
        client: String,
        /// The URL as written.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A value is outside its allowed domain.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending key.
        field: String,
        /// What is wrong.
        reason: String,
    },

    /// A `--client` selection names no configured client.
    #[error("unknown client '{name}'\n  Suggestion: configured clients are: {available}")]
    UnknownClient {
        /// Requested client name.
        name: String,
        /// Comma separated configured client names.
        available: String,
    },

    /// One or more rules of a filter failed to compile.
    #[error("filter '{filter}': {errors}")]
    Compile {
        /// Filter name.
        filter: String,
        /// Every failing rule.
        errors: CompileErrors,
    },
}

impl ConfigError {
    /// Creates a `Read` error.
    #[must_use]
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `UnknownFilter` error.
    #[must_use]
    pub fn unknown_filter(client: &str, filter: &str) -> Self {
        Self::UnknownFilter {
            client: client.to_string(),
            filter: filter.to_string(),
        }
    }

    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(client: &str, url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            client: client.to_string(),
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `UnknownClient` error.
    #[must_use]
    pub fn unknown_client<'a>(name: &str, available: impl IntoIterator<Item = &'a String>) -> Self {
        let available: Vec<&str> = available.into_iter().map(String::as_str).collect();
        Self::UnknownClient {
            name: name.to_string(),
            available: available.join(", "),
        }
    }

    /// Creates a `Compile` error.
    #[must_use]
    pub fn compile(filter: &str, errors: CompileErrors) -> Self {
        Self::Compile {
            filter: filter.to_string(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_filter_message() {
        let err = ConfigError::unknown_filter("qbt", "movies");
        assert_eq!(
            err.to_string(),
            "client 'qbt' references unknown filter 'movies'"
        );
    }

    #[test]
    fn test_unknown_client_lists_available() {
        let names = ["a".to_string(), "b".to_string()];
        let err = ConfigError::unknown_client("c", &names);
        let msg = err.to_string();
        assert!(msg.contains("unknown client 'c'"));
        assert!(msg.contains("a, b"));
    }

    #[test]
    fn test_read_error_keeps_source() {
        let err = ConfigError::read(
            Path::new("/nope/config.toml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/nope/config.toml"));
    }
}
