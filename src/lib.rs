//! Curator Core Library
//!
//! Rule-driven housekeeping for torrent clients: every torrent is evaluated
//! against a named filter of boolean rules, and the outcome decides whether it
//! is ignored, removed, relabeled, or retagged.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`torrent`] - Backend-neutral torrent records and tracker classification
//! - [`expression`] - Rule compilation and evaluation
//! - [`decision`] - Per-torrent decisions from compiled rules
//! - [`ledger`] - Running free-space estimate for one client run
//! - [`client`] - The `TorrentClient` capability trait and the qBittorrent backend
//! - [`coordinator`] - Sequential enumerate/decide/act pipeline per client
//! - [`config`] - TOML configuration and validation
//! - [`app`] - Concurrent runs over every selected client

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod decision;
pub mod expression;
pub mod ledger;
pub mod torrent;

// Re-export commonly used types
pub use app::{ProcessExit, determine_exit_outcome, plan_clients, run_clients};
pub use client::{ClientError, QbittorrentClient, TorrentClient, build_client};
pub use config::{ClientConfig, Config, ConfigError, FilterConfig};
pub use coordinator::{
    ActionCoordinator, CoordinatorOptions, FreeSpaceSource, RunError, RunReport, RunStats,
    TorrentOutcome, TorrentReport,
};
pub use decision::{Decision, decide};
pub use expression::{CompileError, CompileErrors, EvaluationError, ExpressionSet, TagMode};
pub use ledger::{FreeSpaceLedger, FreeSpaceView};
pub use torrent::{TorrentMap, TorrentRecord, TorrentTiming};
