//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Rule-driven housekeeping for torrent clients.
///
/// Curator evaluates every torrent of every configured client against a named
/// filter and removes, relabels, or retags it accordingly.
#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/curator/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only run the named client (repeatable; default: all enabled clients)
    #[arg(long = "client", value_name = "NAME")]
    pub clients: Vec<String>,

    /// Decide and report without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Validate configuration and compile every filter, then exit
    #[arg(long, conflicts_with = "dry_run")]
    pub check: bool,
}
