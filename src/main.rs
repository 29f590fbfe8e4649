//! CLI entry point for curator.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use curator_core::app::ClientPlan;
use curator_core::{
    Config, ProcessExit, RunError, RunReport, TorrentOutcome, determine_exit_outcome,
    plan_clients, run_clients,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run(args: &Args) -> Result<ProcessExit> {
    let config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    if args.check {
        let plans = plan_clients(&config, &args.clients).context("Configuration check failed")?;
        print_plans(&plans);
        return Ok(ProcessExit::Success);
    }

    info!(dry_run = args.dry_run, "Curator starting");
    let results = run_clients(&config, &args.clients, args.dry_run)
        .await
        .context("Invalid configuration")?;

    for result in &results {
        match result {
            Ok(report) => print_report(report),
            Err(error) => print_run_error(error),
        }
    }

    Ok(determine_exit_outcome(&results))
}

fn print_plans(plans: &[ClientPlan]) {
    println!("Configuration OK");
    for plan in plans {
        println!(
            "  {} ({}): filter '{}', {} rule(s){}",
            plan.client,
            plan.kind,
            plan.filter,
            plan.predicates,
            if plan.reads_free_space {
                ", reads free space"
            } else {
                ""
            }
        );
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    for torrent in &report.torrents {
        match &torrent.outcome {
            TorrentOutcome::Removed {
                bytes_freed,
                simulated,
            } => {
                let note = if *simulated { ", simulated" } else { "" };
                println!(
                    "{prefix}{}: removed {} ({bytes_freed} bytes{note})",
                    report.client, torrent.name
                );
            }
            TorrentOutcome::Updated {
                label,
                tags_added,
                tags_removed,
            } => {
                let mut changes = Vec::new();
                if let Some(label) = label {
                    changes.push(format!("label -> {label}"));
                }
                if !tags_added.is_empty() {
                    changes.push(format!("+tags {}", join(tags_added)));
                }
                if !tags_removed.is_empty() {
                    changes.push(format!("-tags {}", join(tags_removed)));
                }
                println!("{prefix}{}: updated {} ({})", report.client, torrent.name, changes.join(", "));
            }
            TorrentOutcome::Ignored | TorrentOutcome::Unchanged => {}
        }
        for failure in &torrent.failures {
            println!(
                "{prefix}{}: FAILED {} {} [{}]: {}",
                report.client, failure.operation, torrent.name, torrent.hash, failure.message
            );
        }
    }

    let stats = &report.stats;
    println!(
        "{prefix}{}: {} torrents, {} removed, {} updated, {} ignored, {} unchanged, {} failed",
        report.client,
        stats.total,
        stats.removed,
        stats.updated,
        stats.ignored,
        stats.unchanged,
        stats.failed
    );
    if let Some(free_gb) = report.free_space_gb {
        let note = if report.dry_run { " (simulated)" } else { "" };
        println!("{prefix}{}: free space now {free_gb:.2} GiB{note}", report.client);
    }
}

fn print_run_error(error: &RunError) {
    println!("{}: FAILED {error}", error.client());
}

fn join<'a>(tags: impl IntoIterator<Item = &'a String>) -> String {
    tags.into_iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
