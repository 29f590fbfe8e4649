//! Driver: turns a validated configuration into concurrent client runs.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::client::build_client;
use crate::config::{Config, ConfigError};
use crate::coordinator::{ActionCoordinator, CoordinatorOptions, RunError, RunReport};
use crate::expression::ExpressionSet;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Every client completed and no torrent failed.
    Success,
    /// Some clients or torrents failed.
    Partial,
    /// Every client failed, or configuration was rejected.
    Failure,
}

impl ProcessExit {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failure => 2,
        }
    }
}

/// Maps per-client results to the process exit outcome.
#[must_use]
pub fn determine_exit_outcome(results: &[Result<RunReport, RunError>]) -> ProcessExit {
    let failed_clients = results.iter().filter(|result| result.is_err()).count();
    if !results.is_empty() && failed_clients == results.len() {
        return ProcessExit::Failure;
    }
    let torrent_failures = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .any(|report| report.stats.failed > 0);
    if failed_clients == 0 && !torrent_failures {
        ProcessExit::Success
    } else {
        ProcessExit::Partial
    }
}

/// Filter summary for one selected client, as shown by `--check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPlan {
    pub client: String,
    pub kind: &'static str,
    pub filter: String,
    pub predicates: usize,
    pub reads_free_space: bool,
}

/// A client ready to run: its plan and its filter.
struct Prepared {
    plan: ClientPlan,
    expressions: Arc<ExpressionSet>,
}

/// Selects clients and compiles their filters.
///
/// # Errors
///
/// Returns [`ConfigError`] for unknown client names or rules that do not compile.
pub fn plan_clients(config: &Config, names: &[String]) -> Result<Vec<ClientPlan>, ConfigError> {
    Ok(prepare(config, names)?
        .into_iter()
        .map(|prepared| prepared.plan)
        .collect())
}

fn prepare(config: &Config, names: &[String]) -> Result<Vec<Prepared>, ConfigError> {
    let selected = config.select_clients(names)?;
    let compiled = config.compile_filters(&selected)?;

    selected
        .into_iter()
        .map(|(name, client)| {
            let expressions = compiled
                .get(&client.filter)
                .cloned()
                .ok_or_else(|| ConfigError::unknown_filter(name, &client.filter))?;
            Ok(Prepared {
                plan: ClientPlan {
                    client: name.to_string(),
                    kind: client.backend.kind(),
                    filter: client.filter.clone(),
                    predicates: expressions.len(),
                    reads_free_space: expressions.references_free_space(),
                },
                expressions,
            })
        })
        .collect()
}

/// Runs every selected client concurrently, one sequential pipeline each.
///
/// Results are returned in client-name order. A client that cannot be built
/// is reported as a connection failure and does not affect the others.
///
/// # Errors
///
/// Returns [`ConfigError`] before any client is contacted if selection or
/// rule compilation fails.
pub async fn run_clients(
    config: &Config,
    names: &[String],
    dry_run: bool,
) -> Result<Vec<Result<RunReport, RunError>>, ConfigError> {
    let prepared = prepare(config, names)?;
    if prepared.is_empty() {
        warn!("No enabled clients selected");
        return Ok(Vec::new());
    }

    let mut slots: Vec<Option<Result<RunReport, RunError>>> = Vec::with_capacity(prepared.len());
    let mut coordinators = Vec::with_capacity(prepared.len());
    for Prepared { plan, expressions } in prepared {
        let Some(client_config) = config.clients.get(&plan.client) else {
            continue;
        };
        match build_client(&plan.client, client_config) {
            Ok(client) => {
                let options = CoordinatorOptions::for_client(client_config, &expressions, dry_run);
                coordinators.push((slots.len(), ActionCoordinator::new(client, expressions, options)));
                slots.push(None);
            }
            Err(error) => {
                warn!(client = %plan.client, error = %error, "Failed building client");
                slots.push(Some(Err(RunError::connection(&plan.client, error))));
            }
        }
    }

    let (indices, coordinators): (Vec<usize>, Vec<ActionCoordinator>) =
        coordinators.into_iter().unzip();
    let results = run_coordinators(coordinators).await;
    for (index, result) in indices.into_iter().zip(results) {
        slots[index] = Some(result);
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Runs prepared coordinators concurrently and collects their results in order.
pub async fn run_coordinators(
    coordinators: Vec<ActionCoordinator>,
) -> Vec<Result<RunReport, RunError>> {
    info!(clients = coordinators.len(), "Starting client runs");
    let runs = coordinators.into_iter().map(|coordinator| async move {
        let result = coordinator.run().await;
        if let Err(error) = &result {
            warn!(client = %error.client(), error = %error, "Client run failed");
        }
        result
    });
    join_all(runs).await
}
