//! Line-oriented operator commands on stdin.

use crate::api::OpsApi;
use crate::state::{OpsState, SharedState};
use payops_core::{AgentStage, ConnectionState, ScenarioConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

const HELP: &str = "commands: approve <id> | reject <id> | approve-all | reject-all | \
rollback <id> | scenario <name> | scenario-custom <bank> <failure%> <latency-ms> <duration-s> | \
sim start|stop | agent on|off | logs [stage] | status | quit";

const LOG_TAIL: usize = 20;

pub async fn run(
    api: OpsApi,
    shared: SharedState,
    state_rx: watch::Receiver<ConnectionState>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("{HELP}");
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("approve") => match parts.next() {
                Some(id) => {
                    if api.approve(&shared, id).await {
                        info!("approved {id}");
                    } else {
                        warn!("no pending approval with id {id}");
                    }
                }
                None => warn!("usage: approve <id>"),
            },
            Some("reject") => match parts.next() {
                Some(id) => {
                    if api.reject(&shared, id).await {
                        info!("rejected {id}");
                    } else {
                        warn!("no pending approval with id {id}");
                    }
                }
                None => warn!("usage: reject <id>"),
            },
            Some("approve-all") => {
                let count = api.approve_all(&shared).await;
                info!("approved {count} pending interventions");
            }
            Some("reject-all") => {
                let count = api.reject_all(&shared).await;
                info!("rejected {count} pending interventions");
            }
            Some("rollback") => match parts.next() {
                Some(id) => match api.rollback(&shared, id).await {
                    Ok(description) => info!("{description}"),
                    Err(err) => warn!("rollback refused: {err}"),
                },
                None => warn!("usage: rollback <id>"),
            },
            Some("scenario") => match parts.next() {
                Some(name) => api.trigger_named_scenario(&shared, name).await,
                None => warn!("usage: scenario <name>"),
            },
            Some("scenario-custom") => match parse_custom_scenario(parts.collect()) {
                Some(scenario) => api.trigger_scenario(&shared, &scenario).await,
                None => warn!("usage: scenario-custom <bank> <failure%> <latency-ms> <duration-s>"),
            },
            Some("sim") => match parts.next() {
                Some("start") => api.set_remote_simulator(true).await,
                Some("stop") => api.set_remote_simulator(false).await,
                _ => warn!("usage: sim start|stop"),
            },
            Some("agent") => match parts.next() {
                Some(value @ ("on" | "off")) => {
                    let enabled = value == "on";
                    let mut state = shared.lock().await;
                    state.agent_execution = enabled;
                    info!("agent narration {}", if enabled { "enabled" } else { "paused" });
                }
                _ => warn!("usage: agent on|off"),
            },
            Some("logs") => match parts.next() {
                None => {
                    let state = shared.lock().await;
                    print_logs(&state, None);
                }
                Some(raw) => match raw.parse::<AgentStage>() {
                    Ok(stage) => {
                        let state = shared.lock().await;
                        print_logs(&state, Some(stage));
                    }
                    Err(err) => warn!("{err}"),
                },
            },
            Some("status") => {
                let state = shared.lock().await;
                info!(
                    "connection={} stage={} success_rate={:.1}% latency={:.0}ms logs={} pending={} ledger={}",
                    *state_rx.borrow(),
                    state.current_stage,
                    state.metrics.success_rate,
                    state.metrics.avg_latency,
                    state.logs.len(),
                    state.approvals.len(),
                    state.ledger.len(),
                );
            }
            Some("help") => info!("{HELP}"),
            Some("quit") | Some("exit") => break,
            _ => warn!("unknown command: {line} ({HELP})"),
        }
    }
}

/// Stage filtering is a stateless projection over the retained feed; the
/// store itself never filters.
fn print_logs(state: &OpsState, stage: Option<AgentStage>) {
    let entries: Vec<_> = state
        .logs
        .iter()
        .filter(|entry| stage.map_or(true, |wanted| entry.stage == wanted))
        .collect();
    for entry in entries.iter().rev().take(LOG_TAIL).rev() {
        info!(
            "[{}] {}/{} {}",
            entry.timestamp,
            entry.stage,
            entry.kind.as_str(),
            entry.content
        );
    }
    info!("{} of {} entries shown", entries.len().min(LOG_TAIL), entries.len());
}

fn parse_custom_scenario(args: Vec<&str>) -> Option<ScenarioConfig> {
    let &[bank, failure, latency, duration] = args.as_slice() else {
        return None;
    };
    Some(ScenarioConfig {
        name: "custom".to_string(),
        target_bank: bank.to_string(),
        target_method: None,
        failure_increase: failure.parse().ok()?,
        latency_increase: latency.parse().ok()?,
        duration: duration.parse().ok()?,
    })
}
