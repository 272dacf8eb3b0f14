//! Routes decoded channel messages to the owning state mutator.
//!
//! The protocol is deliberately permissive: unknown tags and payloads that
//! fail to decode are dropped without logging or error. The worst case is a
//! gap in the feed, never a crash.

use crate::state::OpsState;
use payops_core::{
    AgentLogEntry, ApprovalRequest, BankHealthRecord, InterventionEvent, InterventionRecord,
    MetricsSnapshot, ThoughtEvent,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct ScenarioNotice {
    name: String,
    #[serde(default)]
    target_bank: Option<String>,
    #[serde(default)]
    failure_increase: Option<f64>,
    #[serde(default)]
    duration: Option<u64>,
}

/// Applies one raw text frame to the state.
pub fn apply_frame(state: &mut OpsState, text: &str) {
    let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
        return;
    };
    apply(state, envelope);
}

pub fn apply(state: &mut OpsState, envelope: Envelope) {
    match envelope.kind.as_str() {
        "thought" => {
            if let Ok(event) = serde_json::from_value::<ThoughtEvent>(envelope.data) {
                state.record_thought(event.into_entry());
            }
        }
        "metrics" => {
            if let Ok(snapshot) = serde_json::from_value::<MetricsSnapshot>(envelope.data) {
                state.replace_metrics(snapshot);
            }
        }
        "banks" => {
            if let Ok(banks) = serde_json::from_value::<Vec<BankHealthRecord>>(envelope.data) {
                state.replace_banks(banks);
            }
        }
        "intervention" => {
            if let Ok(event) = serde_json::from_value::<InterventionEvent>(envelope.data) {
                state.record_intervention(InterventionRecord::from_event(event));
            }
        }
        "approval_required" => {
            if let Ok(request) = serde_json::from_value::<ApprovalRequest>(envelope.data) {
                state.enqueue_approval(request);
            }
        }
        "scenario_triggered" => {
            if let Ok(notice) = serde_json::from_value::<ScenarioNotice>(envelope.data) {
                state.logs.append(AgentLogEntry::system(describe_scenario(&notice)));
            }
        }
        "pong" => {}
        _ => {}
    }
}

fn describe_scenario(notice: &ScenarioNotice) -> String {
    let target = notice.target_bank.as_deref().unwrap_or("ALL");
    match (notice.failure_increase, notice.duration) {
        (Some(failure), Some(duration)) => format!(
            "Scenario triggered: {} on {target} (+{failure}% failures for {duration}s)",
            notice.name
        ),
        _ => format!("Scenario triggered: {} on {target}", notice.name),
    }
}
