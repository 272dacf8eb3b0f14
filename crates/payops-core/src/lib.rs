use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod rollback;
pub mod store;

pub use store::{ApprovalQueue, InterventionLedger, LogStore, RollbackError};

/// Lifecycle of the single logical realtime connection. Owned by the
/// connection manager; everything else only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStage {
    Observe,
    Reason,
    Decide,
    Act,
    Learn,
    System,
}

impl AgentStage {
    /// The agent's reasoning cycle, in order. `System` is a log-entry stage
    /// only and never part of the cycle.
    pub const CYCLE: [AgentStage; 5] = [
        AgentStage::Observe,
        AgentStage::Reason,
        AgentStage::Decide,
        AgentStage::Act,
        AgentStage::Learn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStage::Observe => "observe",
            AgentStage::Reason => "reason",
            AgentStage::Decide => "decide",
            AgentStage::Act => "act",
            AgentStage::Learn => "learn",
            AgentStage::System => "system",
        }
    }
}

impl fmt::Display for AgentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStage {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "observe" => Ok(AgentStage::Observe),
            "reason" => Ok(AgentStage::Reason),
            "decide" => Ok(AgentStage::Decide),
            "act" => Ok(AgentStage::Act),
            "learn" => Ok(AgentStage::Learn),
            "system" => Ok(AgentStage::System),
            other => Err(format!("Unknown stage: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Thought,
    Prompt,
    Response,
    Action,
    Error,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Thought => "thought",
            LogKind::Prompt => "prompt",
            LogKind::Response => "response",
            LogKind::Action => "action",
            LogKind::Error => "error",
        }
    }
}

/// Real-time system performance metrics. Exactly one live instance exists;
/// it is replaced wholesale, never edited field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub success_rate: f64,
    pub avg_latency: f64,
    pub transaction_volume: u64,
    #[serde(default)]
    pub error_rate: f64,
    pub timestamp: String,
}

impl MetricsSnapshot {
    /// Steady-state values used before any live or simulated data arrives.
    pub fn baseline() -> Self {
        Self {
            success_rate: 97.5,
            avg_latency: 200.0,
            transaction_volume: 3000,
            error_rate: 2.5,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankStatus {
    Healthy,
    Degraded,
    Down,
}

impl BankStatus {
    /// Status thresholds applied whenever this client derives status itself.
    /// The server may send any status independently when live.
    pub fn from_success_rate(success_rate: f64) -> Self {
        if success_rate < 85.0 {
            BankStatus::Down
        } else if success_rate < 92.0 {
            BankStatus::Degraded
        } else {
            BankStatus::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BankStatus::Healthy => "healthy",
            BankStatus::Degraded => "degraded",
            BankStatus::Down => "down",
        }
    }
}

impl fmt::Display for BankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankHealthRecord {
    pub name: String,
    pub display_name: String,
    pub status: BankStatus,
    pub success_rate: f64,
    pub avg_latency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_failure_probability: Option<f64>,
    pub last_updated: String,
}

/// One observability event. Immutable once created; evicted from the log
/// store oldest-first when the capacity window overflows.
#[derive(Debug, Clone, Serialize)]
pub struct AgentLogEntry {
    pub id: String,
    pub timestamp: String,
    pub stage: AgentStage,
    pub kind: LogKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AgentLogEntry {
    pub fn new(stage: AgentStage, kind: LogKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            stage,
            kind,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(AgentStage::System, LogKind::Thought, content)
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Wire payload of a `thought` message.
#[derive(Debug, Clone, Deserialize)]
pub struct ThoughtEvent {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub stage: AgentStage,
    pub content: String,
}

impl ThoughtEvent {
    pub fn into_entry(self) -> AgentLogEntry {
        let mut entry = AgentLogEntry::new(self.stage, LogKind::Thought, self.content);
        if let Some(timestamp) = self.timestamp {
            entry.timestamp = timestamp;
        }
        entry
    }
}

/// The action the agent proposes to take, as carried inside an approval
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionProposal {
    #[serde(rename = "type")]
    pub intervention_type: String,
    pub action: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Wire payload of an `intervention` message: an action the agent already
/// executed.
#[derive(Debug, Clone, Deserialize)]
pub struct InterventionEvent {
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub intervention_type: String,
    pub action: String,
    pub description: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub outcome: Option<Value>,
}

/// Ledger entry for an executed action. `can_rollback` and `rollback_action`
/// are fixed at creation from the action kind and never change afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct InterventionRecord {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub intervention_type: String,
    pub action: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub success: bool,
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
    pub can_rollback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_action: Option<String>,
}

impl InterventionRecord {
    pub fn from_event(event: InterventionEvent) -> Self {
        Self {
            can_rollback: rollback::is_reversible(&event.action),
            rollback_action: rollback::rollback_description(&event.action)
                .map(|description| description.to_string()),
            id: event.id,
            timestamp: event
                .timestamp
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            intervention_type: event.intervention_type,
            action: event.action,
            description: event.description,
            params: event.params,
            success: event.success,
            requires_approval: event.requires_approval,
            approved_by: event.approved_by,
            outcome: event.outcome,
        }
    }

    /// Record built when an operator approves a pending proposal. The local
    /// state is advanced regardless of whether the server acknowledged.
    pub fn approved(request: &ApprovalRequest, operator: &str) -> Self {
        let proposal = &request.intervention;
        Self {
            id: request.intervention_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            intervention_type: proposal.intervention_type.clone(),
            action: proposal.action.clone(),
            description: proposal.description.clone(),
            params: proposal.params.clone(),
            success: true,
            requires_approval: true,
            approved_by: Some(operator.to_string()),
            outcome: None,
            can_rollback: rollback::is_reversible(&proposal.action),
            rollback_action: rollback::rollback_description(&proposal.action)
                .map(|description| description.to_string()),
        }
    }

    /// Compensating record for a completed rollback. The original record is
    /// left untouched; the rollback is a new entry in the audit trail.
    pub fn rollback_of(original: &InterventionRecord, success: bool) -> Self {
        let description = original
            .rollback_action
            .clone()
            .unwrap_or_else(|| format!("Reverse {}", original.action));
        Self {
            id: format!("rb_{}", Uuid::new_v4()),
            timestamp: Utc::now().to_rfc3339(),
            intervention_type: "rollback".to_string(),
            action: format!("rollback_{}", original.action),
            description,
            params: None,
            success,
            requires_approval: false,
            approved_by: None,
            outcome: None,
            can_rollback: false,
            rollback_action: None,
        }
    }
}

/// A proposed intervention awaiting human accept/reject. Keyed by
/// `intervention_id`; the queue holds at most one live entry per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub intervention_id: String,
    pub intervention: InterventionProposal,
    pub risk_score: f64,
    pub hypothesis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// Transient value sent to the scenario-injection endpoint; never retained
/// as state. Field names follow the endpoint's expected keys.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(rename = "targetBank")]
    pub target_bank: String,
    #[serde(rename = "targetMethod", skip_serializing_if = "Option::is_none")]
    pub target_method: Option<String>,
    #[serde(rename = "failureIncrease")]
    pub failure_increase: f64,
    #[serde(rename = "latencyIncrease")]
    pub latency_increase: f64,
    pub duration: u64,
}
