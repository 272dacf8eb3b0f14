//! Shared operational state and its single mutation surface.
//!
//! Every writer (the event dispatcher for live data, the fallback simulator
//! for synthetic data) goes through the methods on `OpsState`, so the
//! invariants cannot diverge between sources.

use chrono::Utc;
use payops_core::{
    AgentLogEntry, AgentStage, ApprovalQueue, ApprovalRequest, BankHealthRecord, BankStatus,
    InterventionLedger, InterventionRecord, LogKind, LogStore, MetricsSnapshot,
};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedState = Arc<Mutex<OpsState>>;

pub struct OpsState {
    pub metrics: MetricsSnapshot,
    pub banks: Vec<BankHealthRecord>,
    pub logs: LogStore,
    pub approvals: ApprovalQueue,
    pub ledger: InterventionLedger,
    pub current_stage: AgentStage,
    /// Narration toggle. When off, narration ticks advance the cycle but
    /// append nothing; the timer keeps running.
    pub agent_execution: bool,
}

impl OpsState {
    pub fn new() -> Self {
        Self {
            metrics: MetricsSnapshot::baseline(),
            banks: seed_banks(),
            logs: LogStore::new(),
            approvals: ApprovalQueue::new(),
            ledger: InterventionLedger::new(),
            current_stage: AgentStage::Observe,
            agent_execution: true,
        }
    }

    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Entry point for thought-like events, live or simulated. Non-system
    /// stages become the current stage.
    pub fn record_thought(&mut self, entry: AgentLogEntry) {
        if entry.stage != AgentStage::System {
            self.current_stage = entry.stage;
        }
        self.logs.append(entry);
    }

    pub fn record_system(&mut self, content: impl Into<String>) {
        self.logs.append(AgentLogEntry::system(content));
    }

    /// Replaces the metrics snapshot wholesale. error_rate is always
    /// recomputed here so live and simulated data share one source of truth.
    pub fn replace_metrics(&mut self, mut snapshot: MetricsSnapshot) {
        snapshot.error_rate = 100.0 - snapshot.success_rate;
        self.metrics = snapshot;
    }

    pub fn replace_banks(&mut self, banks: Vec<BankHealthRecord>) {
        self.banks = banks;
    }

    /// Records an executed action and appends the synthesized act-stage log
    /// entry describing it.
    pub fn record_intervention(&mut self, record: InterventionRecord) {
        let summary = AgentLogEntry::new(
            AgentStage::Act,
            LogKind::Action,
            format!("Executed: {}", record.description),
        );
        self.ledger.record(record);
        self.logs.append(summary);
    }

    /// Returns false when an entry for the same intervention_id is already
    /// queued; the duplicate is dropped silently.
    pub fn enqueue_approval(&mut self, request: ApprovalRequest) -> bool {
        self.approvals.enqueue(request)
    }
}

impl Default for OpsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Display-ordered bank set shown before any live or simulated data lands.
fn seed_banks() -> Vec<BankHealthRecord> {
    [("HDFC", 40.0), ("ICICI", 30.0), ("SBI", 20.0), ("AXIS", 10.0)]
        .into_iter()
        .map(|(name, weight)| BankHealthRecord {
            name: name.to_string(),
            display_name: format!("{name} Bank"),
            status: BankStatus::Healthy,
            success_rate: 97.5,
            avg_latency: 200.0,
            weight: Some(weight),
            predicted_failure_probability: None,
            last_updated: Utc::now().to_rfc3339(),
        })
        .collect()
}
