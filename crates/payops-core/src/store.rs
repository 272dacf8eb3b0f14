//! Bounded state containers: the observability log, the approval queue and
//! the intervention ledger. Each exposes a small mutate contract; everything
//! outside this module only reads.

use crate::{AgentLogEntry, ApprovalRequest, InterventionRecord};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Retained log window. An operator-facing live feed, not an audit trail.
pub const LOG_CAPACITY: usize = 101;
pub const APPROVAL_CAPACITY: usize = 50;
pub const LEDGER_CAPACITY: usize = 50;

/// Append-only, capacity-limited sequence of log entries in arrival order.
#[derive(Debug, Default)]
pub struct LogStore {
    entries: VecDeque<AgentLogEntry>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one entry to the tail, dropping the oldest on overflow.
    pub fn append(&mut self, entry: AgentLogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&AgentLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deduplicated, capacity-limited queue of pending human decisions, newest
/// first. Outcome-agnostic: resolving removes the entry whether the decision
/// was approve or reject.
#[derive(Debug, Default)]
pub struct ApprovalQueue {
    pending: Vec<ApprovalRequest>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and changes nothing) when the intervention_id is
    /// already queued.
    pub fn enqueue(&mut self, request: ApprovalRequest) -> bool {
        if self.contains(&request.intervention_id) {
            return false;
        }
        self.pending.insert(0, request);
        self.pending.truncate(APPROVAL_CAPACITY);
        true
    }

    pub fn resolve(&mut self, intervention_id: &str) -> Option<ApprovalRequest> {
        let index = self
            .pending
            .iter()
            .position(|request| request.intervention_id == intervention_id)?;
        Some(self.pending.remove(index))
    }

    /// Removes and returns every queued entry, newest first.
    pub fn drain(&mut self) -> Vec<ApprovalRequest> {
        std::mem::take(&mut self.pending)
    }

    pub fn contains(&self, intervention_id: &str) -> bool {
        self.pending
            .iter()
            .any(|request| request.intervention_id == intervention_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApprovalRequest> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RollbackError {
    #[error("no intervention with id {0}")]
    UnknownIntervention(String),
    #[error("action {0} is not reversible")]
    NotReversible(String),
    #[error("rollback already in flight for {0}")]
    InFlight(String),
}

/// Ordered, capacity-limited history of executed actions, newest first.
/// Records are immutable; a rollback adds a new compensating record rather
/// than editing the original.
#[derive(Debug, Default)]
pub struct InterventionLedger {
    records: Vec<InterventionRecord>,
    rolling_back: HashSet<String>,
}

impl InterventionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: InterventionRecord) {
        self.records.insert(0, record);
        self.records.truncate(LEDGER_CAPACITY);
    }

    pub fn get(&self, id: &str) -> Option<&InterventionRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Claims the rollback for `id`. Further triggers for the same id fail
    /// with `InFlight` until `complete_rollback` clears the marker. Returns
    /// the compensating-action description on success.
    pub fn begin_rollback(&mut self, id: &str) -> Result<String, RollbackError> {
        let record = self
            .records
            .iter()
            .find(|record| record.id == id)
            .ok_or_else(|| RollbackError::UnknownIntervention(id.to_string()))?;
        if !record.can_rollback {
            return Err(RollbackError::NotReversible(record.action.clone()));
        }
        let description = record
            .rollback_action
            .clone()
            .unwrap_or_else(|| format!("Reverse {}", record.action));
        if !self.rolling_back.insert(id.to_string()) {
            return Err(RollbackError::InFlight(id.to_string()));
        }
        Ok(description)
    }

    /// Clears the busy marker regardless of outcome and prepends the
    /// compensating record. Returns nothing when the original was evicted
    /// while the rollback was in flight.
    pub fn complete_rollback(&mut self, id: &str, success: bool) -> Option<&InterventionRecord> {
        self.rolling_back.remove(id);
        let original = self.get(id)?.clone();
        let rollback = InterventionRecord::rollback_of(&original, success);
        self.record(rollback);
        self.records.first()
    }

    pub fn rollback_in_flight(&self, id: &str) -> bool {
        self.rolling_back.contains(id)
    }

    pub fn records(&self) -> &[InterventionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AgentLogEntry, AgentStage, InterventionEvent, InterventionProposal, LogKind,
    };

    fn entry(index: usize) -> AgentLogEntry {
        AgentLogEntry::new(AgentStage::Observe, LogKind::Thought, format!("entry {index}"))
    }

    fn request(id: &str) -> ApprovalRequest {
        ApprovalRequest {
            intervention_id: id.to_string(),
            intervention: InterventionProposal {
                intervention_type: "reroute".to_string(),
                action: "switch_gateway".to_string(),
                description: "Switch Gateway (Reroute Traffic)".to_string(),
                params: None,
            },
            risk_score: 0.7,
            hypothesis: "HDFC latency spike".to_string(),
            urgency: None,
            expires_at: None,
        }
    }

    fn intervention(id: &str, action: &str) -> InterventionRecord {
        InterventionRecord::from_event(InterventionEvent {
            id: id.to_string(),
            timestamp: None,
            intervention_type: "reroute".to_string(),
            action: action.to_string(),
            description: format!("run {action}"),
            params: None,
            success: true,
            requires_approval: false,
            approved_by: None,
            outcome: None,
        })
    }

    #[test]
    fn log_store_never_exceeds_capacity_and_keeps_newest() {
        let mut store = LogStore::new();
        for index in 0..150 {
            store.append(entry(index));
        }
        assert_eq!(store.len(), LOG_CAPACITY);
        let contents: Vec<&str> = store.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents.first(), Some(&"entry 49"));
        assert_eq!(contents.last(), Some(&"entry 149"));
    }

    #[test]
    fn log_store_preserves_arrival_order() {
        let mut store = LogStore::new();
        for index in 0..10 {
            store.append(entry(index));
        }
        let contents: Vec<String> = store.iter().map(|e| e.content.clone()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("entry {i}")).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn duplicate_approval_is_dropped_silently() {
        let mut queue = ApprovalQueue::new();
        assert!(queue.enqueue(request("int_1")));
        assert!(!queue.enqueue(request("int_1")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn approval_queue_truncates_to_capacity() {
        let mut queue = ApprovalQueue::new();
        for index in 0..60 {
            queue.enqueue(request(&format!("int_{index}")));
        }
        assert_eq!(queue.len(), APPROVAL_CAPACITY);
        // Newest first: the latest arrival heads the queue.
        assert_eq!(queue.iter().next().unwrap().intervention_id, "int_59");
        assert!(!queue.contains("int_0"));
    }

    #[test]
    fn resolve_removes_exactly_the_named_entry() {
        let mut queue = ApprovalQueue::new();
        queue.enqueue(request("int_1"));
        queue.enqueue(request("int_2"));
        queue.enqueue(request("int_3"));

        let resolved = queue.resolve("int_2").expect("entry must resolve");
        assert_eq!(resolved.intervention_id, "int_2");
        assert_eq!(queue.len(), 2);
        assert!(queue.contains("int_1"));
        assert!(queue.contains("int_3"));
        assert!(queue.resolve("int_2").is_none());
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut queue = ApprovalQueue::new();
        queue.enqueue(request("int_1"));
        queue.enqueue(request("int_2"));
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn ledger_evicts_oldest_in_fifo_order() {
        let mut ledger = InterventionLedger::new();
        for index in 0..60 {
            ledger.record(intervention(&format!("int_{index}"), "send_alert"));
        }
        assert_eq!(ledger.len(), LEDGER_CAPACITY);
        for index in 0..10 {
            assert!(ledger.get(&format!("int_{index}")).is_none());
        }
        assert!(ledger.get("int_10").is_some());
        assert_eq!(ledger.records()[0].id, "int_59");
    }

    #[test]
    fn rollback_lifecycle_claims_and_clears_the_busy_marker() {
        let mut ledger = InterventionLedger::new();
        ledger.record(intervention("int_1", "switch_gateway"));

        let description = ledger.begin_rollback("int_1").expect("rollback must start");
        assert_eq!(description, "Restore original routing weights");
        assert!(ledger.rollback_in_flight("int_1"));
        assert_eq!(
            ledger.begin_rollback("int_1"),
            Err(RollbackError::InFlight("int_1".to_string()))
        );

        let rollback = ledger
            .complete_rollback("int_1", true)
            .expect("compensating record");
        assert_eq!(rollback.action, "rollback_switch_gateway");
        assert!(!ledger.rollback_in_flight("int_1"));
        assert_eq!(ledger.len(), 2);
        // The original record is untouched.
        assert!(ledger.get("int_1").unwrap().can_rollback);
    }

    #[test]
    fn busy_marker_clears_on_failed_rollback_too() {
        let mut ledger = InterventionLedger::new();
        ledger.record(intervention("int_1", "suppress_payment_method"));
        ledger.begin_rollback("int_1").expect("rollback must start");
        let rollback = ledger
            .complete_rollback("int_1", false)
            .expect("compensating record");
        assert!(!rollback.success);
        assert!(!ledger.rollback_in_flight("int_1"));
        // A fresh rollback may be attempted after the failed one.
        assert!(ledger.begin_rollback("int_1").is_ok());
    }

    #[test]
    fn irreversible_actions_refuse_rollback() {
        let mut ledger = InterventionLedger::new();
        ledger.record(intervention("int_1", "send_alert"));
        assert_eq!(
            ledger.begin_rollback("int_1"),
            Err(RollbackError::NotReversible("send_alert".to_string()))
        );
        assert!(!ledger.rollback_in_flight("int_1"));
    }

    #[test]
    fn unknown_intervention_refuses_rollback() {
        let mut ledger = InterventionLedger::new();
        assert_eq!(
            ledger.begin_rollback("missing"),
            Err(RollbackError::UnknownIntervention("missing".to_string()))
        );
    }
}
