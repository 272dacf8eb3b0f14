//! Fallback simulator: synthetic narration and metric drift while the live
//! channel is absent.
//!
//! Both generators run only while the connection is not open and feed the
//! same mutation entry points as live messages, so downstream consumers
//! cannot tell the sources apart except via the connection-status flag. The
//! tick bodies are pure functions over the state so the bounded-drift and
//! cycle properties are testable without timers.

use crate::state::{OpsState, SharedState};
use chrono::Utc;
use payops_core::{
    AgentLogEntry, AgentStage, BankHealthRecord, BankStatus, ConnectionState, LogKind,
    MetricsSnapshot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

pub const TICK_INTERVAL: Duration = Duration::from_secs(2);

const DEFAULT_BANK_WEIGHT: f64 = 25.0;

const OBSERVE_MESSAGES: [&str; 4] = [
    "Scanning payment infrastructure for anomalies",
    "Sampling transaction stream across acquiring banks",
    "Collecting latency and success-rate metrics",
    "Reviewing recent error logs for new failure codes",
];

const REASON_MESSAGES: [&str; 4] = [
    "Correlating failure spikes with issuer health",
    "Forming hypothesis for the current error pattern",
    "Weighing anomaly severity against historical baselines",
    "Checking memory for similar past incidents",
];

const DECIDE_MESSAGES: [&str; 4] = [
    "Evaluating candidate interventions",
    "Scoring rollback risk for each candidate action",
    "Selecting lowest-risk intervention above utility threshold",
    "Checking guardrails and approval requirements",
];

const ACT_MESSAGES: [&str; 4] = [
    "Executing selected intervention",
    "Adjusting gateway routing weights",
    "Applying retry configuration changes",
    "Dispatching escalation alert to on-call",
];

const LEARN_MESSAGES: [&str; 4] = [
    "Measuring post-intervention success-rate delta",
    "Updating action utility estimates",
    "Recording outcome against the triggering anomaly",
    "Archiving incident pattern for future recall",
];

pub fn stage_messages(stage: AgentStage) -> &'static [&'static str] {
    match stage {
        AgentStage::Observe => &OBSERVE_MESSAGES,
        AgentStage::Reason => &REASON_MESSAGES,
        AgentStage::Decide => &DECIDE_MESSAGES,
        AgentStage::Act => &ACT_MESSAGES,
        AgentStage::Learn => &LEARN_MESSAGES,
        AgentStage::System => &[],
    }
}

/// Position in the observe → reason → decide → act → learn cycle. Advances
/// exactly once per tick whether or not the tick produced a message.
#[derive(Debug, Default)]
pub struct NarrationCycle {
    position: usize,
}

impl NarrationCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, enabled: bool, rng: &mut impl Rng) -> Option<AgentLogEntry> {
        let stage = AgentStage::CYCLE[self.position];
        self.position = (self.position + 1) % AgentStage::CYCLE.len();
        if !enabled {
            return None;
        }
        let messages = stage_messages(stage);
        let content = messages[rng.gen_range(0..messages.len())];
        Some(AgentLogEntry::new(stage, LogKind::Thought, content))
    }
}

pub fn narration_tick(state: &mut OpsState, cycle: &mut NarrationCycle, rng: &mut impl Rng) {
    if let Some(entry) = cycle.tick(state.agent_execution, rng) {
        state.record_thought(entry);
    }
}

fn drift_metrics(current: &MetricsSnapshot, rng: &mut impl Rng) -> MetricsSnapshot {
    let volume = current.transaction_volume as i64 + rng.gen_range(-150..=150);
    MetricsSnapshot {
        success_rate: (current.success_rate + rng.gen_range(-1.5..1.5)).clamp(85.0, 99.0),
        avg_latency: (current.avg_latency + rng.gen_range(-25.0..25.0)).clamp(100.0, 500.0),
        transaction_volume: volume.clamp(2000, 4000) as u64,
        // Recomputed by the mutation entry point.
        error_rate: 0.0,
        timestamp: Utc::now().to_rfc3339(),
    }
}

fn drift_bank(bank: &mut BankHealthRecord, rng: &mut impl Rng) {
    bank.success_rate = (bank.success_rate + rng.gen_range(-2.0..2.0)).clamp(80.0, 99.5);
    bank.avg_latency = (bank.avg_latency + rng.gen_range(-20.0..20.0)).clamp(100.0, 400.0);
    bank.status = BankStatus::from_success_rate(bank.success_rate);
    bank.weight.get_or_insert(DEFAULT_BANK_WEIGHT);
    bank.last_updated = Utc::now().to_rfc3339();
}

pub fn drift_tick(state: &mut OpsState, rng: &mut impl Rng) {
    let next = drift_metrics(&state.metrics, rng);
    state.replace_metrics(next);
    let mut banks = state.banks.clone();
    for bank in &mut banks {
        drift_bank(bank, rng);
    }
    state.replace_banks(banks);
}

/// Supervises the two generators: spawns them whenever the channel is not
/// open and waits for them to cancel themselves when it opens again.
pub async fn run(shared: SharedState, mut state_rx: watch::Receiver<ConnectionState>) {
    loop {
        while state_rx.borrow().is_open() {
            if state_rx.changed().await.is_err() {
                return;
            }
        }
        debug!("live channel absent, starting fallback generators");
        let narration = tokio::spawn(narration_loop(shared.clone(), state_rx.clone()));
        let drift = tokio::spawn(drift_loop(shared.clone(), state_rx.clone()));
        let _ = narration.await;
        let _ = drift.await;
        debug!("fallback generators stopped");
        // Both generators exit when the channel opens or the manager goes
        // away; in the latter case the watch channel is closed.
        if state_rx.has_changed().is_err() {
            return;
        }
    }
}

async fn narration_loop(shared: SharedState, mut state_rx: watch::Receiver<ConnectionState>) {
    let mut cycle = NarrationCycle::new();
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A tick may race a fast reconnect; re-confirm before writing.
                if state_rx.borrow().is_open() {
                    break;
                }
                let mut state = shared.lock().await;
                narration_tick(&mut state, &mut cycle, &mut rng);
            }
            changed = state_rx.changed() => {
                if changed.is_err() || state_rx.borrow().is_open() {
                    break;
                }
            }
        }
    }
}

async fn drift_loop(shared: SharedState, mut state_rx: watch::Receiver<ConnectionState>) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if state_rx.borrow().is_open() {
                    break;
                }
                let mut state = shared.lock().await;
                drift_tick(&mut state, &mut rng);
            }
            changed = state_rx.changed() => {
                if changed.is_err() || state_rx.borrow().is_open() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn narration_walks_the_cycle_in_order_and_wraps() {
        let mut state = OpsState::new();
        let mut cycle = NarrationCycle::new();
        let mut rng = rng();

        let mut stages = Vec::new();
        for _ in 0..6 {
            narration_tick(&mut state, &mut cycle, &mut rng);
            stages.push(state.current_stage);
        }
        assert_eq!(
            stages,
            vec![
                AgentStage::Observe,
                AgentStage::Reason,
                AgentStage::Decide,
                AgentStage::Act,
                AgentStage::Learn,
                AgentStage::Observe,
            ]
        );
        assert_eq!(state.logs.len(), 6);
    }

    #[test]
    fn suppressed_ticks_advance_the_cycle_without_logging() {
        let mut state = OpsState::new();
        let mut cycle = NarrationCycle::new();
        let mut rng = rng();

        state.agent_execution = false;
        narration_tick(&mut state, &mut cycle, &mut rng); // observe, suppressed
        assert!(state.logs.is_empty());

        state.agent_execution = true;
        narration_tick(&mut state, &mut cycle, &mut rng);
        // The suppressed tick consumed the observe slot.
        assert_eq!(state.current_stage, AgentStage::Reason);
        assert_eq!(state.logs.len(), 1);
    }

    #[test]
    fn observe_tick_draws_from_the_fixed_message_table() {
        let mut state = OpsState::new();
        let mut cycle = NarrationCycle::new();
        let mut rng = rng();
        narration_tick(&mut state, &mut cycle, &mut rng);
        let entry = state.logs.latest().unwrap();
        assert!(OBSERVE_MESSAGES.contains(&entry.content.as_str()));
    }

    #[test]
    fn drift_keeps_metrics_inside_clamp_ranges_indefinitely() {
        let mut state = OpsState::new();
        let mut rng = rng();
        for _ in 0..500 {
            drift_tick(&mut state, &mut rng);
            let m = &state.metrics;
            assert!((85.0..=99.0).contains(&m.success_rate));
            assert!((100.0..=500.0).contains(&m.avg_latency));
            assert!((2000..=4000).contains(&m.transaction_volume));
            assert!((1.0..=15.0).contains(&m.error_rate));
            assert!((m.error_rate - (100.0 - m.success_rate)).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn drift_keeps_banks_bounded_and_rederives_status() {
        let mut state = OpsState::new();
        let mut rng = rng();
        for _ in 0..500 {
            drift_tick(&mut state, &mut rng);
            for bank in &state.banks {
                assert!((80.0..=99.5).contains(&bank.success_rate));
                assert!((100.0..=400.0).contains(&bank.avg_latency));
                assert_eq!(bank.status, BankStatus::from_success_rate(bank.success_rate));
            }
        }
    }

    #[test]
    fn drift_defaults_missing_bank_weight() {
        let mut state = OpsState::new();
        state.banks[0].weight = None;
        let mut rng = rng();
        drift_tick(&mut state, &mut rng);
        assert_eq!(state.banks[0].weight, Some(DEFAULT_BANK_WEIGHT));
        // Weights that were present are untouched.
        assert_eq!(state.banks[1].weight, Some(30.0));
    }

    #[test]
    fn every_cycle_stage_has_four_messages() {
        for stage in AgentStage::CYCLE {
            assert_eq!(stage_messages(stage).len(), 4);
        }
        assert!(stage_messages(AgentStage::System).is_empty());
    }
}
