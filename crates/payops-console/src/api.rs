//! Outbound HTTP operations against the agent backend.
//!
//! Approve and reject are best-effort: call failures are swallowed and the
//! local decision stands (the queue has already advanced). Scenario triggers
//! surface failures to the operator as a log line and never raise.

use crate::state::SharedState;
use payops_core::{
    ApprovalRequest, BankHealthRecord, InterventionEvent, InterventionRecord, MetricsSnapshot,
    RollbackError, ScenarioConfig,
};
use reqwest::Client;
use tracing::{error, info, warn};

pub struct OpsApi {
    client: Client,
    base_url: String,
    operator: String,
}

impl OpsApi {
    pub fn new(base_url: String, operator: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            operator,
        }
    }

    /// Approves a pending proposal: removes it from the queue, notifies the
    /// backend best-effort, and records the intervention locally as executed
    /// regardless of server acknowledgment.
    pub async fn approve(&self, shared: &SharedState, intervention_id: &str) -> bool {
        let request = {
            let mut state = shared.lock().await;
            state.approvals.resolve(intervention_id)
        };
        let Some(request) = request else {
            return false;
        };
        self.post_decision(intervention_id, "approve").await;
        let record = InterventionRecord::approved(&request, &self.operator);
        let mut state = shared.lock().await;
        state.record_intervention(record);
        true
    }

    /// Rejects a pending proposal: removed from the local queue even when
    /// the backend call fails.
    pub async fn reject(&self, shared: &SharedState, intervention_id: &str) -> bool {
        let removed = {
            let mut state = shared.lock().await;
            state.approvals.resolve(intervention_id).is_some()
        };
        if !removed {
            return false;
        }
        self.post_decision(intervention_id, "reject").await;
        true
    }

    /// Runs every queued entry through the approve path; the queue is left
    /// empty. Cross-entry ordering is not guaranteed.
    pub async fn approve_all(&self, shared: &SharedState) -> usize {
        let ids: Vec<String> = {
            let state = shared.lock().await;
            state
                .approvals
                .iter()
                .map(|request| request.intervention_id.clone())
                .collect()
        };
        let mut approved = 0;
        for id in ids {
            if self.approve(shared, &id).await {
                approved += 1;
            }
        }
        approved
    }

    /// Clears the queue, then sends a best-effort reject notification for
    /// each cleared entry.
    pub async fn reject_all(&self, shared: &SharedState) -> usize {
        let drained: Vec<ApprovalRequest> = {
            let mut state = shared.lock().await;
            state.approvals.drain()
        };
        for request in &drained {
            self.post_decision(&request.intervention_id, "reject").await;
        }
        drained.len()
    }

    async fn post_decision(&self, intervention_id: &str, decision: &str) {
        let url = format!(
            "{}/api/interventions/{intervention_id}/{decision}",
            self.base_url
        );
        match self.client.post(&url).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    "{decision} for {intervention_id} returned HTTP {}, local state kept",
                    response.status()
                );
            }
            Err(err) => {
                warn!("{decision} call for {intervention_id} failed, local state kept: {err}");
            }
        }
    }

    pub async fn trigger_scenario(&self, shared: &SharedState, scenario: &ScenarioConfig) {
        let url = format!("{}/api/simulator/scenario/custom", self.base_url);
        match self.client.post(&url).json(scenario).send().await {
            Ok(response) if response.status().is_success() => {
                let mut state = shared.lock().await;
                state.record_system(format!(
                    "Scenario injected: {} on {}",
                    scenario.name, scenario.target_bank
                ));
            }
            Ok(response) => {
                error!(
                    "scenario trigger rejected: HTTP {} for {}",
                    response.status(),
                    scenario.name
                );
            }
            Err(err) => {
                error!("scenario trigger failed for {}: {err}", scenario.name);
            }
        }
    }

    pub async fn trigger_named_scenario(&self, shared: &SharedState, name: &str) {
        let url = format!("{}/api/simulator/scenario/{name}", self.base_url);
        match self.client.post(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let mut state = shared.lock().await;
                state.record_system(format!("Scenario injected: {name}"));
            }
            Ok(response) => {
                error!("scenario trigger rejected: HTTP {} for {name}", response.status());
            }
            Err(err) => {
                error!("scenario trigger failed for {name}: {err}");
            }
        }
    }

    /// Starts or stops the remote transaction simulator.
    pub async fn set_remote_simulator(&self, running: bool) {
        let verb = if running { "start" } else { "stop" };
        let url = format!("{}/api/simulator/{verb}", self.base_url);
        match self.client.post(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("remote simulator {verb} acknowledged");
            }
            Ok(response) => {
                warn!("remote simulator {verb} returned HTTP {}", response.status());
            }
            Err(err) => {
                warn!("remote simulator {verb} failed: {err}");
            }
        }
    }

    /// Seeds local state from the backend's REST surface. Every fetch is
    /// best-effort; the console starts on baseline values otherwise.
    pub async fn hydrate(&self, shared: &SharedState) {
        match self.get_json::<MetricsSnapshot>("/api/metrics").await {
            Ok(snapshot) => {
                let mut state = shared.lock().await;
                state.replace_metrics(snapshot);
            }
            Err(err) => warn!("metrics hydration failed: {err}"),
        }
        match self.get_json::<Vec<BankHealthRecord>>("/api/banks").await {
            Ok(banks) if !banks.is_empty() => {
                let mut state = shared.lock().await;
                state.replace_banks(banks);
            }
            Ok(_) => {}
            Err(err) => warn!("bank hydration failed: {err}"),
        }
        match self
            .get_json::<Vec<InterventionEvent>>("/api/interventions")
            .await
        {
            Ok(events) => {
                let mut state = shared.lock().await;
                // Chronological input, prepend-on-record: newest ends first.
                for event in events {
                    state.ledger.record(InterventionRecord::from_event(event));
                }
            }
            Err(err) => warn!("intervention hydration failed: {err}"),
        }
        match self
            .get_json::<Vec<ApprovalRequest>>("/api/interventions/pending")
            .await
        {
            Ok(requests) => {
                let mut state = shared.lock().await;
                for request in requests {
                    state.enqueue_approval(request);
                }
            }
            Err(err) => warn!("pending-approval hydration failed: {err}"),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, reqwest::Error> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }

    /// Rolls back a reversible intervention. A second trigger for the same
    /// id is refused while one is in flight; the compensating action is a
    /// new ledger record, never an edit of the original.
    pub async fn rollback(&self, shared: &SharedState, intervention_id: &str) -> Result<String, RollbackError> {
        let description = {
            let mut state = shared.lock().await;
            state.ledger.begin_rollback(intervention_id)?
        };
        let mut state = shared.lock().await;
        state.ledger.complete_rollback(intervention_id, true);
        state.record_system(format!("Rollback applied: {description}"));
        Ok(description)
    }
}
