//! # Objective Store
//!
//! An explicit map from objective id to objective state with a defined
//! lifecycle: created → active (approved) → terminal → evicted. No global
//! registry; the store is owned by the engine and every transition goes
//! through it.

use std::collections::HashMap;

use tracing::debug;
use turnstile_types::{ChannelId, Objective, ObjectiveOutcome};

/// One tracked objective and its progress flags.
#[derive(Debug, Clone)]
pub struct ObjectiveRecord {
    /// The objective itself.
    pub objective: Objective,
    /// The local participant approved it.
    pub approved_by_me: bool,
    /// This engine created it (and therefore drives on-chain steps).
    pub originated_locally: bool,
    /// Terminal status, once reached.
    pub outcome: Option<ObjectiveOutcome>,
    /// A deposit transaction is in flight for this objective.
    pub deposit_in_flight: bool,
    /// A conclude transaction was submitted.
    pub conclude_submitted: bool,
    /// A payout transaction was submitted.
    pub transfer_submitted: bool,
}

impl ObjectiveRecord {
    fn new(objective: Objective, approved: bool, originated: bool) -> Self {
        Self {
            objective,
            approved_by_me: approved,
            originated_locally: originated,
            outcome: None,
            deposit_in_flight: false,
            conclude_submitted: false,
            transfer_submitted: false,
        }
    }

    /// True once the objective reached Success or Failure.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// The engine's objective map.
#[derive(Debug, Default)]
pub struct ObjectiveStore {
    records: HashMap<String, ObjectiveRecord>,
}

impl ObjectiveStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an objective unless its id is already tracked. Duplicate
    /// proposals and re-deliveries collapse onto the existing record.
    ///
    /// Returns the objective id.
    pub fn register(&mut self, objective: Objective, approved: bool, originated: bool) -> String {
        let id = objective.id();
        if self.records.contains_key(&id) {
            debug!(objective_id = %id, "duplicate objective proposal ignored");
            return id;
        }
        debug!(objective_id = %id, approved, originated, "objective created");
        self.records
            .insert(id.clone(), ObjectiveRecord::new(objective, approved, originated));
        id
    }

    /// Approve an objective. Returns false if unknown.
    pub fn approve(&mut self, objective_id: &str) -> bool {
        match self.records.get_mut(objective_id) {
            Some(record) => {
                record.approved_by_me = true;
                true
            }
            None => false,
        }
    }

    /// Mark an objective terminal.
    pub fn complete(&mut self, objective_id: &str, outcome: ObjectiveOutcome) {
        if let Some(record) = self.records.get_mut(objective_id) {
            debug!(objective_id, ?outcome, "objective reached terminal status");
            record.outcome = Some(outcome);
        }
    }

    /// Fetch a record.
    pub fn get(&self, objective_id: &str) -> Option<&ObjectiveRecord> {
        self.records.get(objective_id)
    }

    /// Fetch a record mutably.
    pub fn get_mut(&mut self, objective_id: &str) -> Option<&mut ObjectiveRecord> {
        self.records.get_mut(objective_id)
    }

    /// Ids of live objectives touching a channel.
    pub fn for_channel(&self, channel_id: ChannelId) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| {
                !record.is_terminal() && record.objective.channels().contains(&channel_id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Remove terminal objectives, returning how many were evicted.
    pub fn evict_terminal(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_terminal());
        before - self.records.len()
    }
}
