use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::role::{RoleAssignment, RoleRef};

/// The host's authoritative working state for one game session.
///
/// The server never holds a snapshot — it only relays the events derived
/// from one. The host client keeps it in memory and mirrors it to local
/// persistence so a page reload can resume the session. After a full host
/// loss (no persisted snapshot) the assignments are gone; the server
/// cannot reconstruct them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub room_code: String,
    /// Roles the host selected for this game. Empty until the host fixes
    /// a pool; auto-assignment stays inert while empty.
    pub pool: Vec<RoleRef>,
    /// Display name -> assigned role.
    pub assignments: HashMap<String, RoleAssignment>,
    /// Whether roles have been revealed to the whole room.
    pub revealed: bool,
    /// Current night index, 0 before the first night.
    pub night_index: u32,
}

impl SessionSnapshot {
    pub fn new(room_code: impl Into<String>) -> Self {
        Self {
            room_code: room_code.into(),
            ..Self::default()
        }
    }

    /// Fix the role pool for this game. Existing assignments are kept;
    /// roles no longer in the pool simply stop being drawable.
    pub fn select_pool(&mut self, roles: Vec<RoleRef>) {
        self.pool = roles;
    }

    /// Pool roles not currently assigned to any name.
    pub fn unassigned_roles(&self) -> Vec<&RoleRef> {
        self.pool
            .iter()
            .filter(|role| !self.assignments.values().any(|a| &a.role == *role))
            .collect()
    }

    /// Record an assignment for `name`, replacing any existing one.
    pub fn assign(&mut self, name: impl Into<String>, assignment: RoleAssignment) {
        self.assignments.insert(name.into(), assignment);
    }

    /// Auto-assignment on player join or rejoin: if the pool is fixed and
    /// `name` has no assignment yet, draw uniformly among roles not yet
    /// assigned to any other name, record it, and return it for immediate
    /// delivery. `role_data` supplies the opaque payload for the drawn
    /// role (typically from edition content).
    ///
    /// Returns `None` when the pool is empty, fully assigned, or the name
    /// already holds a role — the player waits.
    pub fn auto_assign<F>(
        &mut self,
        name: &str,
        rng: &mut impl Rng,
        role_data: F,
    ) -> Option<RoleAssignment>
    where
        F: FnOnce(&RoleRef) -> serde_json::Value,
    {
        if self.assignments.contains_key(name) {
            return None;
        }
        let available = self.unassigned_roles();
        if available.is_empty() {
            return None;
        }
        let role = available[rng.random_range(0..available.len())].clone();
        let assignment = RoleAssignment::new(role.clone(), role_data(&role));
        self.assignments.insert(name.to_string(), assignment.clone());
        tracing::debug!(name, role = %role, "auto-assigned role");
        Some(assignment)
    }

    /// Flip the reveal flag. The reveal event itself carries no role data;
    /// call [`deliveries`](Self::deliveries) afterwards to re-send every
    /// assignment so players connected before the reveal get theirs.
    pub fn reveal(&mut self) {
        self.revealed = true;
    }

    /// Every recorded assignment, for (re-)delivery one name at a time.
    pub fn deliveries(&self) -> impl Iterator<Item = (&str, &RoleAssignment)> {
        self.assignments.iter().map(|(name, a)| (name.as_str(), a))
    }

    pub fn advance_night(&mut self) {
        self.night_index += 1;
    }
}
