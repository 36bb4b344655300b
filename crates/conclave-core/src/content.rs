use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::role::RoleRef;

/// Display data for a single role as shipped in edition content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub icon_id: String,
    pub description: String,
}

/// A playable edition: role definitions grouped by category, plus the
/// order roles wake during the night phase.
///
/// Editions are fetched and consumed by the host's presentation layer;
/// the server core never reads them. They appear here so hosts and
/// tooling share one schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edition {
    /// category -> role name -> definition
    pub roles: HashMap<String, HashMap<String, RoleDefinition>>,
    /// Role names in night-wake order.
    pub night_order: Vec<String>,
}

impl Edition {
    /// Look up the definition for a role reference, if the edition has it.
    pub fn role_definition(&self, role: &RoleRef) -> Option<&RoleDefinition> {
        self.roles.get(&role.category)?.get(&role.role)
    }

    /// Iterate every role in the edition as a `RoleRef`, for seeding a
    /// selection pool.
    pub fn all_roles(&self) -> impl Iterator<Item = RoleRef> + '_ {
        self.roles.iter().flat_map(|(category, roles)| {
            roles
                .keys()
                .map(move |role| RoleRef::new(category.clone(), role.clone()))
        })
    }
}
