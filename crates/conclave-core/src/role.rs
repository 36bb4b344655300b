use serde::{Deserialize, Serialize};

/// A role identity within an edition: category plus role name,
/// e.g. ("Townsfolk", "Washerwoman").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub category: String,
    pub role: String,
}

impl RoleRef {
    pub fn new(category: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            role: role.into(),
        }
    }
}

impl std::fmt::Display for RoleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.role)
    }
}

/// A role plus the opaque payload delivered to the assigned player.
///
/// `role_data` is passed through verbatim (icon id, description, ability
/// text — whatever the host's content provides); the server never
/// inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: RoleRef,
    pub role_data: serde_json::Value,
}

impl RoleAssignment {
    pub fn new(role: RoleRef, role_data: serde_json::Value) -> Self {
        Self { role, role_data }
    }
}
