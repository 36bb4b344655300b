pub mod content;
pub mod net;
pub mod role;
pub mod room;
pub mod session;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::role::{RoleAssignment, RoleRef};

    /// Create `n` test roles in one category.
    pub fn make_pool(n: usize) -> Vec<RoleRef> {
        (0..n)
            .map(|i| RoleRef::new("Townsfolk", format!("Role{i}")))
            .collect()
    }

    /// A deterministic RNG for draw-order-sensitive tests.
    pub fn seeded_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// The canonical example assignment used across tests.
    pub fn washerwoman() -> RoleAssignment {
        RoleAssignment::new(
            RoleRef::new("Townsfolk", "Washerwoman"),
            serde_json::json!({
                "iconId": "washerwoman",
                "description": "Learns that one of two players is a particular Townsfolk.",
            }),
        )
    }
}
