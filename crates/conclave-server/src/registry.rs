use std::collections::HashMap;

use crate::coordinator::ConnId;
use crate::error::SessionError;

/// Display-name claims per room.
///
/// Alongside the primary room -> names table, a (room, name) -> connection
/// index and its reverse are populated and invalidated at exactly the same
/// transition points. Targeted routing (assign-role, kick) and disconnect
/// sweeps are index lookups, never membership scans, and a connection
/// holds at most one (room, name) binding at a time.
#[derive(Default)]
pub struct IdentityRegistry {
    /// room -> active names, in join order.
    names: HashMap<String, Vec<String>>,
    bindings: HashMap<(String, String), ConnId>,
    by_conn: HashMap<ConnId, (String, String)>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` in `room` for `conn`. Fails while the name is held by
    /// any connection.
    pub fn claim(&mut self, room: &str, name: &str, conn: ConnId) -> Result<(), SessionError> {
        let names = self.names.entry(room.to_string()).or_default();
        if names.iter().any(|n| n == name) {
            return Err(SessionError::NameTaken);
        }
        debug_assert!(
            !self.by_conn.contains_key(&conn),
            "connection already bound to a name"
        );
        names.push(name.to_string());
        self.bindings
            .insert((room.to_string(), name.to_string()), conn);
        self.by_conn
            .insert(conn, (room.to_string(), name.to_string()));
        Ok(())
    }

    /// Idempotent removal of a (room, name) binding.
    pub fn release(&mut self, room: &str, name: &str) {
        if let Some(names) = self.names.get_mut(room) {
            names.retain(|n| n != name);
        }
        if let Some(conn) = self
            .bindings
            .remove(&(room.to_string(), name.to_string()))
        {
            self.by_conn.remove(&conn);
        }
    }

    /// Disconnect sweep: release whatever binding `conn` holds, if any.
    /// Returns the released (room, name).
    pub fn release_conn(&mut self, conn: ConnId) -> Option<(String, String)> {
        let (room, name) = self.by_conn.remove(&conn)?;
        if let Some(names) = self.names.get_mut(&room) {
            names.retain(|n| n != &name);
        }
        self.bindings.remove(&(room.clone(), name.clone()));
        Some((room, name))
    }

    /// The connection currently bound to `name` in `room`.
    pub fn lookup(&self, room: &str, name: &str) -> Option<ConnId> {
        self.bindings
            .get(&(room.to_string(), name.to_string()))
            .copied()
    }

    /// Active names in `room`, in join order.
    pub fn active(&self, room: &str) -> Vec<String> {
        self.names.get(room).cloned().unwrap_or_default()
    }

    /// The (room, name) binding of `conn`, if any.
    pub fn binding_of(&self, conn: ConnId) -> Option<&(String, String)> {
        self.by_conn.get(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_then_duplicate_fails() {
        let mut reg = IdentityRegistry::new();
        reg.claim("ABCD", "Alice", 1).unwrap();
        assert_eq!(reg.claim("ABCD", "Alice", 2), Err(SessionError::NameTaken));
        assert_eq!(reg.lookup("ABCD", "Alice"), Some(1));
    }

    #[test]
    fn same_name_in_different_rooms_is_fine() {
        let mut reg = IdentityRegistry::new();
        reg.claim("ABCD", "Alice", 1).unwrap();
        reg.claim("WXYZ", "Alice", 2).unwrap();
        assert_eq!(reg.lookup("ABCD", "Alice"), Some(1));
        assert_eq!(reg.lookup("WXYZ", "Alice"), Some(2));
    }

    #[test]
    fn claim_release_reclaim_roundtrip() {
        let mut reg = IdentityRegistry::new();
        reg.claim("ABCD", "Alice", 1).unwrap();
        reg.release("ABCD", "Alice");
        assert!(reg.active("ABCD").is_empty());
        // Release is idempotent.
        reg.release("ABCD", "Alice");
        reg.claim("ABCD", "Alice", 2).unwrap();
        assert_eq!(reg.lookup("ABCD", "Alice"), Some(2));
    }

    #[test]
    fn active_preserves_join_order() {
        let mut reg = IdentityRegistry::new();
        reg.claim("ABCD", "Alice", 1).unwrap();
        reg.claim("ABCD", "Bob", 2).unwrap();
        reg.claim("ABCD", "Carol", 3).unwrap();
        assert_eq!(reg.active("ABCD"), vec!["Alice", "Bob", "Carol"]);

        reg.release("ABCD", "Bob");
        assert_eq!(reg.active("ABCD"), vec!["Alice", "Carol"]);
    }

    #[test]
    fn release_conn_is_exact() {
        let mut reg = IdentityRegistry::new();
        reg.claim("ABCD", "Alice", 1).unwrap();
        reg.claim("ABCD", "Bob", 2).unwrap();

        assert_eq!(
            reg.release_conn(2),
            Some(("ABCD".to_string(), "Bob".to_string()))
        );
        assert_eq!(reg.active("ABCD"), vec!["Alice"]);
        assert_eq!(reg.lookup("ABCD", "Bob"), None);
        // Alice's binding is untouched.
        assert_eq!(reg.lookup("ABCD", "Alice"), Some(1));
        assert_eq!(reg.release_conn(2), None);
    }

    #[test]
    fn binding_of_reports_room_and_name() {
        let mut reg = IdentityRegistry::new();
        reg.claim("ABCD", "Alice", 1).unwrap();
        assert_eq!(
            reg.binding_of(1),
            Some(&("ABCD".to_string(), "Alice".to_string()))
        );
        assert_eq!(reg.binding_of(9), None);
    }
}
