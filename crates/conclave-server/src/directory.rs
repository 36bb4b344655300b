use std::collections::HashMap;

use conclave_core::room::generate_room_code;

use crate::coordinator::ConnId;
use crate::error::SessionError;

/// Maps room codes to the connection currently holding host authority.
///
/// A code with no entry here "does not exist" for join purposes, even if
/// the identity registry still carries names for it (players outliving a
/// host reload). The reverse index keeps the disconnect sweep exact: a
/// connection hosts at most one room.
#[derive(Default)]
pub struct RoomDirectory {
    hosts: HashMap<String, ConnId>,
    by_conn: HashMap<ConnId, String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` as host of a freshly generated code. Redraws on
    /// collision; with 26^4 codes, practical exhaustion is not handled.
    pub fn create(&mut self, conn: ConnId) -> String {
        debug_assert!(
            !self.by_conn.contains_key(&conn),
            "connection already hosts a room"
        );
        let code = loop {
            let code = generate_room_code();
            if !self.hosts.contains_key(&code) {
                break code;
            }
        };
        self.hosts.insert(code.clone(), conn);
        self.by_conn.insert(conn, code.clone());
        code
    }

    /// The recorded host for a code, if any.
    pub fn host(&self, code: &str) -> Option<ConnId> {
        self.hosts.get(code).copied()
    }

    /// Re-register host authority for an existing code after a reload.
    /// Conservative: rejects whenever any host is recorded, without
    /// probing whether that connection is still alive.
    pub fn rehost(&mut self, code: &str, conn: ConnId) -> Result<(), SessionError> {
        if self.hosts.contains_key(code) {
            return Err(SessionError::HostAlreadyExists);
        }
        self.hosts.insert(code.to_string(), conn);
        self.by_conn.insert(conn, code.to_string());
        Ok(())
    }

    /// Remove the mapping only while `conn` is still the recorded host,
    /// so a stale release cannot evict a newer host that reclaimed the
    /// code. Returns whether the mapping was removed.
    pub fn release(&mut self, code: &str, conn: ConnId) -> bool {
        if self.hosts.get(code) == Some(&conn) {
            self.hosts.remove(code);
            self.by_conn.remove(&conn);
            true
        } else {
            false
        }
    }

    /// Disconnect sweep: release whatever room `conn` hosts, if any.
    pub fn release_conn(&mut self, conn: ConnId) -> Option<String> {
        let code = self.by_conn.remove(&conn)?;
        self.hosts.remove(&code);
        Some(code)
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.hosts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::room::is_valid_room_code;

    #[test]
    fn create_registers_valid_unique_codes() {
        let mut dir = RoomDirectory::new();
        let mut codes = Vec::new();
        for conn in 1..=50u64 {
            let code = dir.create(conn);
            assert!(is_valid_room_code(&code));
            assert_eq!(dir.host(&code), Some(conn));
            codes.push(code);
        }
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 50, "live rooms must not share codes");
    }

    #[test]
    fn release_requires_recorded_host() {
        let mut dir = RoomDirectory::new();
        let code = dir.create(1);

        // A stale release from another connection does not evict the host.
        assert!(!dir.release(&code, 2));
        assert_eq!(dir.host(&code), Some(1));

        assert!(dir.release(&code, 1));
        assert_eq!(dir.host(&code), None);
    }

    #[test]
    fn rehost_after_release_succeeds() {
        let mut dir = RoomDirectory::new();
        let code = dir.create(1);
        dir.release(&code, 1);

        assert!(dir.rehost(&code, 2).is_ok());
        assert_eq!(dir.host(&code), Some(2));
    }

    #[test]
    fn rehost_conflicts_with_recorded_host() {
        let mut dir = RoomDirectory::new();
        let code = dir.create(1);
        assert_eq!(dir.rehost(&code, 2), Err(SessionError::HostAlreadyExists));
        assert_eq!(dir.host(&code), Some(1));
    }

    #[test]
    fn release_conn_sweeps_hosted_room() {
        let mut dir = RoomDirectory::new();
        let code = dir.create(1);
        assert_eq!(dir.release_conn(1), Some(code.clone()));
        assert_eq!(dir.host(&code), None);
        assert_eq!(dir.release_conn(1), None);
    }

    #[test]
    fn stale_release_does_not_evict_rehosted_room() {
        let mut dir = RoomDirectory::new();
        let code = dir.create(1);
        dir.release(&code, 1);
        dir.rehost(&code, 2).unwrap();

        // Old host's late cleanup must not touch the new host.
        assert!(!dir.release(&code, 1));
        assert_eq!(dir.host(&code), Some(2));
    }
}
