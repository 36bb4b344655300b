use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::coordinator::ConnId;

/// Per-connection sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when broadcasting to a room.
pub type ConnSender = mpsc::Sender<Bytes>;

struct Member {
    sender: ConnSender,
    kill: CancellationToken,
}

/// Room-scoped delivery primitive: groups connections by room code and
/// offers broadcast (with or without the sender) and point-to-point
/// sends. Delivery is best-effort and unconfirmed; a full or closed
/// channel drops the message for that member only. Per-room ordering
/// follows emission order — the coordinator is the single emitter.
#[derive(Default)]
pub struct FanoutChannel {
    members: HashMap<ConnId, Member>,
    groups: HashMap<String, Vec<ConnId>>,
    /// A connection belongs to at most one group.
    group_of: HashMap<ConnId, String>,
}

impl FanoutChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection's outbound channel and kill switch.
    pub fn register(&mut self, conn: ConnId, sender: ConnSender, kill: CancellationToken) {
        self.members.insert(conn, Member { sender, kill });
    }

    /// Forget a connection entirely, leaving its group first.
    pub fn unregister(&mut self, conn: ConnId) {
        if let Some(room) = self.group_of.remove(&conn)
            && let Some(group) = self.groups.get_mut(&room)
        {
            group.retain(|c| *c != conn);
        }
        self.members.remove(&conn);
    }

    /// Add a connection to a room's group.
    pub fn join(&mut self, room: &str, conn: ConnId) {
        debug_assert!(
            !self.group_of.contains_key(&conn),
            "connection already joined to a group"
        );
        self.groups.entry(room.to_string()).or_default().push(conn);
        self.group_of.insert(conn, room.to_string());
    }

    /// Remove a connection from a room's group.
    pub fn leave(&mut self, room: &str, conn: ConnId) {
        if let Some(group) = self.groups.get_mut(room) {
            group.retain(|c| *c != conn);
        }
        self.group_of.remove(&conn);
    }

    /// Point-to-point send. Best-effort: a slow or gone client is logged
    /// and skipped.
    pub fn send(&self, conn: ConnId, data: Bytes) {
        if let Some(member) = self.members.get(&conn)
            && let Err(e) = member.sender.try_send(data)
        {
            tracing::debug!(conn, error = %e, "dropping send to slow or closed connection");
        }
    }

    /// Broadcast to every member of a room.
    pub fn broadcast(&self, room: &str, data: &Bytes) {
        self.broadcast_inner(room, None, data);
    }

    /// Broadcast to every member of a room except one.
    pub fn broadcast_except(&self, room: &str, exclude: ConnId, data: &Bytes) {
        self.broadcast_inner(room, Some(exclude), data);
    }

    fn broadcast_inner(&self, room: &str, exclude: Option<ConnId>, data: &Bytes) {
        let Some(group) = self.groups.get(room) else {
            return;
        };
        for &conn in group {
            if Some(conn) == exclude {
                continue;
            }
            if let Some(member) = self.members.get(&conn)
                && let Err(e) = member.sender.try_send(data.clone())
            {
                tracing::debug!(conn, room, error = %e, "skipping broadcast to slow client");
            }
        }
    }

    /// Forcibly sever a connection: its read loop observes the cancelled
    /// token and closes the socket. Queued outbound messages still drain.
    pub fn sever(&self, conn: ConnId) {
        if let Some(member) = self.members.get(&conn) {
            member.kill.cancel();
        }
    }

    #[cfg(test)]
    pub fn group_size(&self, room: &str) -> usize {
        self.groups.get(room).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(fanout: &mut FanoutChannel, conn: ConnId, room: &str) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(8);
        fanout.register(conn, tx, CancellationToken::new());
        fanout.join(room, conn);
        rx
    }

    #[test]
    fn broadcast_reaches_all_members() {
        let mut fanout = FanoutChannel::new();
        let mut rx1 = member(&mut fanout, 1, "ABCD");
        let mut rx2 = member(&mut fanout, 2, "ABCD");

        fanout.broadcast("ABCD", &Bytes::from_static(&[0x10, 0x20]));
        assert_eq!(rx1.try_recv().unwrap(), Bytes::from_static(&[0x10, 0x20]));
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(&[0x10, 0x20]));
    }

    #[test]
    fn broadcast_except_skips_sender() {
        let mut fanout = FanoutChannel::new();
        let mut rx1 = member(&mut fanout, 1, "ABCD");
        let mut rx2 = member(&mut fanout, 2, "ABCD");

        fanout.broadcast_except("ABCD", 1, &Bytes::from_static(&[0x15]));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(&[0x15]));
    }

    #[test]
    fn send_targets_one_connection() {
        let mut fanout = FanoutChannel::new();
        let mut rx1 = member(&mut fanout, 1, "ABCD");
        let mut rx2 = member(&mut fanout, 2, "ABCD");

        fanout.send(2, Bytes::from_static(&[0x20]));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(&[0x20]));
    }

    #[test]
    fn broadcasts_scoped_to_room() {
        let mut fanout = FanoutChannel::new();
        let mut rx1 = member(&mut fanout, 1, "ABCD");
        let mut rx2 = member(&mut fanout, 2, "WXYZ");

        fanout.broadcast("ABCD", &Bytes::from_static(&[0x11]));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn leave_stops_delivery() {
        let mut fanout = FanoutChannel::new();
        let mut rx1 = member(&mut fanout, 1, "ABCD");

        fanout.leave("ABCD", 1);
        fanout.broadcast("ABCD", &Bytes::from_static(&[0x11]));
        assert!(rx1.try_recv().is_err());
        assert_eq!(fanout.group_size("ABCD"), 0);
    }

    #[test]
    fn unregister_removes_group_membership() {
        let mut fanout = FanoutChannel::new();
        let _rx = member(&mut fanout, 1, "ABCD");
        fanout.unregister(1);
        assert_eq!(fanout.group_size("ABCD"), 0);
    }

    #[test]
    fn sever_cancels_kill_token() {
        let mut fanout = FanoutChannel::new();
        let (tx, _rx) = mpsc::channel(8);
        let kill = CancellationToken::new();
        fanout.register(1, tx, kill.clone());

        fanout.sever(1);
        assert!(kill.is_cancelled());
    }

    #[test]
    fn full_channel_drops_without_panicking() {
        let mut fanout = FanoutChannel::new();
        let (tx, mut rx) = mpsc::channel(1);
        fanout.register(1, tx, CancellationToken::new());
        fanout.join("ABCD", 1);

        fanout.broadcast("ABCD", &Bytes::from_static(&[0x01]));
        fanout.broadcast("ABCD", &Bytes::from_static(&[0x02]));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(&[0x01]));
        // Second message was dropped, not queued.
        assert!(rx.try_recv().is_err());
    }
}
