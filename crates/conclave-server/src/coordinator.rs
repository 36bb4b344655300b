use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use conclave_core::net::messages::{
    AssignRoleMsg, AssignedRoleMsg, HostMsg, HostedMsg, JoinErrorMsg, JoinRoomMsg, JoinedMsg,
    KickPlayerMsg, KickedMsg, LeaveRoomMsg, LeftRoomMsg, ReconnectedHostMsg, ReconnectedJoinMsg,
    RejoinKind, RejoinMsg, RevealRolesMsg, RolesRevealedMsg, ServerMessage, UserJoinedMsg,
    UserLeftMsg,
};
use conclave_core::net::protocol::encode_server_message;

use crate::directory::RoomDirectory;
use crate::error::SessionError;
use crate::fanout::{ConnSender, FanoutChannel};
use crate::registry::IdentityRegistry;

/// Server-side connection identifier, allocated per WebSocket.
pub type ConnId = u64;

/// Lifecycle state of one connection. A connection starts unbound,
/// becomes a host or a player through a session request, and may return
/// to unbound via a voluntary leave. Transport disconnect is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnState {
    Unbound,
    Host { room: String },
    Player { room: String, name: String },
}

/// Events submitted to the coordinator task by connection handlers.
#[derive(Debug)]
pub enum Command {
    Connect {
        conn: ConnId,
        sender: ConnSender,
        kill: CancellationToken,
    },
    Host { conn: ConnId, msg: HostMsg },
    Join { conn: ConnId, msg: JoinRoomMsg },
    Rejoin { conn: ConnId, msg: RejoinMsg },
    Leave { conn: ConnId, msg: LeaveRoomMsg },
    AssignRole { conn: ConnId, msg: AssignRoleMsg },
    RevealRoles { conn: ConnId, msg: RevealRolesMsg },
    KickPlayer { conn: ConnId, msg: KickPlayerMsg },
    Disconnect { conn: ConnId },
}

/// Owns all session state: the room directory (room -> host), the
/// identity registry (room -> names, with connection indexes), the
/// fan-out channel, and the per-connection state machine. Constructed
/// empty at process start, never torn down.
///
/// All mutations happen on the coordinator task via [`apply`], so the
/// cleanup-then-claim sequence around disconnects is atomic and every
/// room observes presence and role events in emission order. The server
/// holds no game state — role pools, assignments, and reveal status live
/// in the host client (see `conclave_core::session::SessionSnapshot`);
/// the coordinator only routes.
pub struct SessionCoordinator {
    directory: RoomDirectory,
    registry: IdentityRegistry,
    fanout: FanoutChannel,
    conns: HashMap<ConnId, ConnState>,
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self {
            directory: RoomDirectory::new(),
            registry: IdentityRegistry::new(),
            fanout: FanoutChannel::new(),
            conns: HashMap::new(),
        }
    }

    /// Process one command. The actor task calls this for every queued
    /// event; unit tests drive it directly.
    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { conn, sender, kill } => self.connect(conn, sender, kill),
            Command::Host { conn, msg } => self.host(conn, &msg),
            Command::Join { conn, msg } => self.join(conn, msg),
            Command::Rejoin { conn, msg } => self.rejoin(conn, msg),
            Command::Leave { conn, msg } => self.leave(conn, &msg),
            Command::AssignRole { conn, msg } => self.assign_role(conn, msg),
            Command::RevealRoles { conn, msg } => self.reveal_roles(conn, &msg),
            Command::KickPlayer { conn, msg } => self.kick(conn, &msg),
            Command::Disconnect { conn } => self.disconnect(conn),
        }
    }

    fn connect(&mut self, conn: ConnId, sender: ConnSender, kill: CancellationToken) {
        self.fanout.register(conn, sender, kill);
        self.conns.insert(conn, ConnState::Unbound);
    }

    /// Open a new room with `conn` as host. The code goes back to the
    /// requester only.
    fn host(&mut self, conn: ConnId, msg: &HostMsg) {
        if !self.is_unbound(conn) {
            tracing::debug!(conn, "host request from bound connection ignored");
            return;
        }
        let code = self.directory.create(conn);
        self.fanout.join(&code, conn);
        self.conns.insert(conn, ConnState::Host { room: code.clone() });
        tracing::info!(conn, room = %code, player_count = ?msg.player_count, "room hosted");
        self.send(conn, &ServerMessage::Hosted(HostedMsg { room: code }));
    }

    fn join(&mut self, conn: ConnId, msg: JoinRoomMsg) {
        if !self.is_unbound(conn) {
            tracing::debug!(conn, "join request from bound connection ignored");
            return;
        }
        let JoinRoomMsg { room, username, .. } = msg;
        if self.directory.host(&room).is_none() {
            self.send_error(conn, SessionError::RoomNotFound);
            return;
        }
        if let Err(e) = self.registry.claim(&room, &username, conn) {
            self.send_error(conn, e);
            return;
        }
        self.fanout.join(&room, conn);
        self.conns.insert(
            conn,
            ConnState::Player {
                room: room.clone(),
                name: username.clone(),
            },
        );
        let usernames = self.registry.active(&room);
        tracing::info!(conn, room = %room, username = %username, "player joined");
        self.send(
            conn,
            &ServerMessage::Joined(JoinedMsg {
                room: room.clone(),
                username: username.clone(),
                usernames,
            }),
        );
        self.broadcast_except(
            &room,
            conn,
            &ServerMessage::UserJoined(UserJoinedMsg { username }),
        );
    }

    /// Recovery after a reload: restore prior membership without issuing
    /// a new room code.
    fn rejoin(&mut self, conn: ConnId, msg: RejoinMsg) {
        if !self.is_unbound(conn) {
            tracing::debug!(conn, "rejoin request from bound connection ignored");
            return;
        }
        match msg.kind {
            RejoinKind::Host => {
                if let Err(e) = self.directory.rehost(&msg.room, conn) {
                    self.send_error(conn, e);
                    return;
                }
                self.fanout.join(&msg.room, conn);
                self.conns.insert(
                    conn,
                    ConnState::Host {
                        room: msg.room.clone(),
                    },
                );
                tracing::info!(conn, room = %msg.room, "host reconnected");
                self.send(
                    conn,
                    &ServerMessage::ReconnectedHost(ReconnectedHostMsg { room: msg.room }),
                );
            },
            RejoinKind::Player => {
                let Some(username) = msg.username else {
                    tracing::debug!(conn, room = %msg.room, "player rejoin without username dropped");
                    return;
                };
                if self.directory.host(&msg.room).is_none() {
                    self.send_error(conn, SessionError::RoomNotFound);
                    return;
                }
                if let Err(e) = self.registry.claim(&msg.room, &username, conn) {
                    self.send_error(conn, e);
                    return;
                }
                self.fanout.join(&msg.room, conn);
                self.conns.insert(
                    conn,
                    ConnState::Player {
                        room: msg.room.clone(),
                        name: username.clone(),
                    },
                );
                let usernames = self.registry.active(&msg.room);
                tracing::info!(conn, room = %msg.room, username = %username, "player reconnected");
                self.send(
                    conn,
                    &ServerMessage::ReconnectedJoin(ReconnectedJoinMsg {
                        room: msg.room.clone(),
                        username: username.clone(),
                        usernames,
                    }),
                );
                // Duplicate join notifications after a reload are benign.
                self.broadcast_except(
                    &msg.room,
                    conn,
                    &ServerMessage::UserJoined(UserJoinedMsg { username }),
                );
            },
        }
    }

    /// Voluntary departure. The connection returns to unbound and may
    /// host or join again.
    fn leave(&mut self, conn: ConnId, msg: &LeaveRoomMsg) {
        match self.conns.get(&conn).cloned() {
            Some(ConnState::Host { room }) if room == msg.room => {
                self.fanout.leave(&room, conn);
                self.directory.release(&room, conn);
                self.conns.insert(conn, ConnState::Unbound);
                tracing::info!(conn, room = %room, "host left");
                self.send(conn, &ServerMessage::LeftRoom(LeftRoomMsg { room }));
            },
            Some(ConnState::Player { room, name }) if room == msg.room => {
                self.broadcast_except(
                    &room,
                    conn,
                    &ServerMessage::UserLeft(UserLeftMsg {
                        username: name.clone(),
                    }),
                );
                self.fanout.leave(&room, conn);
                self.registry.release(&room, &name);
                self.conns.insert(conn, ConnState::Unbound);
                tracing::info!(conn, room = %room, username = %name, "player left");
                self.send(conn, &ServerMessage::LeftRoom(LeftRoomMsg { room }));
            },
            _ => {
                tracing::debug!(conn, room = %msg.room, "leave for unbound room ignored");
            },
        }
    }

    /// Abrupt transport loss. Both registries are swept through their
    /// reverse indexes; nothing is broadcast — the presence change
    /// surfaces to whoever later observes it.
    fn disconnect(&mut self, conn: ConnId) {
        self.conns.remove(&conn);
        if let Some(code) = self.directory.release_conn(conn) {
            tracing::info!(conn, room = %code, "host disconnected, room released");
        }
        if let Some((room, name)) = self.registry.release_conn(conn) {
            tracing::info!(conn, room = %room, username = %name, "player disconnected");
        }
        self.fanout.unregister(conn);
    }

    /// Host-issued, point-to-point role delivery. Role identity is
    /// private per player, so this never broadcasts. No matching live
    /// binding is a silent no-op.
    fn assign_role(&mut self, conn: ConnId, msg: AssignRoleMsg) {
        if !self.is_host_of(conn, &msg.room) {
            tracing::debug!(conn, room = %msg.room, "assign-role from non-host ignored");
            return;
        }
        let Some(target) = self.registry.lookup(&msg.room, &msg.username) else {
            tracing::debug!(room = %msg.room, username = %msg.username, "assign-role: no live binding");
            return;
        };
        self.send(
            target,
            &ServerMessage::AssignedRole(AssignedRoleMsg {
                role: msg.role,
                role_data: msg.role_data,
            }),
        );
    }

    /// Host-issued reveal: flips the room-wide flag for every current
    /// member, the host included. Carries no role data; the host follows
    /// up by re-issuing every individual assignment.
    fn reveal_roles(&mut self, conn: ConnId, msg: &RevealRolesMsg) {
        if !self.is_host_of(conn, &msg.room) {
            tracing::debug!(conn, room = %msg.room, "reveal-roles from non-host ignored");
            return;
        }
        self.broadcast(&msg.room, &ServerMessage::RolesRevealed(RolesRevealedMsg {}));
    }

    /// Host-issued removal of a player by name. The target gets a
    /// forced-termination notice, its socket is severed, and the rest of
    /// the room sees a presence-leave. Unknown names are a silent no-op.
    fn kick(&mut self, conn: ConnId, msg: &KickPlayerMsg) {
        if !self.is_host_of(conn, &msg.room) {
            tracing::debug!(conn, room = %msg.room, "kick from non-host ignored");
            return;
        }
        let Some(target) = self.registry.lookup(&msg.room, &msg.username) else {
            tracing::debug!(room = %msg.room, username = %msg.username, "kick: no live binding");
            return;
        };
        tracing::info!(room = %msg.room, username = %msg.username, "player kicked");
        self.send(target, &ServerMessage::Kicked(KickedMsg {}));
        self.fanout.sever(target);
        self.registry.release(&msg.room, &msg.username);
        self.fanout.leave(&msg.room, target);
        self.conns.insert(target, ConnState::Unbound);
        self.broadcast(
            &msg.room,
            &ServerMessage::UserLeft(UserLeftMsg {
                username: msg.username.clone(),
            }),
        );
    }

    fn is_unbound(&self, conn: ConnId) -> bool {
        self.conns.get(&conn) == Some(&ConnState::Unbound)
    }

    fn is_host_of(&self, conn: ConnId, room: &str) -> bool {
        self.directory.host(room) == Some(conn)
    }

    fn send(&self, conn: ConnId, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.fanout.send(conn, Bytes::from(data)),
            Err(e) => tracing::warn!(conn, error = %e, "failed to encode server message"),
        }
    }

    fn send_error(&self, conn: ConnId, err: SessionError) {
        self.send(
            conn,
            &ServerMessage::JoinError(JoinErrorMsg {
                message: err.message().to_string(),
            }),
        );
    }

    fn broadcast(&self, room: &str, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.fanout.broadcast(room, &Bytes::from(data)),
            Err(e) => tracing::warn!(room, error = %e, "failed to encode broadcast"),
        }
    }

    fn broadcast_except(&self, room: &str, exclude: ConnId, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.fanout.broadcast_except(room, exclude, &Bytes::from(data)),
            Err(e) => tracing::warn!(room, error = %e, "failed to encode broadcast"),
        }
    }
}

/// Handle for submitting commands to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
    next_conn: Arc<AtomicU64>,
}

impl CoordinatorHandle {
    /// Allocate a connection id. Ids are never reused within a process.
    pub fn alloc_conn(&self) -> ConnId {
        self.next_conn.fetch_add(1, Ordering::Relaxed)
    }

    pub fn submit(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            tracing::warn!("coordinator task is gone, dropping command");
        }
    }
}

/// Spawn the coordinator actor. Every session event flows through one
/// ordered queue, so registry mutations are atomic with respect to each
/// other and per-room emission order is preserved without locks.
pub fn spawn_coordinator() -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut coordinator = SessionCoordinator::new();
        while let Some(cmd) = rx.recv().await {
            coordinator.apply(cmd);
        }
        tracing::info!("coordinator queue closed, task exiting");
    });
    (
        CoordinatorHandle {
            tx,
            next_conn: Arc::new(AtomicU64::new(1)),
        },
        task,
    )
}
