use serde::{Deserialize, Serialize};

use crate::role::RoleRef;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> server (session lifecycle)
    Host = 0x01,
    JoinRoom = 0x02,
    Rejoin = 0x03,
    LeaveRoom = 0x04,

    // Client -> server (host authority)
    AssignRole = 0x05,
    RevealRoles = 0x06,
    KickPlayer = 0x07,

    // Server -> client (session lifecycle)
    Hosted = 0x10,
    Joined = 0x11,
    ReconnectedHost = 0x12,
    ReconnectedJoin = 0x13,
    JoinError = 0x14,
    UserJoined = 0x15,
    UserLeft = 0x16,
    LeftRoom = 0x17,

    // Server -> client (roles)
    AssignedRole = 0x20,
    RolesRevealed = 0x21,
    Kicked = 0x22,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Host),
            0x02 => Some(Self::JoinRoom),
            0x03 => Some(Self::Rejoin),
            0x04 => Some(Self::LeaveRoom),
            0x05 => Some(Self::AssignRole),
            0x06 => Some(Self::RevealRoles),
            0x07 => Some(Self::KickPlayer),
            0x10 => Some(Self::Hosted),
            0x11 => Some(Self::Joined),
            0x12 => Some(Self::ReconnectedHost),
            0x13 => Some(Self::ReconnectedJoin),
            0x14 => Some(Self::JoinError),
            0x15 => Some(Self::UserJoined),
            0x16 => Some(Self::UserLeft),
            0x17 => Some(Self::LeftRoom),
            0x20 => Some(Self::AssignedRole),
            0x21 => Some(Self::RolesRevealed),
            0x22 => Some(Self::Kicked),
            _ => None,
        }
    }
}

/// Request to open a new room as host. `player_count` and `edition` are
/// opaque to the server; they ride along for other clients' benefit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMsg {
    pub protocol_version: u8,
    pub player_count: Option<u32>,
    pub edition: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub protocol_version: u8,
    pub room: String,
    pub username: String,
}

/// Which authority a reloaded client is trying to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejoinKind {
    Host,
    Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejoinMsg {
    pub protocol_version: u8,
    pub kind: RejoinKind,
    pub room: String,
    /// Required for `RejoinKind::Player`; ignored for hosts.
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignRoleMsg {
    pub room: String,
    pub username: String,
    pub role: RoleRef,
    pub role_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealRolesMsg {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickPlayerMsg {
    pub room: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedMsg {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedMsg {
    pub room: String,
    pub username: String,
    /// Current presence in join order, the new member included.
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectedHostMsg {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectedJoinMsg {
    pub room: String,
    pub username: String,
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJoinedMsg {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLeftMsg {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftRoomMsg {
    pub room: String,
}

/// Private, point-to-point role delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedRoleMsg {
    pub role: RoleRef,
    pub role_data: serde_json::Value,
}

/// Room-wide reveal flag flip. Carries no role data; the host follows up
/// with per-player `AssignedRole` sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesRevealedMsg {}

/// Forced-termination notice, sent just before the server severs the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickedMsg {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Host(HostMsg),
    JoinRoom(JoinRoomMsg),
    Rejoin(RejoinMsg),
    LeaveRoom(LeaveRoomMsg),
    AssignRole(AssignRoleMsg),
    RevealRoles(RevealRolesMsg),
    KickPlayer(KickPlayerMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Host(_) => MessageType::Host,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::Rejoin(_) => MessageType::Rejoin,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
            Self::AssignRole(_) => MessageType::AssignRole,
            Self::RevealRoles(_) => MessageType::RevealRoles,
            Self::KickPlayer(_) => MessageType::KickPlayer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Hosted(HostedMsg),
    Joined(JoinedMsg),
    ReconnectedHost(ReconnectedHostMsg),
    ReconnectedJoin(ReconnectedJoinMsg),
    JoinError(JoinErrorMsg),
    UserJoined(UserJoinedMsg),
    UserLeft(UserLeftMsg),
    LeftRoom(LeftRoomMsg),
    AssignedRole(AssignedRoleMsg),
    RolesRevealed(RolesRevealedMsg),
    Kicked(KickedMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Hosted(_) => MessageType::Hosted,
            Self::Joined(_) => MessageType::Joined,
            Self::ReconnectedHost(_) => MessageType::ReconnectedHost,
            Self::ReconnectedJoin(_) => MessageType::ReconnectedJoin,
            Self::JoinError(_) => MessageType::JoinError,
            Self::UserJoined(_) => MessageType::UserJoined,
            Self::UserLeft(_) => MessageType::UserLeft,
            Self::LeftRoom(_) => MessageType::LeftRoom,
            Self::AssignedRole(_) => MessageType::AssignedRole,
            Self::RolesRevealed(_) => MessageType::RolesRevealed,
            Self::Kicked(_) => MessageType::Kicked,
        }
    }
}
