use serde::{Deserialize, Serialize};

use super::messages::{
    AssignRoleMsg, AssignedRoleMsg, ClientMessage, HostMsg, HostedMsg, JoinErrorMsg, JoinRoomMsg,
    JoinedMsg, KickPlayerMsg, KickedMsg, LeaveRoomMsg, LeftRoomMsg, MessageType, ReconnectedHostMsg,
    ReconnectedJoinMsg, RejoinMsg, RevealRolesMsg, RolesRevealedMsg, ServerMessage, UserJoinedMsg,
    UserLeftMsg,
};

/// Current protocol version. A value of 0 in a client hello means
/// "unspecified" and is accepted.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Host(m) => encode_message(MessageType::Host, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::Rejoin(m) => encode_message(MessageType::Rejoin, m),
        ClientMessage::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
        ClientMessage::AssignRole(m) => encode_message(MessageType::AssignRole, m),
        ClientMessage::RevealRoles(m) => encode_message(MessageType::RevealRoles, m),
        ClientMessage::KickPlayer(m) => encode_message(MessageType::KickPlayer, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::Hosted(m) => encode_message(MessageType::Hosted, m),
        ServerMessage::Joined(m) => encode_message(MessageType::Joined, m),
        ServerMessage::ReconnectedHost(m) => encode_message(MessageType::ReconnectedHost, m),
        ServerMessage::ReconnectedJoin(m) => encode_message(MessageType::ReconnectedJoin, m),
        ServerMessage::JoinError(m) => encode_message(MessageType::JoinError, m),
        ServerMessage::UserJoined(m) => encode_message(MessageType::UserJoined, m),
        ServerMessage::UserLeft(m) => encode_message(MessageType::UserLeft, m),
        ServerMessage::LeftRoom(m) => encode_message(MessageType::LeftRoom, m),
        ServerMessage::AssignedRole(m) => encode_message(MessageType::AssignedRole, m),
        ServerMessage::RolesRevealed(m) => encode_message(MessageType::RolesRevealed, m),
        ServerMessage::Kicked(m) => encode_message(MessageType::Kicked, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Host => Ok(ClientMessage::Host(decode_payload::<HostMsg>(data)?)),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::Rejoin => Ok(ClientMessage::Rejoin(decode_payload::<RejoinMsg>(data)?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::AssignRole => Ok(ClientMessage::AssignRole(decode_payload::<AssignRoleMsg>(
            data,
        )?)),
        MessageType::RevealRoles => Ok(ClientMessage::RevealRoles(decode_payload::<
            RevealRolesMsg,
        >(data)?)),
        MessageType::KickPlayer => Ok(ClientMessage::KickPlayer(decode_payload::<KickPlayerMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Hosted => Ok(ServerMessage::Hosted(decode_payload::<HostedMsg>(data)?)),
        MessageType::Joined => Ok(ServerMessage::Joined(decode_payload::<JoinedMsg>(data)?)),
        MessageType::ReconnectedHost => Ok(ServerMessage::ReconnectedHost(decode_payload::<
            ReconnectedHostMsg,
        >(data)?)),
        MessageType::ReconnectedJoin => Ok(ServerMessage::ReconnectedJoin(decode_payload::<
            ReconnectedJoinMsg,
        >(data)?)),
        MessageType::JoinError => Ok(ServerMessage::JoinError(decode_payload::<JoinErrorMsg>(
            data,
        )?)),
        MessageType::UserJoined => Ok(ServerMessage::UserJoined(decode_payload::<UserJoinedMsg>(
            data,
        )?)),
        MessageType::UserLeft => Ok(ServerMessage::UserLeft(decode_payload::<UserLeftMsg>(
            data,
        )?)),
        MessageType::LeftRoom => Ok(ServerMessage::LeftRoom(decode_payload::<LeftRoomMsg>(
            data,
        )?)),
        MessageType::AssignedRole => Ok(ServerMessage::AssignedRole(decode_payload::<
            AssignedRoleMsg,
        >(data)?)),
        MessageType::RolesRevealed => Ok(ServerMessage::RolesRevealed(decode_payload::<
            RolesRevealedMsg,
        >(data)?)),
        MessageType::Kicked => Ok(ServerMessage::Kicked(decode_payload::<KickedMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
