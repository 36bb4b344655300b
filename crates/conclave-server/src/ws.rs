use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ConnectInfo;
use axum::extract::FromRequest;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use conclave_core::net::messages::{
    ClientMessage, JoinErrorMsg, RejoinKind, ServerMessage,
};
use conclave_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, encode_server_message,
};
use conclave_core::room::is_valid_room_code;

use crate::coordinator::{Command, ConnId};
use crate::fanout::ConnSender;
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Per-IP connection limit
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    let max_per_ip = state.config.limits.max_ws_per_ip;
    let ip_guard = IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip);
    let Some(ip_guard) = ip_guard else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    };

    // Perform WebSocket upgrade manually
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, ip_guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _ip_guard: IpConnectionGuard) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let conn = state.coordinator.alloc_conn();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.client_message_buffer);
    let kill = CancellationToken::new();
    state.coordinator.submit(Command::Connect {
        conn,
        sender: tx.clone(),
        kill: kill.clone(),
    });
    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, conn, &tx, &kill).await;

    // Connection gone — sweep whatever it still holds.
    state.coordinator.submit(Command::Disconnect { conn });
    tracing::info!(conn, "connection closed");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Send an error straight to this connection's writer, bypassing the
/// coordinator (transport-edge validation only).
fn send_direct(tx: &ConnSender, message: &str) {
    let msg = ServerMessage::JoinError(JoinErrorMsg {
        message: message.to_string(),
    });
    if let Ok(data) = encode_server_message(&msg)
        && tx.try_send(Bytes::from(data)).is_err()
    {
        tracing::debug!("failed to queue transport-edge error");
    }
}

fn valid_username(name: &str) -> bool {
    !name.is_empty() && name.len() <= 32 && !name.chars().any(|c| c.is_control())
}

fn version_ok(version: u8) -> bool {
    version == 0 || version == PROTOCOL_VERSION
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    conn: ConnId,
    tx: &ConnSender,
    kill: &CancellationToken,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    // The first decoded message must open a session (host, join, or
    // rejoin); anything else closes the connection.
    let mut opened = false;

    loop {
        let msg = tokio::select! {
            _ = kill.cancelled() => break,
            next = ws_receiver.next() => match next {
                Some(Ok(m)) => m,
                _ => break,
            },
        };

        let data = match msg {
            Message::Binary(d) => d.to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(conn, "rate limited");
            continue;
        }

        // Drop oversized and empty messages
        if data.len() > MAX_MESSAGE_SIZE || data.is_empty() {
            continue;
        }

        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(conn, error = %e, "dropping undecodable message");
                continue;
            },
        };

        if !opened
            && !matches!(
                client_msg,
                ClientMessage::Host(_) | ClientMessage::JoinRoom(_) | ClientMessage::Rejoin(_)
            )
        {
            tracing::debug!(conn, "first message did not open a session");
            break;
        }

        match client_msg {
            ClientMessage::Host(msg) => {
                if !version_ok(msg.protocol_version) {
                    send_direct(
                        tx,
                        &format!(
                            "Protocol version mismatch: client={}, server={}",
                            msg.protocol_version, PROTOCOL_VERSION
                        ),
                    );
                    break;
                }
                opened = true;
                state.coordinator.submit(Command::Host { conn, msg });
            },
            ClientMessage::JoinRoom(mut msg) => {
                if !version_ok(msg.protocol_version) {
                    send_direct(
                        tx,
                        &format!(
                            "Protocol version mismatch: client={}, server={}",
                            msg.protocol_version, PROTOCOL_VERSION
                        ),
                    );
                    break;
                }
                opened = true;
                if !is_valid_room_code(&msg.room) {
                    send_direct(tx, "Invalid room code.");
                    continue;
                }
                let name = msg.username.trim().to_string();
                if !valid_username(&name) {
                    send_direct(tx, "Invalid username.");
                    continue;
                }
                msg.username = name;
                state.coordinator.submit(Command::Join { conn, msg });
            },
            ClientMessage::Rejoin(mut msg) => {
                if !version_ok(msg.protocol_version) {
                    send_direct(
                        tx,
                        &format!(
                            "Protocol version mismatch: client={}, server={}",
                            msg.protocol_version, PROTOCOL_VERSION
                        ),
                    );
                    break;
                }
                opened = true;
                if !is_valid_room_code(&msg.room) {
                    send_direct(tx, "Invalid room code.");
                    continue;
                }
                if msg.kind == RejoinKind::Player {
                    let trimmed = msg
                        .username
                        .as_deref()
                        .map(|n| n.trim().to_string())
                        .unwrap_or_default();
                    if !valid_username(&trimmed) {
                        send_direct(tx, "Invalid username.");
                        continue;
                    }
                    msg.username = Some(trimmed);
                }
                state.coordinator.submit(Command::Rejoin { conn, msg });
            },
            ClientMessage::LeaveRoom(msg) => {
                state.coordinator.submit(Command::Leave { conn, msg });
            },
            ClientMessage::AssignRole(msg) => {
                state.coordinator.submit(Command::AssignRole { conn, msg });
            },
            ClientMessage::RevealRoles(msg) => {
                state.coordinator.submit(Command::RevealRoles { conn, msg });
            },
            ClientMessage::KickPlayer(msg) => {
                state.coordinator.submit(Command::KickPlayer { conn, msg });
            },
        }
    }
}
