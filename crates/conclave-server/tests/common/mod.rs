use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use conclave_core::net::messages::{
    ClientMessage, HostMsg, JoinRoomMsg, JoinedMsg, RejoinKind, RejoinMsg, ServerMessage,
};
use conclave_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};

use conclave_server::build_app;
use conclave_server::config::ServerConfig;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config on an ephemeral port.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage over a WS stream.
pub async fn ws_send_client(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Wait for the connection to close (2s deadline), skipping any
/// in-flight binary frames.
pub async fn ws_expect_close(stream: &mut WsStream) {
    let deadline = Duration::from_secs(2);
    let closed = tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(_))) => continue,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                _ => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "expected the connection to close");
}

/// Open a room as host. Returns the room code.
pub async fn ws_host(stream: &mut WsStream) -> String {
    let msg = ClientMessage::Host(HostMsg {
        protocol_version: PROTOCOL_VERSION,
        player_count: None,
        edition: None,
    });
    ws_send_client(stream, &msg).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::Hosted(hosted) => hosted.room,
        other => panic!("Expected Hosted, got: {other:?}"),
    }
}

/// Send a JoinRoom and return whatever response comes back.
pub async fn ws_join_response(stream: &mut WsStream, room: &str, name: &str) -> ServerMessage {
    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        protocol_version: PROTOCOL_VERSION,
        room: room.to_string(),
        username: name.to_string(),
    });
    ws_send_client(stream, &msg).await;
    ws_read_server_msg(stream).await
}

/// Join a room, panicking on error. Returns the Joined payload.
pub async fn ws_join(stream: &mut WsStream, room: &str, name: &str) -> JoinedMsg {
    match ws_join_response(stream, room, name).await {
        ServerMessage::Joined(joined) => joined,
        other => panic!("Expected Joined, got: {other:?}"),
    }
}

/// Send a host rejoin and return the response.
pub async fn ws_rejoin_host(stream: &mut WsStream, room: &str) -> ServerMessage {
    let msg = ClientMessage::Rejoin(RejoinMsg {
        protocol_version: PROTOCOL_VERSION,
        kind: RejoinKind::Host,
        room: room.to_string(),
        username: None,
    });
    ws_send_client(stream, &msg).await;
    ws_read_server_msg(stream).await
}

/// Send a player rejoin and return the response.
pub async fn ws_rejoin_player(stream: &mut WsStream, room: &str, name: &str) -> ServerMessage {
    let msg = ClientMessage::Rejoin(RejoinMsg {
        protocol_version: PROTOCOL_VERSION,
        kind: RejoinKind::Player,
        room: room.to_string(),
        username: Some(name.to_string()),
    });
    ws_send_client(stream, &msg).await;
    ws_read_server_msg(stream).await
}
