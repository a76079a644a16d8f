//! WebSocket implementation of [`ChatApi`].
//!
//! DESIGN
//! ======
//! One background task owns the socket. Callers hand it request frames over
//! an mpsc channel; the task correlates terminal replies back through a
//! pending map keyed by request id, and forwards event frames to the event
//! channel the host consumes. Requests that are in flight when the socket
//! closes resolve with `ClientError::Closed` — there is no retry and no
//! reordering, the transport's ordering is taken as-is.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::warn;
use uuid::Uuid;

use frames::{Data, Frame, Status};

use super::ChatApi;
use super::events::{ServerEvent, parse_event};
use crate::error::{ClientError, RemoteError};
use crate::model::{ChatMessage, User, UserPatch};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ReplyResult = Result<Frame, ClientError>;

struct PendingRequest {
    frame: Frame,
    respond: oneshot::Sender<ReplyResult>,
}

/// Handle for issuing requests over a connected socket. Cheap to clone.
#[derive(Clone)]
pub struct SocketClient {
    req_tx: mpsc::Sender<PendingRequest>,
}

/// Connect to a chat server and spawn the socket task.
///
/// Returns the request handle and the stream of server events. Dropping the
/// receiver only discards events; dropping every `SocketClient` closes the
/// connection.
///
/// # Errors
///
/// Returns a transport error if the WebSocket handshake fails.
pub async fn connect(url: &str) -> Result<(SocketClient, mpsc::Receiver<ServerEvent>), ClientError> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;

    let (req_tx, req_rx) = mpsc::channel::<PendingRequest>(32);
    let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(256);
    tokio::spawn(run_socket(socket, req_rx, event_tx));

    Ok((SocketClient { req_tx }, event_rx))
}

// =============================================================================
// SOCKET TASK
// =============================================================================

async fn run_socket(
    socket: Socket,
    mut req_rx: mpsc::Receiver<PendingRequest>,
    event_tx: mpsc::Sender<ServerEvent>,
) {
    let (mut sink, mut stream) = socket.split();
    let mut pending: HashMap<Uuid, oneshot::Sender<ReplyResult>> = HashMap::new();

    loop {
        tokio::select! {
            req = req_rx.recv() => {
                // All request handles dropped: the session is over.
                let Some(PendingRequest { frame, respond }) = req else { break };
                let json = match serde_json::to_string(&frame) {
                    Ok(j) => j,
                    Err(e) => {
                        let _ = respond.send(Err(ClientError::Protocol(e.to_string())));
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    let _ = respond.send(Err(ClientError::Closed));
                    break;
                }
                pending.insert(frame.id, respond);
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        route_inbound(text.as_str(), &mut pending, &event_tx);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    for (_, respond) in pending.drain() {
        let _ = respond.send(Err(ClientError::Closed));
    }
}

/// Route one inbound frame: resolve a pending request or surface an event.
fn route_inbound(
    text: &str,
    pending: &mut HashMap<Uuid, oneshot::Sender<ReplyResult>>,
    event_tx: &mpsc::Sender<ServerEvent>,
) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "socket: invalid inbound frame");
            return;
        }
    };

    if let Some(parent_id) = frame.parent_id {
        if !frame.status.is_terminal() {
            // Item frames are unused by this protocol's single-payload replies.
            return;
        }
        if let Some(respond) = pending.remove(&parent_id) {
            let result = if frame.status == Status::Error {
                Err(ClientError::Remote(RemoteError::from_error_data(&frame.data)))
            } else {
                Ok(frame)
            };
            let _ = respond.send(result);
        }
        return;
    }

    if let Some(event) = parse_event(&frame) {
        // Best-effort: a full or closed event channel drops the event rather
        // than stalling the socket task (a reply may be waiting behind it).
        if event_tx.try_send(event).is_err() {
            warn!(method = %frame.method, "socket: dropped server event");
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

impl SocketClient {
    async fn call(&self, method: &str, data: Data) -> Result<Frame, ClientError> {
        let frame = Frame::request(method, data);
        let (tx, rx) = oneshot::channel();
        self.req_tx
            .send(PendingRequest { frame, respond: tx })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }
}

fn parse_reply<T>(frame: &Frame, parse: impl Fn(&Data) -> Option<T>) -> Result<T, ClientError> {
    parse(&frame.data).ok_or_else(|| ClientError::Protocol(format!("bad {} payload", frame.method)))
}

fn parse_list<T>(frame: &Frame, key: &str, parse: impl Fn(&serde_json::Value) -> Option<T>) -> Result<Vec<T>, ClientError> {
    let items = frame
        .data
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| ClientError::Protocol(format!("bad {} payload", frame.method)))?;
    // Tolerant: skip malformed entries rather than failing the whole list.
    Ok(items.iter().filter_map(|item| parse(item)).collect())
}

#[async_trait]
impl ChatApi for SocketClient {
    async fn create_message(&self, text: &str, user_id: Uuid) -> Result<ChatMessage, ClientError> {
        let mut data = Data::new();
        data.insert("text".into(), serde_json::json!(text));
        data.insert("user".into(), serde_json::json!(user_id.to_string()));
        let reply = self.call("messages:create", data).await?;
        parse_reply(&reply, ChatMessage::from_data)
    }

    async fn find_messages(&self, limit: i64) -> Result<Vec<ChatMessage>, ClientError> {
        let mut data = Data::new();
        data.insert("limit".into(), serde_json::json!(limit));
        let reply = self.call("messages:find", data).await?;
        parse_list(&reply, "messages", ChatMessage::from_value)
    }

    async fn create_user(&self, online: bool) -> Result<User, ClientError> {
        let mut data = Data::new();
        data.insert("online".into(), serde_json::json!(online));
        let reply = self.call("users:create", data).await?;
        parse_reply(&reply, User::from_data)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, ClientError> {
        let mut data = Data::new();
        data.insert("id".into(), serde_json::json!(id.to_string()));
        let reply = self.call("users:get", data).await?;
        parse_reply(&reply, User::from_data)
    }

    async fn patch_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, ClientError> {
        let mut data = Data::new();
        data.insert("id".into(), serde_json::json!(id.to_string()));
        if let Some(name) = &patch.name {
            data.insert("name".into(), serde_json::json!(name));
        }
        if let Some(color) = &patch.color {
            data.insert("color".into(), serde_json::json!(color));
        }
        if let Some(online) = patch.online {
            data.insert("online".into(), serde_json::json!(online));
        }
        let reply = self.call("users:patch", data).await?;
        parse_reply(&reply, User::from_data)
    }

    async fn find_users(&self, online: Option<bool>, limit: i64) -> Result<Vec<User>, ClientError> {
        let mut data = Data::new();
        if let Some(online) = online {
            data.insert("online".into(), serde_json::json!(online));
        }
        data.insert("limit".into(), serde_json::json!(limit));
        let reply = self.call("users:find", data).await?;
        parse_list(&reply, "users", User::from_value)
    }
}
