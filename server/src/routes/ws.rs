//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by service prefix
//! - Event frames from peers → forward to client
//!
//! Handler functions are pure business logic — they validate, call services,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! reply to sender and event broadcast to every connected client.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / announce / both)
//! 4. Close → unregister the client
//!
//! Connections are anonymous: identity is the user id carried in frame data,
//! exactly as stored in the client's session cookie analog. Disconnect does
//! not flip a user offline — going offline is an explicit `users:patch`.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use frames::{Data, Frame, Status};

use crate::services;
use crate::services::message::MessageRecord;
use crate::services::user::{UserPatch, UserRecord};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Reply done+data to sender AND broadcast an event frame to every
    /// connected client (the sender's event copy arrives like any peer's).
    ReplyAndAnnounce { reply: Data, event: Frame },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving event frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);
    state.register_client(client_id, client_tx).await;

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        state.remove_client(client_id).await;
        return;
    }

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let sender_frames = process_inbound_text(&state, client_id, &text).await;
                        for frame in sender_frames {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    state.remove_client(client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch end-to-end without a socket.
async fn process_inbound_text(state: &AppState, client_id: Uuid, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new())
                .with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    info!(%client_id, id = %req.id, method = %req.method, status = ?req.status, "ws: recv frame");

    // Dispatch to handler — returns Outcome or error Frame.
    let service = req.service();
    let result = match service {
        "messages" => handle_messages(state, &req).await,
        "users" => handle_users(state, &req).await,
        _ => Err(req.error(format!("unknown service: {service}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::ReplyAndAnnounce { reply, event }) => {
            state.broadcast(&event, None).await;
            vec![req.done_with(reply)]
        }
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// MESSAGE HANDLERS
// =============================================================================

async fn handle_messages(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.method.split_once(':').map_or("", |(_, op)| op);

    match op {
        "create" => {
            let Some(user_id) = req
                .data
                .get("user")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
            else {
                return Err(req.error("user required"));
            };

            match services::message::create_message(&state.pool, &req.data, user_id).await {
                Ok(msg) => {
                    let data = message_to_data(&msg);
                    let event = Frame::request("messages:created", data.clone())
                        .with_from(msg.user_id.to_string());
                    Ok(Outcome::ReplyAndAnnounce { reply: data, event })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "find" => {
            let limit = req.data.get("limit").and_then(serde_json::Value::as_i64);
            match services::message::find_messages(&state.pool, limit).await {
                Ok(messages) => {
                    let list: Vec<serde_json::Value> =
                        messages.iter().map(|m| serde_json::json!(message_to_data(m))).collect();
                    let mut data = Data::new();
                    data.insert("messages".into(), serde_json::json!(list));
                    Ok(Outcome::Reply(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        _ => Err(req.error(format!("unknown messages op: {op}"))),
    }
}

// =============================================================================
// USER HANDLERS
// =============================================================================

async fn handle_users(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.method.split_once(':').map_or("", |(_, op)| op);

    match op {
        "create" => {
            let online = req
                .data
                .get("online")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            match services::user::create_user(&state.pool, online).await {
                Ok(user) => {
                    let data = user_to_data(&user);
                    let event = Frame::request("users:created", data.clone())
                        .with_from(user.id.to_string());
                    Ok(Outcome::ReplyAndAnnounce { reply: data, event })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "get" => {
            let Some(id) = parse_id(req) else {
                return Err(req.error("id required"));
            };
            match services::user::get_user(&state.pool, id).await {
                Ok(user) => Ok(Outcome::Reply(user_to_data(&user))),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "patch" => {
            let Some(id) = parse_id(req) else {
                return Err(req.error("id required"));
            };
            let patch = UserPatch {
                name: req.data.get("name").and_then(|v| v.as_str()).map(str::to_string),
                color: req.data.get("color").and_then(|v| v.as_str()).map(str::to_string),
                online: req.data.get("online").and_then(serde_json::Value::as_bool),
            };
            match services::user::patch_user(&state.pool, id, &patch).await {
                Ok(user) => {
                    let data = user_to_data(&user);
                    let event = Frame::request("users:patched", data.clone())
                        .with_from(user.id.to_string());
                    Ok(Outcome::ReplyAndAnnounce { reply: data, event })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "find" => {
            let online = req.data.get("online").and_then(serde_json::Value::as_bool);
            let limit = req
                .data
                .get("limit")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(200)
                .clamp(1, 200);
            match services::user::find_users(&state.pool, online, limit).await {
                Ok(users) => {
                    let list: Vec<serde_json::Value> =
                        users.iter().map(|u| serde_json::json!(user_to_data(u))).collect();
                    let mut data = Data::new();
                    data.insert("users".into(), serde_json::json!(list));
                    Ok(Outcome::Reply(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        _ => Err(req.error(format!("unknown users op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_id(req: &Frame) -> Option<Uuid> {
    req.data
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, method = %frame.method, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, method = %frame.method, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn message_to_data(msg: &MessageRecord) -> Data {
    let mut data = Data::new();
    data.insert("id".into(), serde_json::json!(msg.id));
    data.insert("text".into(), serde_json::json!(msg.text));
    data.insert("user_id".into(), serde_json::json!(msg.user_id));
    data.insert("user_name".into(), serde_json::json!(msg.user_name));
    data.insert("user_color".into(), serde_json::json!(msg.user_color));
    data.insert("created_at".into(), serde_json::json!(msg.created_at));
    data
}

fn user_to_data(user: &UserRecord) -> Data {
    let mut data = Data::new();
    data.insert("id".into(), serde_json::json!(user.id));
    data.insert("name".into(), serde_json::json!(user.name));
    data.insert("color".into(), serde_json::json!(user.color));
    data.insert("online".into(), serde_json::json!(user.online));
    data.insert("created_at".into(), serde_json::json!(user.created_at));
    data.insert("updated_at".into(), serde_json::json!(user.updated_at));
    data
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
