//! Realtime gateway
//!
//! One WebSocket per client. The per-connection task is a `tokio::select!`
//! between the client's inbound frames and the joined room's broadcast
//! stream; it owns no domain logic - frames become `RoomCommand`s, and
//! outbound messages are filtered by target before hitting the socket.

pub mod messages;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::game::GameError;
use crate::rooms::{RoomCommand, RoomHandle, RoomStore};
use crate::tts::{TtsFanout, TtsJob};
use crate::types::{Actor, PlayerRequest, SessionId};
use messages::{decode, encode, ClientMessage, Outbound, ServerMessage};

/// Shared dependencies for every connection.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<RoomStore>,
    pub tts: TtsFanout,
}

/// Build the axum application.
pub fn create_app(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<GatewayState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "rooms": state.store.room_count(),
    }))
}

/// `GET /ws` - upgrade and hand the socket to the connection task.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Registration of a connection inside a room.
struct JoinedRoom {
    room_id: String,
    handle: RoomHandle,
    events: broadcast::Receiver<Outbound>,
    actor: Actor,
}

/// Per-connection task: resolve the join first, then run the duplex loop.
async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let session: SessionId = SessionId::new_v4();
    debug!(session = %session, "websocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Phase 1: nothing but `join` (and TTS requests) until a seat is taken.
    let Some(joined) = await_join(&state, session, &mut ws_tx, &mut ws_rx).await else {
        debug!(session = %session, "websocket closed before joining");
        return;
    };
    let JoinedRoom {
        room_id,
        handle,
        mut events,
        actor,
    } = joined;

    // Phase 2: duplex loop between the client and the room broadcast.
    loop {
        tokio::select! {
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if handle_frame(&state, &room_id, &handle, &actor, &mut ws_tx, &text)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(session = %session, error = %e, "websocket read error");
                        break;
                    }
                    _ => {}
                }
            }
            outbound = events.recv() => {
                match outbound {
                    Ok(outbound) => {
                        if outbound.is_for(session)
                            && ws_tx.send(Message::Text(encode(&outbound.message))).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(room = %room_id, skipped, "connection lagged behind broadcasts");
                    }
                    // Room torn down: nothing left to relay.
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Departure: free the seat so a rejoin can reclaim the role.
    let _ = handle.commands.send(RoomCommand::Leave { session }).await;
    debug!(session = %session, "websocket disconnected");
}

/// Read frames until a successful join (returning the registration) or the
/// socket closes (returning `None`).
async fn await_join(
    state: &GatewayState,
    session: SessionId,
    ws_tx: &mut (impl Sink<Message> + Unpin),
    ws_rx: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<JoinedRoom> {
    loop {
        let text = match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return None,
            Some(Err(_)) => return None,
            _ => continue,
        };
        let Some(message) = decode(&text) else {
            send_direct(ws_tx, &ServerMessage::ErrorMsg {
                msg: "unrecognized message".to_string(),
            })
            .await
            .ok()?;
            continue;
        };
        match message {
            ClientMessage::Join {
                room,
                username,
                role,
                mode,
            } => match state.store.join(&room, session, &username, role, mode).await {
                Ok((handle, events)) => {
                    info!(session = %session, room = %room, user = %username, role = %role, "joined room");
                    return Some(JoinedRoom {
                        room_id: room,
                        handle,
                        events,
                        actor: Actor::human(username, role, session),
                    });
                }
                Err(GameError::RoomFull) => {
                    send_direct(ws_tx, &ServerMessage::RoomFull).await.ok()?;
                }
                Err(e) => {
                    send_direct(ws_tx, &ServerMessage::ErrorMsg { msg: e.to_string() })
                        .await
                        .ok()?;
                }
            },
            ClientMessage::RequestTts { .. } => enqueue_tts(state, message),
            _ => {
                send_direct(ws_tx, &ServerMessage::ErrorMsg {
                    msg: "join a room first".to_string(),
                })
                .await
                .ok()?;
            }
        }
    }
}

/// Decode and dispatch one post-join client frame.
async fn handle_frame(
    state: &GatewayState,
    room_id: &str,
    handle: &RoomHandle,
    actor: &Actor,
    ws_tx: &mut (impl Sink<Message> + Unpin),
    raw: &str,
) -> Result<(), ()> {
    let Some(message) = decode(raw) else {
        return send_direct(ws_tx, &ServerMessage::ErrorMsg {
            msg: "unrecognized message".to_string(),
        })
        .await;
    };
    if message.room() != room_id {
        return send_direct(ws_tx, &ServerMessage::ErrorMsg {
            msg: format!("not seated in room '{}'", message.room()),
        })
        .await;
    }

    match message {
        ClientMessage::Join { .. } => {
            send_direct(ws_tx, &ServerMessage::ErrorMsg {
                msg: "already joined a room".to_string(),
            })
            .await
        }
        ClientMessage::RequestTts { .. } => {
            enqueue_tts(state, message);
            Ok(())
        }
        other => {
            let Some(request) = to_request(other) else {
                return Ok(());
            };
            if handle
                .commands
                .send(RoomCommand::Request {
                    actor: actor.clone(),
                    request,
                })
                .await
                .is_err()
            {
                // Room actor is gone; close the connection.
                return Err(());
            }
            Ok(())
        }
    }
}

/// TTS never touches room state; it only needs a live room at delivery time.
fn enqueue_tts(state: &GatewayState, message: ClientMessage) {
    if let ClientMessage::RequestTts {
        room,
        text,
        message_id,
        sentence_index,
        total_sentences,
    } = message
    {
        state.tts.enqueue(TtsJob {
            room,
            message_id,
            sentence_index,
            total_sentences,
            text,
            voice: String::new(),
        });
    }
}

/// Map a non-join client frame to its game request.
fn to_request(message: ClientMessage) -> Option<PlayerRequest> {
    match message {
        ClientMessage::PfIdentifyThreat { keyword, .. } => {
            Some(PlayerRequest::IdentifyThreat { keyword })
        }
        ClientMessage::PfSubmitDecision {
            keyword, option_id, ..
        } => Some(PlayerRequest::SubmitDecision { keyword, option_id }),
        ClientMessage::PmVerifyDecision { approved, .. } => {
            Some(PlayerRequest::VerifyDecision { approved })
        }
        ClientMessage::StartEmergencyQuiz { .. } => Some(PlayerRequest::StartQuiz),
        ClientMessage::SubmitQuizAnswer {
            question_id, answer, ..
        } => Some(PlayerRequest::SubmitQuizAnswer { question_id, answer }),
        ClientMessage::ReqPhase2 { .. } => Some(PlayerRequest::RequestPhase2),
        ClientMessage::MonitorGauge { gauge_id, .. } => {
            Some(PlayerRequest::MonitorGauge { gauge_id })
        }
        ClientMessage::SelectChecklist { key, .. } => Some(PlayerRequest::SelectQrh { key }),
        ClientMessage::CheckItem { index, .. } => Some(PlayerRequest::CheckItem { index }),
        ClientMessage::SendChatMessage { message, .. } => Some(PlayerRequest::SendChat {
            message,
            tts: false,
        }),
        ClientMessage::Join { .. } | ClientMessage::RequestTts { .. } => None,
    }
}

/// Write one message straight to this socket (pre-join errors, room_full).
async fn send_direct(
    ws_tx: &mut (impl Sink<Message> + Unpin),
    message: &ServerMessage,
) -> Result<(), ()> {
    ws_tx
        .send(Message::Text(encode(message)))
        .await
        .map_err(|_| ())
}
