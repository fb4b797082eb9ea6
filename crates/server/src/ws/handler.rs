//! WebSocket handler for Axum
//!
//! Handles WebSocket connections, authentication, and event routing.
//! Authentication happens before the upgrade: a rejected credential
//! terminates the connection with no broadcast and no observable state.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{messages, state::AppState};

use super::{
    connection::Connection,
    events::{ClientEvent, ClientRequest, ServerEvent},
    state::HubState,
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: String,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
///
/// Authenticates via query parameter token; the handshake carries the
/// bearer credential out-of-band of the protocol itself.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let claims = match app_state.jwt.validate_token(&params.token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = ?e, "WebSocket auth failed: invalid token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // Verify the user still exists; the username in the database is canonical
    let username = match sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&app_state.pool)
        .await
    {
        Ok(Some(username)) => username,
        Ok(None) => {
            tracing::warn!(user_id = %claims.sub, "WebSocket auth failed: user not found");
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(e) => {
            tracing::error!(error = ?e, "WebSocket auth: database error");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let user_id = claims.sub;
    tracing::info!(user_id = %user_id, username = %username, "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, username, app_state)))
}

/// Handle an individual authenticated WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, username: String, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Channel for events destined to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = Connection::new(user_id, username.clone(), tx);
    let hub = app_state.hub.clone();
    let conn = hub.add_connection(conn).await;
    let connection_id = conn.connection_id;

    // Register presence before the join broadcast so the snapshot includes us
    hub.presence.register(connection_id, user_id, &username).await;

    let _ = conn.send(ServerEvent::Connected { connection_id });

    // Everyone, the newcomer included, sees the join with the fresh snapshot
    hub.broadcast(ServerEvent::UserJoined {
        username: username.clone(),
        connected_users: hub.presence.snapshot().await,
    })
    .await;

    // Writer task: drains the outbound queue. A recipient that stalls its
    // socket write beyond the configured timeout is treated as disconnected,
    // so one slow client cannot hold up anyone else's queue.
    let send_timeout = Duration::from_millis(app_state.config.ws_send_timeout_ms);
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    match tokio::time::timeout(send_timeout, sender.send(Message::Text(json))).await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => break, // Connection closed
                        Err(_) => {
                            tracing::warn!(
                                connection_id = %connection_id,
                                "WebSocket send timed out; treating connection as dead"
                            );
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Inbound loop: events from this connection are processed sequentially,
    // concurrently with other connections' events and timer expirations.
    while let Some(msg) = receiver.next().await {
        if let Ok(msg) = msg {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientRequest>(&text) {
                    Ok(request) => {
                        handle_client_event(request, Arc::clone(&conn), &hub, &app_state).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = ?e,
                            message = %text,
                            "Failed to parse client event"
                        );
                        let _ = conn.send(ServerEvent::error(None, "Invalid event format"));
                    }
                },
                Message::Close(_) => {
                    tracing::info!(connection_id = %connection_id, "WebSocket close frame received");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                _ => {} // Ignore binary messages
            }
        }
    }

    // Cleanup on disconnect. The typing entry is cleared without a stop
    // broadcast; a timer already in flight posts a stale command and no-ops.
    tracing::info!(connection_id = %connection_id, user_id = %user_id, "WebSocket connection closing");
    hub.remove_connection(connection_id).await;
    hub.typing.clear_connection(user_id, connection_id).await;

    if let Some(left_username) = hub.presence.unregister(connection_id).await {
        hub.broadcast(ServerEvent::UserLeft {
            username: left_username,
            connected_users: hub.presence.snapshot().await,
        })
        .await;
    }

    send_task.abort();
}

/// Route a client event to the message service or typing tracker
async fn handle_client_event(
    request: ClientRequest,
    conn: Arc<Connection>,
    hub: &HubState,
    app_state: &AppState,
) {
    let seq = request.seq;

    match request.event {
        ClientEvent::SendMessage { content, reply_to_id } => {
            let created = messages::create(
                &app_state.pool,
                conn.user_id,
                &conn.username,
                &content,
                reply_to_id,
            )
            .await;

            match created {
                Ok(view) => {
                    // A sent message implies the sender stopped typing; the
                    // message broadcast itself signals the activity, so no
                    // separate stop event is emitted.
                    hub.typing
                        .clear_connection(conn.user_id, conn.connection_id)
                        .await;

                    hub.broadcast(ServerEvent::NewMessage(view)).await;
                    let _ = conn.send(ServerEvent::ack(seq));
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn.connection_id,
                        error = %e,
                        "Message rejected"
                    );
                    let _ = conn.send(ServerEvent::error(seq, e.to_string()));
                }
            }
        }

        ClientEvent::Typing { is_typing } => {
            if is_typing {
                hub.typing
                    .start(conn.user_id, conn.connection_id, &conn.username)
                    .await;
            } else {
                hub.typing.stop(conn.user_id).await;
            }

            // The originator already knows its own typing state
            hub.broadcast_except(
                conn.connection_id,
                ServerEvent::UserTyping {
                    user_id: conn.user_id,
                    username: conn.username.clone(),
                    is_typing,
                },
            )
            .await;

            let _ = conn.send(ServerEvent::ack(seq));
        }

        ClientEvent::MarkAsRead { message_id } => {
            match messages::mark_read(&app_state.pool, message_id, conn.user_id).await {
                Ok(Some(read_by)) => {
                    hub.broadcast(ServerEvent::MessageRead {
                        message_id,
                        user_id: conn.user_id,
                        read_by,
                    })
                    .await;
                    let _ = conn.send(ServerEvent::ack(seq));
                }
                Ok(None) => {
                    let _ = conn.send(ServerEvent::error(seq, "Message not found"));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to mark message as read");
                    let _ = conn.send(ServerEvent::error(seq, "Failed to mark message as read"));
                }
            }
        }

        ClientEvent::GetMessages => {
            match messages::list_recent(&app_state.pool, app_state.config.message_history_limit)
                .await
            {
                Ok(messages) => {
                    let _ = conn.send(ServerEvent::MessageHistory { seq, messages });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to fetch message history");
                    let _ = conn.send(ServerEvent::error(seq, "Failed to fetch messages"));
                }
            }
        }
    }
}
