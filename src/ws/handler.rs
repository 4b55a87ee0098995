//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{RoomCommand, RoomHandle, RoomUser};
use crate::http::routes::AppError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg, Team};

const MAX_NICKNAME_CHARS: usize = 24;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Uuid,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub team: Option<Team>,
}

impl WsQuery {
    /// The connecting user, with a generated nickname if none was given
    fn into_user(self) -> Result<RoomUser, AppError> {
        let id = Uuid::new_v4();
        let nickname = match self.nickname.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Player_{}", &id.to_string()[..8]),
        };
        if nickname.chars().count() > MAX_NICKNAME_CHARS {
            return Err(AppError::BadRequest(format!(
                "nickname longer than {MAX_NICKNAME_CHARS} characters"
            )));
        }
        Ok(RoomUser {
            id,
            nickname,
            avatar: self.avatar.unwrap_or_default(),
            team: self.team.unwrap_or_default(),
        })
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let room = state
        .rooms
        .get(&query.room)
        .ok_or_else(|| AppError::NotFound(format!("room {}", query.room)))?;
    let user = query.into_user()?;

    info!(room_id = %room.id, user_id = %user.id, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, room)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, user: RoomUser, room: RoomHandle) {
    let user_id = user.id;
    info!(room_id = %room.id, user_id = %user_id, nickname = %user.nickname, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe first so nothing sent after the join is missed
    let room_rx = room.subscribe();

    let (reply, snapshot_rx) = oneshot::channel();
    if room
        .command_tx
        .send(RoomCommand::Join { user, reply })
        .await
        .is_err()
    {
        warn!(room_id = %room.id, user_id = %user_id, "Room closed before join");
        let _ = send_msg(
            &mut ws_sink,
            &ServerMsg::Error {
                code: "room_closed".to_string(),
                message: "Room is no longer running".to_string(),
            },
        )
        .await;
        return;
    }
    let Ok(snapshot) = snapshot_rx.await else {
        warn!(room_id = %room.id, user_id = %user_id, "Room dropped join request");
        return;
    };

    let welcome = ServerMsg::Welcome {
        user_id,
        room_id: room.id,
        server_time: unix_millis(),
    };
    for msg in [welcome, ServerMsg::Snapshot(snapshot)] {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            error!(user_id = %user_id, error = %e, "Failed to send welcome");
            let _ = room.command_tx.send(RoomCommand::Leave { id: user_id }).await;
            return;
        }
    }

    run_session(user_id, &room, ws_sink, ws_stream, room_rx).await;

    // Cleanup on disconnect
    let _ = room.command_tx.send(RoomCommand::Leave { id: user_id }).await;

    info!(room_id = %room.id, user_id = %user_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    user_id: Uuid,
    room: &RoomHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut room_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    // Replies meant for this connection only
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(16);
    let command_tx = room.command_tx.clone();

    // Spawn writer task: room broadcast and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                broadcast = next_broadcast(user_id, &mut room_rx, &command_tx) => match broadcast {
                    Some(msg) => msg,
                    None => break,
                },
            };
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(user_id = %user_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> room loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(user_id = %user_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Keys { keys }) => {
                        let command = RoomCommand::Keys {
                            id: user_id,
                            delta: keys,
                        };
                        if room.command_tx.send(command).await.is_err() {
                            debug!(user_id = %user_id, "Room command channel closed");
                            break;
                        }
                    }
                    Ok(ClientMsg::Ping { t }) => {
                        let _ = direct_tx.send(ServerMsg::Pong { t }).await;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Next message from the room. A lagged receiver has missed diffs, so it
/// gets a fresh snapshot instead. `None` once the room is gone.
async fn next_broadcast(
    user_id: Uuid,
    room_rx: &mut broadcast::Receiver<ServerMsg>,
    command_tx: &mpsc::Sender<RoomCommand>,
) -> Option<ServerMsg> {
    match room_rx.recv().await {
        Ok(msg) => Some(msg),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            warn!(user_id = %user_id, lagged_count = n, "Client lagged, resyncing");
            let (reply, snapshot) = oneshot::channel();
            command_tx.send(RoomCommand::Resync { reply }).await.ok()?;
            snapshot.await.ok().map(ServerMsg::Snapshot)
        }
        Err(broadcast::error::RecvError::Closed) => {
            debug!(user_id = %user_id, "Room channel closed");
            None
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec2;
    use crate::ws::protocol::{PowerupState, RoomSnapshot};

    fn query(nickname: Option<&str>) -> WsQuery {
        WsQuery {
            room: Uuid::new_v4(),
            nickname: nickname.map(str::to_string),
            avatar: None,
            team: None,
        }
    }

    #[tokio::test]
    async fn lagged_client_gets_snapshot() {
        let (tx, mut rx) = broadcast::channel(1);
        let (command_tx, mut command_rx) = mpsc::channel(4);
        for t in 0..3 {
            tx.send(ServerMsg::Pong { t }).unwrap();
        }

        let room = tokio::spawn(async move {
            match command_rx.recv().await {
                Some(RoomCommand::Resync { reply }) => {
                    let _ = reply.send(RoomSnapshot {
                        players: Vec::new(),
                        ball: Vec2::new(1.0, 2.0),
                        powerup: PowerupState {
                            position: Vec2::ZERO,
                            kind: None,
                        },
                    });
                }
                other => panic!("expected resync, got {other:?}"),
            }
        });

        let msg = next_broadcast(Uuid::new_v4(), &mut rx, &command_tx).await;
        let Some(ServerMsg::Snapshot(snapshot)) = msg else {
            panic!("expected snapshot, got {msg:?}");
        };
        assert_eq!(snapshot.ball, Vec2::new(1.0, 2.0));
        room.await.unwrap();

        // back in step with the channel afterwards
        assert!(matches!(
            next_broadcast(Uuid::new_v4(), &mut rx, &command_tx).await,
            Some(ServerMsg::Pong { t: 2 })
        ));
    }

    #[tokio::test]
    async fn closed_room_ends_stream() {
        let (tx, mut rx) = broadcast::channel::<ServerMsg>(4);
        let (command_tx, _command_rx) = mpsc::channel(1);
        drop(tx);
        assert!(next_broadcast(Uuid::new_v4(), &mut rx, &command_tx).await.is_none());
    }

    #[test]
    fn blank_nickname_gets_generated() {
        let user = query(Some("   ")).into_user().unwrap();
        assert!(user.nickname.starts_with("Player_"));
        assert_eq!(user.team, Team::Spectator);
    }

    #[test]
    fn long_nickname_is_rejected() {
        let long = "x".repeat(MAX_NICKNAME_CHARS + 1);
        assert!(matches!(
            query(Some(&long)).into_user(),
            Err(AppError::BadRequest(_))
        ));
    }
}
