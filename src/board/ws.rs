use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::api::SharedState;
use super::models::*;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    BoardCreated {
        board: Board,
    },
    BoardUpdated {
        board: Board,
    },

    // Columns
    ColumnCreated {
        column: Column,
    },
    ColumnUpdated {
        column: Column,
    },
    ColumnDeleted {
        board_id: i64,
        column_id: i64,
    },
    ColumnReordered {
        board_id: i64,
        column_id: i64,
        position: i32,
    },

    // Tasks
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TaskDeleted {
        board_id: i64,
        task_id: i64,
    },
    TaskMoved {
        board_id: i64,
        task_id: i64,
        from_column: Option<i64>,
        to_column: i64,
        position: i32,
    },
    TasksReordered {
        board_id: i64,
        column_id: i64,
        task_ids: Vec<i64>,
    },
    /// A task left `from_board`; `task.board_id` is where it landed.
    TaskTransferred {
        task: Task,
        from_board: i64,
        from_column: Option<i64>,
    },

    // Board metadata
    TagCreated {
        tag: TaskTag,
    },
    ViewCreated {
        view: SavedView,
    },
    ViewUpdated {
        view: SavedView,
    },
    ViewDeleted {
        board_id: i64,
        view_id: i64,
    },

    /// Sent after every mutation: cached views of this board must be refetched.
    BoardStale {
        board_id: i64,
    },
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let events = state.ws_tx.subscribe();
    ws.on_upgrade(move |socket| async move {
        tracing::debug!("websocket client connected");
        let (outbound, inbound) = socket.split();
        run_socket_loop(outbound, inbound, events).await;
        tracing::debug!("websocket client disconnected");
    })
}

/// Pong bookkeeping for one connection.
struct Liveness {
    last_pong: Instant,
    ping_outstanding: bool,
}

impl Liveness {
    fn new() -> Self {
        Self {
            last_pong: Instant::now(),
            ping_outstanding: false,
        }
    }

    /// A ping is due; false when the previous one went unanswered too long.
    fn ping_sent(&mut self) -> bool {
        if self.ping_outstanding && self.last_pong.elapsed() > PONG_TIMEOUT {
            return false;
        }
        self.ping_outstanding = true;
        true
    }

    fn pong_received(&mut self) {
        self.last_pong = Instant::now();
        self.ping_outstanding = false;
    }
}

/// Forward board events to the client until it leaves, errors, or stops
/// answering pings.
async fn run_socket_loop(
    mut outbound: SplitSink<WebSocket, Message>,
    mut inbound: SplitStream<WebSocket>,
    mut events: broadcast::Receiver<String>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    let mut liveness = Liveness::new();

    loop {
        let outgoing = tokio::select! {
            _ = ticker.tick() => {
                if !liveness.ping_sent() {
                    tracing::debug!("websocket pong timeout");
                    break;
                }
                Message::Ping(Default::default())
            }
            event = events.recv() => match event {
                Ok(json) => Message::Text(json.into()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket client lagged behind broadcast");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = inbound.next() => match frame {
                Some(Ok(Message::Pong(_))) => {
                    liveness.pong_received();
                    continue;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };

        if outbound.send(outgoing).await.is_err() {
            break;
        }
    }

    let _ = outbound.send(Message::Close(None)).await;
}

// ── Broadcast helpers ────────────────────────────────────────────────

/// Push `msg` to every connected client. A send with no subscribers is
/// not an error.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize WsMessage");
        }
    }
}

/// Broadcast an event followed by the staleness signal for its board.
pub fn broadcast_board_change(tx: &broadcast::Sender<String>, board_id: i64, msg: &WsMessage) {
    broadcast_message(tx, msg);
    broadcast_message(tx, &WsMessage::BoardStale { board_id });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_moved_serialization() {
        let msg = WsMessage::TaskMoved {
            board_id: 1,
            task_id: 5,
            from_column: Some(2),
            to_column: 3,
            position: 0,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"TaskMoved\""));
        assert!(json.contains("\"task_id\":5"));
        assert!(json.contains("\"from_column\":2"));
        assert!(json.contains("\"to_column\":3"));
    }

    #[test]
    fn test_board_stale_roundtrip() {
        let msg = WsMessage::BoardStale { board_id: 9 };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "BoardStale");
        assert_eq!(parsed["data"]["board_id"], 9);
        let back: WsMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_tasks_reordered_serialization() {
        let msg = WsMessage::TasksReordered {
            board_id: 1,
            column_id: 4,
            task_ids: vec![3, 1, 2],
        };
        let parsed = serde_json::to_value(&msg).unwrap();
        assert_eq!(parsed["data"]["task_ids"], serde_json::json!([3, 1, 2]));
    }

    #[tokio::test]
    async fn test_board_change_is_followed_by_stale_signal() {
        let (tx, _) = broadcast::channel::<String>(16);
        let mut rx = tx.subscribe();

        broadcast_board_change(
            &tx,
            7,
            &WsMessage::ColumnDeleted {
                board_id: 7,
                column_id: 2,
            },
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains("ColumnDeleted"));
        let stale: WsMessage = serde_json::from_str(&second).unwrap();
        assert_eq!(stale, WsMessage::BoardStale { board_id: 7 });
    }

    #[tokio::test]
    async fn test_broadcast_no_receivers_does_not_panic() {
        let (tx, _) = broadcast::channel::<String>(16);
        broadcast_message(&tx, &WsMessage::BoardStale { board_id: 1 });
    }

    #[test]
    fn test_keepalive_constants() {
        assert!(PONG_TIMEOUT > PING_INTERVAL);
        assert_eq!(PING_INTERVAL, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_liveness_tolerates_recent_unanswered_ping() {
        let mut liveness = Liveness::new();
        assert!(liveness.ping_sent());
        assert!(liveness.ping_outstanding);
        // Still inside PONG_TIMEOUT, so a second ping goes out.
        assert!(liveness.ping_sent());
        liveness.pong_received();
        assert!(!liveness.ping_outstanding);
    }

    #[tokio::test]
    async fn test_liveness_gives_up_after_timeout() {
        let mut liveness = Liveness::new();
        liveness.ping_outstanding = true;
        liveness.last_pong = Instant::now() - (PONG_TIMEOUT + Duration::from_secs(1));
        assert!(!liveness.ping_sent());
    }
}
