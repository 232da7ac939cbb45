//! Board service: HTTP + WebSocket back-end over SQLite.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │ (engine) │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│         │                                        │
//!                       │         │ DbHandle::call()                       │
//!                       │         v                                        │
//!                       │  db.rs  (BoardDb, transactional renumbering)     │
//!                       │         │                                        │
//!                       │         │ on success                             │
//!                       │         v                                        │
//!                       │  cache.rs (invalidate)  ws.rs (event + stale)    │
//!                       │  notify.rs (new assignees, spawned)              │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! | Module    | Responsibility                                              |
//! |-----------|-------------------------------------------------------------|
//! | `models`  | `Board`, `Column`, `Task`, filters, saved views             |
//! | `db`      | SQLite access via `DbHandle` (`Arc<Mutex<_>>` + blocking)   |
//! | `outcome` | `{success, data}` / `{success, error}` response schema      |
//! | `cache`   | Per-board view cache, dropped after each mutation           |
//! | `ws`      | `WsMessage` enum + broadcast helpers                        |
//! | `notify`  | `Notifier` trait, log and webhook delivery                  |
//!
//! ## Typical Request Flow (drag a card to another column)
//!
//! 1. `POST /api/tasks/{id}/move` → `api::move_task()`
//! 2. `BoardDb::move_task` removes the task from its column, inserts it at
//!    the requested slot and renumbers both columns in one transaction.
//! 3. The cached view for the board is dropped and `TaskMoved` followed by
//!    `BoardStale` is broadcast to WebSocket subscribers.
//! 4. The handler answers `{"success": true, "data": task}`; any error
//!    becomes `{"success": false, "error": ...}` with a 4xx/5xx status.

pub mod api;
pub mod cache;
pub mod db;
pub mod models;
pub mod notify;
pub mod outcome;
pub mod server;
pub mod ws;
