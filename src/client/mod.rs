//! Client-side board engine.
//!
//! Keeps a local copy of a board, turns drag-and-drop gestures into
//! optimistic layout changes and reconciles them with the board service.
//!
//! ```text
//! DragEnd ──► drag::plan ──► BoardState::apply_optimistic ──► subscribers
//!                 │
//!                 └──► BoardRemote (HTTP) ──ok──► keep
//!                                        └─err─► rollback + toast
//! ```
//!
//! | Module      | Role                                                |
//! |-------------|-----------------------------------------------------|
//! | `state`     | Current layout behind a `watch` channel             |
//! | `view`      | Filter and sort projection used for drag indices    |
//! | `drag`      | Pure planner: event + layout → new layout + request |
//! | `remote`    | Mutation endpoints, HTTP implementation             |
//! | `reconcile` | Optimistic apply, remote call, rollback on failure  |
//! | `toast`     | Error notification sinks                            |

pub mod drag;
pub mod reconcile;
pub mod remote;
pub mod state;
pub mod toast;
pub mod view;
