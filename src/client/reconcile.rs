//! Reconciliation Layer.
//!
//! Every drag goes through the same steps:
//!
//! 1. snapshot the visible layout
//! 2. apply the planned layout optimistically
//! 3. fire the matching remote mutation
//! 4. on success, keep the optimistic layout
//! 5. on failure, restore the snapshot and raise one error toast
//!
//! There is no retry and no replay. When drags overlap, completions may
//! arrive out of order. Under [`RollbackPolicy::Always`] a late failure
//! restores its own snapshot even if a newer drag has been applied since,
//! discarding that newer layout. [`RollbackPolicy::SkipIfSuperseded`] keeps
//! the newer layout in that case and only raises the toast.

use std::sync::Arc;

use futures::future::join_all;

use super::drag::{self, BoardMutation, DragEnd};
use super::remote::BoardRemote;
use super::state::BoardState;
use super::toast::Toaster;
use super::view::ViewParams;
use crate::errors::RemoteError;

pub const COLUMN_ORDER_FAILED: &str = "Failed to update order. Please try again.";
pub const TASK_REORDER_FAILED: &str = "Failed to reorder tasks. Please try again.";
pub const TASK_MOVE_FAILED: &str = "Failed to move task. Please try again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RollbackPolicy {
    /// Restore the pre-drag snapshot on every failure.
    #[default]
    Always,
    /// Restore only if no later update has been applied since this drag.
    SkipIfSuperseded,
}

/// How a drag ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No-op drop; nothing applied, nothing sent.
    Ignored,
    /// The server accepted the mutation; the optimistic layout stands.
    Confirmed,
    /// The server refused; the pre-drag layout is back on screen.
    RolledBack,
    /// The server refused, but a newer update was kept instead of rolling back.
    Superseded,
}

pub struct Reconciler {
    state: Arc<BoardState>,
    remote: Arc<dyn BoardRemote>,
    toaster: Arc<dyn Toaster>,
    policy: RollbackPolicy,
}

impl Reconciler {
    pub fn new(
        state: Arc<BoardState>,
        remote: Arc<dyn BoardRemote>,
        toaster: Arc<dyn Toaster>,
    ) -> Self {
        Self {
            state,
            remote,
            toaster,
            policy: RollbackPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RollbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &Arc<BoardState> {
        &self.state
    }

    pub async fn handle_drag(&self, event: &DragEnd, params: &ViewParams) -> Resolution {
        let snapshot = self.state.current();
        let Some(plan) = drag::plan(&snapshot, params, event) else {
            return Resolution::Ignored;
        };

        let seq = self.state.apply_optimistic(plan.layout);
        match self.execute(&plan.mutation).await {
            Ok(()) => {
                tracing::debug!(seq, "board mutation confirmed");
                Resolution::Confirmed
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "board mutation failed");
                self.toaster.error(failure_message(&plan.mutation));
                match self.policy {
                    RollbackPolicy::Always => {
                        self.state.rollback(snapshot);
                        Resolution::RolledBack
                    }
                    RollbackPolicy::SkipIfSuperseded => {
                        if self.state.rollback_if_current(snapshot, seq) {
                            Resolution::RolledBack
                        } else {
                            tracing::info!(seq, "failed mutation superseded, keeping newer layout");
                            Resolution::Superseded
                        }
                    }
                }
            }
        }
    }

    async fn execute(&self, mutation: &BoardMutation) -> Result<(), RemoteError> {
        match mutation {
            BoardMutation::SetColumnOrders(orders) => {
                let calls = orders
                    .iter()
                    .map(|o| self.remote.set_column_order(o.column_id, o.order));
                join_all(calls).await.into_iter().collect()
            }
            BoardMutation::ReorderTasks {
                column_id,
                task_ids,
            } => self.remote.reorder_tasks(*column_id, task_ids).await,
            BoardMutation::MoveTask {
                task_id,
                column_id,
                position,
            } => {
                self.remote
                    .move_task(*task_id, *column_id, *position)
                    .await
            }
        }
    }
}

fn failure_message(mutation: &BoardMutation) -> &'static str {
    match mutation {
        BoardMutation::SetColumnOrders(_) => COLUMN_ORDER_FAILED,
        BoardMutation::ReorderTasks { .. } => TASK_REORDER_FAILED,
        BoardMutation::MoveTask { .. } => TASK_MOVE_FAILED,
    }
}
