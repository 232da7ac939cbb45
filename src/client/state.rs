use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::board::models::{BoardView, Column, Task};

/// One column with its tasks in persisted order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub column: Column,
    pub tasks: Vec<Task>,
}

/// The client's picture of a board: columns in board order, each with its
/// unfiltered task list. Cloning a layout is how snapshots are taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardLayout {
    pub columns: Vec<ColumnLayout>,
}

impl BoardLayout {
    pub fn from_view(view: BoardView) -> Self {
        let mut columns: Vec<ColumnLayout> = view
            .columns
            .into_iter()
            .map(|c| {
                let mut tasks = c.tasks;
                tasks.sort_by_key(|t| t.position);
                ColumnLayout {
                    column: c.column,
                    tasks,
                }
            })
            .collect();
        columns.sort_by_key(|c| c.column.position);
        Self { columns }
    }

    pub fn column(&self, column_id: i64) -> Option<&ColumnLayout> {
        self.columns.iter().find(|c| c.column.id == column_id)
    }

    pub fn column_index(&self, column_id: i64) -> Option<usize> {
        self.columns.iter().position(|c| c.column.id == column_id)
    }

    pub fn column_ids(&self) -> Vec<i64> {
        self.columns.iter().map(|c| c.column.id).collect()
    }

    /// Unfiltered task ids of a column, top to bottom.
    pub fn task_ids(&self, column_id: i64) -> Vec<i64> {
        self.column(column_id)
            .map(|c| c.tasks.iter().map(|t| t.id).collect())
            .unwrap_or_default()
    }
}

/// Identifies one optimistic update. Strictly increasing per `BoardState`.
pub type MutationSeq = u64;

/// Board State Container.
///
/// Holds the visible layout in a `watch` channel so every subscriber sees
/// each replacement. Pure bookkeeping: nothing here talks to the server.
pub struct BoardState {
    tx: watch::Sender<Arc<BoardLayout>>,
    seq: AtomicU64,
}

impl BoardState {
    pub fn new(layout: BoardLayout) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(layout));
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    /// The layout currently on screen.
    pub fn current(&self) -> Arc<BoardLayout> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardLayout>> {
        self.tx.subscribe()
    }

    /// Sequence number of the most recent optimistic update or reset.
    pub fn latest_seq(&self) -> MutationSeq {
        self.seq.load(Ordering::SeqCst)
    }

    /// Swap in `layout` immediately and return the sequence number that
    /// identifies this update.
    pub fn apply_optimistic(&self, layout: BoardLayout) -> MutationSeq {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(Arc::new(layout));
        tracing::trace!(seq, "optimistic layout applied");
        seq
    }

    /// Restore `snapshot` verbatim, whatever happened since it was taken.
    pub fn rollback(&self, snapshot: Arc<BoardLayout>) {
        self.tx.send_replace(snapshot);
    }

    /// Restore `snapshot` only if `seq` is still the latest update.
    /// Returns `false` when a newer update has superseded it.
    pub fn rollback_if_current(&self, snapshot: Arc<BoardLayout>, seq: MutationSeq) -> bool {
        self.tx.send_if_modified(|layout| {
            if self.seq.load(Ordering::SeqCst) == seq {
                *layout = snapshot;
                true
            } else {
                false
            }
        })
    }

    /// Replace the layout with freshly fetched server state. Counts as a new
    /// update, so older in-flight mutations become superseded.
    pub fn reset(&self, layout: BoardLayout) -> MutationSeq {
        self.apply_optimistic(layout)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::board::models::Priority;

    pub fn column(id: i64, name: &str, position: i32) -> Column {
        Column {
            id,
            board_id: 1,
            name: name.to_string(),
            position,
            deleted_at: None,
        }
    }

    pub fn task(id: i64, column_id: i64, name: &str, position: i32) -> Task {
        Task {
            id,
            board_id: 1,
            column_id: Some(column_id),
            name: name.to_string(),
            task_number: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            due_date: None,
            created_by: "u1@example.com".to_string(),
            created_by_name: "Uma".to_string(),
            assignees: vec![],
            tags: vec![],
            private: false,
            position,
            deleted_at: None,
            created_at: "2026-01-01 00:00:00".to_string(),
            updated_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    /// Build a layout from `(column_id, name, [(task_id, task_name)])`.
    pub fn layout(spec: &[(i64, &str, &[(i64, &str)])]) -> BoardLayout {
        BoardLayout {
            columns: spec
                .iter()
                .enumerate()
                .map(|(ci, (id, name, tasks))| ColumnLayout {
                    column: column(*id, name, ci as i32),
                    tasks: tasks
                        .iter()
                        .enumerate()
                        .map(|(ti, (tid, tname))| task(*tid, *id, tname, ti as i32))
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn names(layout: &BoardLayout, column_id: i64) -> Vec<String> {
        layout
            .column(column_id)
            .map(|c| c.tasks.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn orders(layout: &BoardLayout, column_id: i64) -> Vec<i32> {
        layout
            .column(column_id)
            .map(|c| c.tasks.iter().map(|t| t.position).collect())
            .unwrap_or_default()
    }
}
