//! Drag Interaction Handler.
//!
//! Turns a drag-end event into the next layout plus the one server mutation
//! that persists it. Indices in events refer to what the user sees, i.e. the
//! filtered/sorted projection of each column.

use serde::{Deserialize, Serialize};

use crate::board::models::Task;

use super::state::{BoardLayout, ColumnLayout};
use super::view::{ViewParams, visible_tasks};

/// A drop position: a column and an index in its visible task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub column_id: i64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DragEnd {
    /// A whole column was dragged along the board.
    Column {
        column_id: i64,
        source_index: usize,
        /// `None` when dropped outside the board.
        destination: Option<usize>,
    },
    /// A task card was dragged within or between columns.
    Task {
        task_id: i64,
        source: DropTarget,
        /// `None` when dropped outside any column.
        destination: Option<DropTarget>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOrder {
    pub column_id: i64,
    pub order: i32,
}

/// The remote call that persists a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardMutation {
    /// One `set_column_order` call per column.
    SetColumnOrders(Vec<ColumnOrder>),
    /// Full id list of one column in its new order.
    ReorderTasks { column_id: i64, task_ids: Vec<i64> },
    /// `position` is the unfiltered index in the destination column.
    MoveTask {
        task_id: i64,
        column_id: i64,
        position: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragPlan {
    pub layout: BoardLayout,
    pub mutation: BoardMutation,
}

/// Compute the layout after `event`. Returns `None` for no-op drops
/// (outside any target, or back onto the starting slot) and for events
/// that reference columns or tasks the layout does not contain.
pub fn plan(layout: &BoardLayout, params: &ViewParams, event: &DragEnd) -> Option<DragPlan> {
    match event {
        DragEnd::Column {
            column_id,
            source_index,
            destination,
        } => {
            let dest = (*destination)?;
            if dest == *source_index {
                return None;
            }
            plan_column_reorder(layout, *column_id, dest)
        }
        DragEnd::Task {
            task_id,
            source,
            destination,
        } => {
            let dest = (*destination)?;
            if dest == *source {
                return None;
            }
            if dest.column_id == source.column_id {
                plan_reorder_within(layout, params, *task_id, dest)
            } else {
                plan_move_across(layout, params, *task_id, source.column_id, dest)
            }
        }
    }
}

fn plan_column_reorder(layout: &BoardLayout, column_id: i64, dest: usize) -> Option<DragPlan> {
    let from = layout.column_index(column_id)?;
    // `from` exists, so the board has at least one column.
    let to = dest.min(layout.columns.len() - 1);
    if to == from {
        return None;
    }

    let mut next = layout.clone();
    let moved = next.columns.remove(from);
    next.columns.insert(to, moved);

    let mut orders = Vec::with_capacity(next.columns.len());
    for (index, c) in next.columns.iter_mut().enumerate() {
        c.column.position = index as i32;
        orders.push(ColumnOrder {
            column_id: c.column.id,
            order: index as i32,
        });
    }

    Some(DragPlan {
        layout: next,
        mutation: BoardMutation::SetColumnOrders(orders),
    })
}

fn plan_reorder_within(
    layout: &BoardLayout,
    params: &ViewParams,
    task_id: i64,
    dest: DropTarget,
) -> Option<DragPlan> {
    let mut next = layout.clone();
    let ci = next.column_index(dest.column_id)?;
    let column = &mut next.columns[ci];

    let from = column.tasks.iter().position(|t| t.id == task_id)?;
    let moved = column.tasks.remove(from);
    let anchor = anchor_id(column, params, dest.index);
    insert_before(&mut column.tasks, moved, anchor);
    renumber(column);

    let task_ids = column.tasks.iter().map(|t| t.id).collect();
    Some(DragPlan {
        layout: next,
        mutation: BoardMutation::ReorderTasks {
            column_id: dest.column_id,
            task_ids,
        },
    })
}

fn plan_move_across(
    layout: &BoardLayout,
    params: &ViewParams,
    task_id: i64,
    source_column: i64,
    dest: DropTarget,
) -> Option<DragPlan> {
    let mut next = layout.clone();
    let si = next.column_index(source_column)?;
    let di = next.column_index(dest.column_id)?;

    let source = &mut next.columns[si];
    let from = source.tasks.iter().position(|t| t.id == task_id)?;
    let mut moved = source.tasks.remove(from);
    renumber(source);

    let destination = &mut next.columns[di];
    moved.column_id = Some(dest.column_id);
    let anchor = anchor_id(destination, params, dest.index);
    let position = insert_before(&mut destination.tasks, moved, anchor);
    renumber(destination);

    Some(DragPlan {
        layout: next,
        mutation: BoardMutation::MoveTask {
            task_id,
            column_id: dest.column_id,
            position: position as i32,
        },
    })
}

/// The task the dropped card should land in front of: whatever currently
/// sits at `index` in the column's visible list.
fn anchor_id(column: &ColumnLayout, params: &ViewParams, index: usize) -> Option<i64> {
    visible_tasks(&column.tasks, params)
        .get(index)
        .map(|t| t.id)
}

/// Insert `task` before the anchor, or at the end when there is no anchor or
/// it is no longer in the list. Returns the index used.
fn insert_before(tasks: &mut Vec<Task>, task: Task, anchor: Option<i64>) -> usize {
    let slot = anchor
        .and_then(|id| tasks.iter().position(|t| t.id == id))
        .unwrap_or(tasks.len());
    tasks.insert(slot, task);
    slot
}

fn renumber(column: &mut ColumnLayout) {
    for (index, task) in column.tasks.iter_mut().enumerate() {
        task.position = index as i32;
    }
}
