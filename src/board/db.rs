use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use super::models::*;
use crate::errors::BoardError;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| BoardError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, BoardDb>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::Error::from(BoardError::LockPoisoned))
    }
}

pub struct BoardDb {
    conn: Connection,
}

const TASK_COLUMNS: &str = "id, board_id, column_id, name, task_number, description, priority, due_date, created_by, created_by_name, private, position, deleted_at, created_at, updated_at";

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    private INTEGER NOT NULL DEFAULT 0,
                    created_by TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS columns (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0,
                    deleted_at TEXT
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    column_id INTEGER REFERENCES columns(id) ON DELETE SET NULL,
                    name TEXT NOT NULL,
                    task_number TEXT NOT NULL DEFAULT '',
                    description TEXT NOT NULL DEFAULT '',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    due_date TEXT,
                    created_by TEXT NOT NULL DEFAULT '',
                    created_by_name TEXT NOT NULL DEFAULT '',
                    private INTEGER NOT NULL DEFAULT 0,
                    position INTEGER NOT NULL DEFAULT 0,
                    deleted_at TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS task_assignees (
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL,
                    PRIMARY KEY (task_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    color TEXT NOT NULL DEFAULT 'gray'
                );

                CREATE TABLE IF NOT EXISTS task_tags (
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (task_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS saved_views (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    filters TEXT NOT NULL DEFAULT '[]',
                    sort TEXT,
                    created_by TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_columns_board ON columns(board_id, position);
                CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id, position);
                CREATE INDEX IF NOT EXISTS idx_tags_board ON tags(board_id);
                CREATE INDEX IF NOT EXISTS idx_saved_views_board ON saved_views(board_id);
                ",
            )
            .context("Failed to create tables")?;

        // Additive migrations for databases created before the column existed.
        match self.conn.execute(
            "ALTER TABLE tasks ADD COLUMN created_by_name TEXT NOT NULL DEFAULT ''",
            [],
        ) {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to add created_by_name column: {}", e)),
        }
        Ok(())
    }

    // ── Board CRUD ────────────────────────────────────────────────────

    pub fn create_board(&self, name: &str, private: bool, created_by: &str) -> Result<Board> {
        require_name(name, "Board")?;
        self.conn
            .execute(
                "INSERT INTO boards (name, private, created_by) VALUES (?1, ?2, ?3)",
                params![name.trim(), private, created_by],
            )
            .context("Failed to insert board")?;
        let id = self.conn.last_insert_rowid();
        self.get_board(id)?.context("Board not found after insert")
    }

    /// All boards, newest first.
    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, private, created_by, created_at FROM boards
                 ORDER BY created_at DESC, id DESC",
            )
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map([], board_from_row)
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?);
        }
        Ok(boards)
    }

    pub fn get_board(&self, id: i64) -> Result<Option<Board>> {
        self.conn
            .query_row(
                "SELECT id, name, private, created_by, created_at FROM boards WHERE id = ?1",
                params![id],
                board_from_row,
            )
            .optional()
            .context("Failed to query board")
    }

    fn require_board(&self, id: i64) -> Result<Board> {
        self.get_board(id)?
            .ok_or_else(|| BoardError::BoardNotFound { id }.into())
    }

    /// Rename a board or flip its visibility.
    pub fn update_board(&self, id: i64, patch: &BoardPatch) -> Result<Board> {
        self.require_board(id)?;
        if let Some(name) = &patch.name {
            require_name(name, "Board")?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &patch.name {
            tx.execute(
                "UPDATE boards SET name = ?1 WHERE id = ?2",
                params![name.trim(), id],
            )
            .context("Failed to rename board")?;
        }
        if let Some(private) = patch.private {
            tx.execute(
                "UPDATE boards SET private = ?1 WHERE id = ?2",
                params![private, id],
            )
            .context("Failed to update board visibility")?;
        }
        tx.commit().context("Failed to commit board update")?;

        self.get_board(id)?.context("Board not found after update")
    }

    // ── Column CRUD ───────────────────────────────────────────────────

    /// Append a column to the end of the board.
    pub fn create_column(&self, board_id: i64, name: &str) -> Result<Column> {
        require_name(name, "Column")?;
        self.require_board(board_id)?;
        let max_pos: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(position), -1) FROM columns WHERE board_id = ?1 AND deleted_at IS NULL",
                params![board_id],
                |row| row.get(0),
            )
            .context("Failed to get max column position")?;
        self.conn
            .execute(
                "INSERT INTO columns (board_id, name, position) VALUES (?1, ?2, ?3)",
                params![board_id, name.trim(), max_pos + 1],
            )
            .context("Failed to insert column")?;
        let id = self.conn.last_insert_rowid();
        self.get_column(id)?.context("Column not found after insert")
    }

    pub fn get_column(&self, id: i64) -> Result<Option<Column>> {
        self.conn
            .query_row(
                "SELECT id, board_id, name, position, deleted_at FROM columns WHERE id = ?1",
                params![id],
                column_from_row,
            )
            .optional()
            .context("Failed to query column")
    }

    fn require_live_column(&self, id: i64) -> Result<Column> {
        match self.get_column(id)? {
            Some(column) if column.deleted_at.is_none() => Ok(column),
            _ => Err(BoardError::ColumnNotFound { id }.into()),
        }
    }

    /// Live columns of a board in display order.
    pub fn list_columns(&self, board_id: i64) -> Result<Vec<Column>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, name, position, deleted_at FROM columns
                 WHERE board_id = ?1 AND deleted_at IS NULL ORDER BY position, id",
            )
            .context("Failed to prepare list_columns")?;
        let rows = stmt
            .query_map(params![board_id], column_from_row)
            .context("Failed to query columns")?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.context("Failed to read column row")?);
        }
        Ok(columns)
    }

    pub fn rename_column(&self, id: i64, name: &str) -> Result<Column> {
        require_name(name, "Column")?;
        self.require_live_column(id)?;
        self.conn
            .execute(
                "UPDATE columns SET name = ?1 WHERE id = ?2",
                params![name.trim(), id],
            )
            .context("Failed to rename column")?;
        self.get_column(id)?.context("Column not found after rename")
    }

    /// Soft-delete a column and close the gap it leaves in the board order.
    pub fn delete_column(&self, id: i64) -> Result<Column> {
        let column = self.require_live_column(id)?;

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE columns SET deleted_at = datetime('now') WHERE id = ?1",
            params![id],
        )
        .context("Failed to soft-delete column")?;
        renumber_columns(&tx, column.board_id)?;
        tx.commit().context("Failed to commit column delete")?;

        self.get_column(id)?.context("Column not found after delete")
    }

    /// Set one column's board position. Called once per column on reorder.
    pub fn set_column_order(&self, id: i64, position: i32) -> Result<Column> {
        if position < 0 {
            return Err(BoardError::Validation(format!(
                "Column order must be non-negative, got {}",
                position
            ))
            .into());
        }
        self.require_live_column(id)?;
        self.conn
            .execute(
                "UPDATE columns SET position = ?1 WHERE id = ?2",
                params![position, id],
            )
            .context("Failed to update column order")?;
        self.get_column(id)?.context("Column not found after reorder")
    }

    // ── Task CRUD ─────────────────────────────────────────────────────

    /// Insert a task at the top of its column, pushing every live task down.
    pub fn create_task(&self, column_id: i64, new: &NewTask) -> Result<Task> {
        require_name(&new.name, "Task")?;
        let column = self.require_live_column(column_id)?;
        self.require_tags_on_board(column.board_id, &new.tags)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE tasks SET position = position + 1 WHERE column_id = ?1 AND deleted_at IS NULL",
            params![column_id],
        )
        .context("Failed to shift column tasks")?;
        tx.execute(
            "INSERT INTO tasks (board_id, column_id, name, task_number, description, priority, due_date, created_by, created_by_name, private, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
            params![
                column.board_id,
                column_id,
                new.name.trim(),
                new.task_number,
                new.description,
                new.priority.as_str(),
                new.due_date.map(|d| d.to_string()),
                new.created_by,
                new.created_by_name,
                new.private,
            ],
        )
        .context("Failed to insert task")?;
        let id = tx.last_insert_rowid();
        replace_assignees(&tx, id, &new.assignees)?;
        replace_tags(&tx, id, &new.tags)?;
        tx.commit().context("Failed to commit task insert")?;

        self.get_task(id)?.context("Task not found after insert")
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], task_row_from_row)
            .optional()
            .context("Failed to query task")?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row.into_task()?)?)),
            None => Ok(None),
        }
    }

    fn require_live_task(&self, id: i64) -> Result<Task> {
        match self.get_task(id)? {
            Some(task) if task.deleted_at.is_none() => Ok(task),
            _ => Err(BoardError::TaskNotFound { id }.into()),
        }
    }

    /// Live tasks of a column in persisted order.
    pub fn list_tasks(&self, column_id: i64) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE column_id = ?1 AND deleted_at IS NULL ORDER BY position, id",
            TASK_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_tasks")?;
        let rows = stmt
            .query_map(params![column_id], task_row_from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            let r = row.context("Failed to read task row")?;
            tasks.push(self.hydrate(r.into_task()?)?);
        }
        Ok(tasks)
    }

    pub fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<TaskUpdate> {
        let existing = self.require_live_task(id)?;
        if let Some(name) = &patch.name {
            require_name(name, "Task")?;
        }
        if let Some(tags) = &patch.tags {
            self.require_tags_on_board(existing.board_id, tags)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        if let Some(name) = &patch.name {
            tx.execute(
                "UPDATE tasks SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name.trim(), id],
            )
            .context("Failed to update task name")?;
        }
        if let Some(number) = &patch.task_number {
            tx.execute(
                "UPDATE tasks SET task_number = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![number, id],
            )
            .context("Failed to update task number")?;
        }
        if let Some(description) = &patch.description {
            tx.execute(
                "UPDATE tasks SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![description, id],
            )
            .context("Failed to update task description")?;
        }
        if let Some(priority) = patch.priority {
            tx.execute(
                "UPDATE tasks SET priority = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![priority.as_str(), id],
            )
            .context("Failed to update task priority")?;
        }
        if let Some(due) = patch.due_date {
            tx.execute(
                "UPDATE tasks SET due_date = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![due.to_string(), id],
            )
            .context("Failed to update task due date")?;
        }
        if let Some(private) = patch.private {
            tx.execute(
                "UPDATE tasks SET private = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![private, id],
            )
            .context("Failed to update task visibility")?;
        }
        let mut added_assignees = Vec::new();
        if let Some(assignees) = &patch.assignees {
            let mut seen: HashSet<&str> =
                existing.assignees.iter().map(String::as_str).collect();
            added_assignees = assignees
                .iter()
                .filter(|a| seen.insert(a.as_str()))
                .cloned()
                .collect();
            replace_assignees(&tx, id, assignees)?;
        }
        if let Some(tags) = &patch.tags {
            replace_tags(&tx, id, tags)?;
        }

        tx.commit().context("Failed to commit task update")?;
        let task = self.get_task(id)?.context("Task not found after update")?;
        Ok(TaskUpdate {
            task,
            added_assignees,
        })
    }

    /// Soft-delete a task, detach it from its column and renumber the column.
    pub fn delete_task(&self, id: i64) -> Result<Task> {
        let task = self.require_live_task(id)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE tasks SET deleted_at = datetime('now'), column_id = NULL, updated_at = datetime('now') WHERE id = ?1",
            params![id],
        )
        .context("Failed to soft-delete task")?;
        if let Some(column_id) = task.column_id {
            renumber_tasks(&tx, column_id)?;
        }
        tx.commit().context("Failed to commit task delete")?;

        self.get_task(id)?.context("Task not found after delete")
    }

    /// Copy a task into the slot right after the original.
    pub fn duplicate_task(&self, id: i64) -> Result<Task> {
        let original = self.require_live_task(id)?;
        let column_id = original
            .column_id
            .ok_or(BoardError::TaskNotFound { id })?;
        let tag_ids: Vec<i64> = original.tags.iter().map(|t| t.id).collect();

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE tasks SET position = position + 1
             WHERE column_id = ?1 AND deleted_at IS NULL AND position > ?2",
            params![column_id, original.position],
        )
        .context("Failed to shift following tasks")?;
        tx.execute(
            "INSERT INTO tasks (board_id, column_id, name, task_number, description, priority, due_date, created_by, created_by_name, private, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                original.board_id,
                column_id,
                format!("{} (Copy)", original.name),
                original.task_number,
                original.description,
                original.priority.as_str(),
                original.due_date.map(|d| d.to_string()),
                original.created_by,
                original.created_by_name,
                original.private,
                original.position + 1,
            ],
        )
        .context("Failed to insert duplicated task")?;
        let copy_id = tx.last_insert_rowid();
        replace_assignees(&tx, copy_id, &original.assignees)?;
        replace_tags(&tx, copy_id, &tag_ids)?;
        tx.commit().context("Failed to commit task duplicate")?;

        self.get_task(copy_id)?
            .context("Task not found after duplicate")
    }

    // ── Ordering ──────────────────────────────────────────────────────

    /// Persist a full within-column ordering. `task_ids` must name every live
    /// task of the column exactly once; the batch is all-or-nothing.
    pub fn reorder_tasks(&self, column_id: i64, task_ids: &[i64]) -> Result<Vec<Task>> {
        self.require_live_column(column_id)?;
        let current = live_task_ids(&self.conn, column_id)?;

        let invalid = |reason: String| -> anyhow::Error {
            BoardError::InvalidReorder { column_id, reason }.into()
        };
        if task_ids.len() != current.len() {
            return Err(invalid(format!(
                "expected {} task ids, got {}",
                current.len(),
                task_ids.len()
            )));
        }
        let known: HashSet<i64> = current.iter().copied().collect();
        let mut seen = HashSet::new();
        for id in task_ids {
            if !known.contains(id) {
                return Err(invalid(format!("task {} is not in this column", id)));
            }
            if !seen.insert(*id) {
                return Err(invalid(format!("task {} listed twice", id)));
            }
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for (index, id) in task_ids.iter().enumerate() {
            tx.execute(
                "UPDATE tasks SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![index as i32, id],
            )
            .context("Failed to update task position")?;
        }
        tx.commit().context("Failed to commit task reorder")?;

        self.list_tasks(column_id)
    }

    /// Move a task into `column_id` at `position` (clamped to the column
    /// length). Both the source and the destination column end up dense.
    pub fn move_task(&self, task_id: i64, column_id: i64, position: i32) -> Result<Task> {
        let task = self.require_live_task(task_id)?;
        let dest = self.require_live_column(column_id)?;
        if dest.board_id != task.board_id {
            return Err(BoardError::Validation(format!(
                "Task {} belongs to board {}, column {} to board {}; transfer it instead",
                task_id, task.board_id, column_id, dest.board_id
            ))
            .into());
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut ids: Vec<i64> = live_task_ids(&tx, column_id)?
            .into_iter()
            .filter(|id| *id != task_id)
            .collect();
        let slot = usize::try_from(position).unwrap_or(0).min(ids.len());
        ids.insert(slot, task_id);

        tx.execute(
            "UPDATE tasks SET column_id = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![column_id, task_id],
        )
        .context("Failed to move task")?;
        for (index, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE tasks SET position = ?1 WHERE id = ?2",
                params![index as i32, id],
            )
            .context("Failed to update task position")?;
        }
        if let Some(source) = task.column_id {
            if source != column_id {
                renumber_tasks(&tx, source)?;
            }
        }
        tx.commit().context("Failed to commit task move")?;

        self.get_task(task_id)?.context("Task not found after move")
    }

    /// Move a task onto another board: it lands on top of `column_id`, loses
    /// its tags (they belong to the old board) and the source column is
    /// renumbered. A same-board target is a plain move to the top.
    pub fn transfer_task(&self, task_id: i64, column_id: i64) -> Result<TaskTransfer> {
        let task = self.require_live_task(task_id)?;
        let dest = self.require_live_column(column_id)?;
        let from_board = task.board_id;
        let from_column = task.column_id;
        if dest.board_id == from_board {
            let task = self.move_task(task_id, column_id, 0)?;
            return Ok(TaskTransfer {
                task,
                from_board,
                from_column,
            });
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE tasks SET position = position + 1 WHERE column_id = ?1 AND deleted_at IS NULL",
            params![column_id],
        )
        .context("Failed to shift destination tasks")?;
        tx.execute(
            "UPDATE tasks SET board_id = ?1, column_id = ?2, position = 0, updated_at = datetime('now')
             WHERE id = ?3",
            params![dest.board_id, column_id, task_id],
        )
        .context("Failed to transfer task")?;
        replace_tags(&tx, task_id, &[])?;
        if let Some(source) = from_column {
            renumber_tasks(&tx, source)?;
        }
        tx.commit().context("Failed to commit task transfer")?;

        tracing::debug!(task_id, from_board, to_board = dest.board_id, "task transferred");
        let task = self
            .get_task(task_id)?
            .context("Task not found after transfer")?;
        Ok(TaskTransfer {
            task,
            from_board,
            from_column,
        })
    }

    // ── Board view ────────────────────────────────────────────────────

    pub fn board_view(&self, board_id: i64) -> Result<BoardView> {
        let board = self.require_board(board_id)?;
        let mut columns = Vec::new();
        for column in self.list_columns(board_id)? {
            let tasks = self.list_tasks(column.id)?;
            columns.push(ColumnView { column, tasks });
        }
        Ok(BoardView { board, columns })
    }

    // ── Tags ──────────────────────────────────────────────────────────

    pub fn create_tag(&self, board_id: i64, name: &str, color: TagColor) -> Result<TaskTag> {
        require_name(name, "Tag")?;
        self.require_board(board_id)?;
        self.conn
            .execute(
                "INSERT INTO tags (board_id, name, color) VALUES (?1, ?2, ?3)",
                params![board_id, name.trim(), color.as_str()],
            )
            .context("Failed to insert tag")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, board_id, name, color FROM tags WHERE id = ?1",
                params![id],
                tag_row_from_row,
            )
            .context("Tag not found after insert")?
            .into_tag()
    }

    pub fn list_tags(&self, board_id: i64) -> Result<Vec<TaskTag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, board_id, name, color FROM tags WHERE board_id = ?1 ORDER BY id")
            .context("Failed to prepare list_tags")?;
        let rows = stmt
            .query_map(params![board_id], tag_row_from_row)
            .context("Failed to query tags")?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.context("Failed to read tag row")?.into_tag()?);
        }
        Ok(tags)
    }

    fn require_tags_on_board(&self, board_id: i64, tag_ids: &[i64]) -> Result<()> {
        for id in tag_ids {
            let owner: Option<i64> = self
                .conn
                .query_row(
                    "SELECT board_id FROM tags WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to query tag")?;
            if owner != Some(board_id) {
                return Err(BoardError::TagNotFound { id: *id }.into());
            }
        }
        Ok(())
    }

    // ── Saved views ───────────────────────────────────────────────────

    pub fn create_view(
        &self,
        board_id: i64,
        name: &str,
        filters: &[FilterItem],
        sort: Option<SortSpec>,
        created_by: &str,
    ) -> Result<SavedView> {
        require_name(name, "View")?;
        self.require_board(board_id)?;
        let filters_json =
            serde_json::to_string(filters).context("Failed to serialize view filters")?;
        let sort_json = sort
            .map(|s| serde_json::to_string(&s))
            .transpose()
            .context("Failed to serialize view sort")?;
        self.conn
            .execute(
                "INSERT INTO saved_views (board_id, name, filters, sort, created_by) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![board_id, name.trim(), filters_json, sort_json, created_by],
            )
            .context("Failed to insert saved view")?;
        let id = self.conn.last_insert_rowid();
        self.get_view(id)?
            .context("Saved view not found after insert")
    }

    /// Saved views of a board, oldest first.
    pub fn list_views(&self, board_id: i64) -> Result<Vec<SavedView>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, name, filters, sort, created_by, created_at FROM saved_views
                 WHERE board_id = ?1 ORDER BY created_at, id",
            )
            .context("Failed to prepare list_views")?;
        let rows = stmt
            .query_map(params![board_id], view_row_from_row)
            .context("Failed to query saved views")?;
        let mut views = Vec::new();
        for row in rows {
            views.push(row.context("Failed to read saved view row")?.into_view()?);
        }
        Ok(views)
    }

    /// Rename a saved view or replace its filters or sort.
    pub fn update_view(&self, id: i64, patch: &ViewPatch) -> Result<SavedView> {
        self.get_view(id)?.ok_or(BoardError::ViewNotFound { id })?;
        if let Some(name) = &patch.name {
            require_name(name, "View")?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &patch.name {
            tx.execute(
                "UPDATE saved_views SET name = ?1 WHERE id = ?2",
                params![name.trim(), id],
            )
            .context("Failed to rename saved view")?;
        }
        if let Some(filters) = &patch.filters {
            let filters_json =
                serde_json::to_string(filters).context("Failed to serialize view filters")?;
            tx.execute(
                "UPDATE saved_views SET filters = ?1 WHERE id = ?2",
                params![filters_json, id],
            )
            .context("Failed to update view filters")?;
        }
        if let Some(sort) = patch.sort {
            let sort_json = serde_json::to_string(&sort).context("Failed to serialize view sort")?;
            tx.execute(
                "UPDATE saved_views SET sort = ?1 WHERE id = ?2",
                params![sort_json, id],
            )
            .context("Failed to update view sort")?;
        }
        tx.commit().context("Failed to commit saved view update")?;

        self.get_view(id)?
            .context("Saved view not found after update")
    }

    pub fn get_view(&self, id: i64) -> Result<Option<SavedView>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, board_id, name, filters, sort, created_by, created_at FROM saved_views WHERE id = ?1",
                params![id],
                view_row_from_row,
            )
            .optional()
            .context("Failed to query saved view")?;
        row.map(ViewRow::into_view).transpose()
    }

    /// Delete a saved view, returning the board it belonged to.
    pub fn delete_view(&self, id: i64) -> Result<i64> {
        let board_id: i64 = self
            .conn
            .query_row(
                "SELECT board_id FROM saved_views WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query saved view")?
            .ok_or(BoardError::ViewNotFound { id })?;
        self.conn
            .execute("DELETE FROM saved_views WHERE id = ?1", params![id])
            .context("Failed to delete saved view")?;
        Ok(board_id)
    }

    // ── Helpers ───────────────────────────────────────────────────────

    /// Attach assignees and tags to a freshly read task row.
    fn hydrate(&self, mut task: Task) -> Result<Task> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM task_assignees WHERE task_id = ?1 ORDER BY rowid")
            .context("Failed to prepare assignee query")?;
        let rows = stmt
            .query_map(params![task.id], |row| row.get::<_, String>(0))
            .context("Failed to query assignees")?;
        for row in rows {
            task.assignees
                .push(row.context("Failed to read assignee row")?);
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT t.id, t.board_id, t.name, t.color FROM tags t
                 JOIN task_tags tt ON tt.tag_id = t.id
                 WHERE tt.task_id = ?1 ORDER BY tt.rowid",
            )
            .context("Failed to prepare tag query")?;
        let rows = stmt
            .query_map(params![task.id], tag_row_from_row)
            .context("Failed to query task tags")?;
        for row in rows {
            task.tags
                .push(row.context("Failed to read task tag row")?.into_tag()?);
        }
        Ok(task)
    }
}

fn require_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BoardError::Validation(format!("{} name must not be empty", what)).into());
    }
    Ok(())
}

fn live_task_ids(conn: &Connection, column_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT id FROM tasks WHERE column_id = ?1 AND deleted_at IS NULL ORDER BY position, id",
        )
        .context("Failed to prepare live task id query")?;
    let rows = stmt
        .query_map(params![column_id], |row| row.get::<_, i64>(0))
        .context("Failed to query live task ids")?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.context("Failed to read task id")?);
    }
    Ok(ids)
}

/// Rewrite the positions of a column's live tasks to `0..n-1`.
fn renumber_tasks(conn: &Connection, column_id: i64) -> Result<()> {
    for (index, id) in live_task_ids(conn, column_id)?.iter().enumerate() {
        conn.execute(
            "UPDATE tasks SET position = ?1 WHERE id = ?2",
            params![index as i32, id],
        )
        .context("Failed to renumber task")?;
    }
    Ok(())
}

/// Rewrite the positions of a board's live columns to `0..n-1`.
fn renumber_columns(conn: &Connection, board_id: i64) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "SELECT id FROM columns WHERE board_id = ?1 AND deleted_at IS NULL ORDER BY position, id",
        )
        .context("Failed to prepare column id query")?;
    let ids: Vec<i64> = stmt
        .query_map(params![board_id], |row| row.get(0))
        .context("Failed to query column ids")?
        .collect::<rusqlite::Result<_>>()
        .context("Failed to read column id")?;
    for (index, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE columns SET position = ?1 WHERE id = ?2",
            params![index as i32, id],
        )
        .context("Failed to renumber column")?;
    }
    Ok(())
}

fn replace_assignees(conn: &Connection, task_id: i64, assignees: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM task_assignees WHERE task_id = ?1",
        params![task_id],
    )
    .context("Failed to clear assignees")?;
    for user_id in assignees {
        conn.execute(
            "INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?1, ?2)",
            params![task_id, user_id],
        )
        .context("Failed to insert assignee")?;
    }
    Ok(())
}

fn replace_tags(conn: &Connection, task_id: i64, tag_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])
        .context("Failed to clear task tags")?;
    for tag_id in tag_ids {
        conn.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task_id, tag_id],
        )
        .context("Failed to insert task tag")?;
    }
    Ok(())
}

fn board_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        private: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn column_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        position: row.get(3)?,
        deleted_at: row.get(4)?,
    })
}

/// Intermediate row struct for converting DB strings to typed enums.
struct TaskRow {
    id: i64,
    board_id: i64,
    column_id: Option<i64>,
    name: String,
    task_number: String,
    description: String,
    priority: String,
    due_date: Option<String>,
    created_by: String,
    created_by_name: String,
    private: bool,
    position: i32,
    deleted_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn task_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        column_id: row.get(2)?,
        name: row.get(3)?,
        task_number: row.get(4)?,
        description: row.get(5)?,
        priority: row.get(6)?,
        due_date: row.get(7)?,
        created_by: row.get(8)?,
        created_by_name: row.get(9)?,
        private: row.get(10)?,
        position: row.get(11)?,
        deleted_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        let priority = Priority::from_str(&self.priority)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse task priority")?;
        let due_date = self
            .due_date
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()
            .context("Failed to parse task due date")?;
        Ok(Task {
            id: self.id,
            board_id: self.board_id,
            column_id: self.column_id,
            name: self.name,
            task_number: self.task_number,
            description: self.description,
            priority,
            due_date,
            created_by: self.created_by,
            created_by_name: self.created_by_name,
            assignees: Vec::new(),
            tags: Vec::new(),
            private: self.private,
            position: self.position,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

struct TagRow {
    id: i64,
    board_id: i64,
    name: String,
    color: String,
}

fn tag_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
    })
}

impl TagRow {
    fn into_tag(self) -> Result<TaskTag> {
        let color = TagColor::from_str(&self.color)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse tag color")?;
        Ok(TaskTag {
            id: self.id,
            board_id: self.board_id,
            name: self.name,
            color,
        })
    }
}

struct ViewRow {
    id: i64,
    board_id: i64,
    name: String,
    filters: String,
    sort: Option<String>,
    created_by: String,
    created_at: String,
}

fn view_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ViewRow> {
    Ok(ViewRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        filters: row.get(3)?,
        sort: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl ViewRow {
    fn into_view(self) -> Result<SavedView> {
        let filters: Vec<FilterItem> =
            serde_json::from_str(&self.filters).context("Failed to parse view filters JSON")?;
        let sort = self
            .sort
            .as_deref()
            .map(serde_json::from_str::<SortSpec>)
            .transpose()
            .context("Failed to parse view sort JSON")?;
        Ok(SavedView {
            id: self.id,
            board_id: self.board_id,
            name: self.name,
            filters,
            sort,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(db: &BoardDb, column_id: i64) -> Vec<(String, i32)> {
        db.list_tasks(column_id)
            .unwrap()
            .into_iter()
            .map(|t| (t.name, t.position))
            .collect()
    }

    fn names(db: &BoardDb, column_id: i64) -> Vec<String> {
        db.list_tasks(column_id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    fn assert_dense(db: &BoardDb, column_id: i64) {
        let orders: Vec<i32> = db
            .list_tasks(column_id)
            .unwrap()
            .iter()
            .map(|t| t.position)
            .collect();
        let expected: Vec<i32> = (0..orders.len() as i32).collect();
        assert_eq!(orders, expected, "column {} is not dense", column_id);
    }

    fn task(name: &str) -> NewTask {
        NewTask {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Board with one column holding tasks in the given top-to-bottom order.
    fn seeded(names: &[&str]) -> Result<(BoardDb, Board, Column, Vec<Task>)> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("Ops", false, "u1")?;
        let column = db.create_column(board.id, "Backlog")?;
        // create_task inserts at the top, so insert in reverse.
        for name in names.iter().rev() {
            db.create_task(column.id, &task(name))?;
        }
        let tasks = db.list_tasks(column.id)?;
        Ok((db, board, column, tasks))
    }

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('boards', 'columns', 'tasks', 'task_assignees', 'tags', 'task_tags', 'saved_views')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 7);
        // Re-running migrations is harmless.
        db.run_migrations()?;
        Ok(())
    }

    #[test]
    fn test_create_and_list_boards_newest_first() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        db.create_board("alpha", false, "u1")?;
        db.create_board("beta", true, "u2")?;
        let boards = db.list_boards()?;
        assert_eq!(boards.len(), 2);
        assert_eq!(boards[0].name, "beta");
        assert!(boards[0].private);
        assert!(db.create_board("   ", false, "u1").is_err());
        Ok(())
    }

    #[test]
    fn test_create_column_appends() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("b", false, "u")?;
        let a = db.create_column(board.id, "Backlog")?;
        let b = db.create_column(board.id, "Doing")?;
        let c = db.create_column(board.id, "Done")?;
        assert_eq!((a.position, b.position, c.position), (0, 1, 2));
        Ok(())
    }

    #[test]
    fn test_create_column_on_missing_board_is_not_found() {
        let db = BoardDb::new_in_memory().unwrap();
        let err = db.create_column(99, "x").unwrap_err();
        let typed = err.downcast_ref::<BoardError>().unwrap();
        assert!(matches!(typed, BoardError::BoardNotFound { id: 99 }));
    }

    #[test]
    fn test_delete_column_renumbers_remaining() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("b", false, "u")?;
        let a = db.create_column(board.id, "A")?;
        let b = db.create_column(board.id, "B")?;
        let c = db.create_column(board.id, "C")?;

        let deleted = db.delete_column(b.id)?;
        assert!(deleted.deleted_at.is_some());

        let columns = db.list_columns(board.id)?;
        let ids: Vec<(i64, i32)> = columns.iter().map(|c| (c.id, c.position)).collect();
        assert_eq!(ids, vec![(a.id, 0), (c.id, 1)]);

        // Deleted columns are no longer addressable.
        assert!(db.rename_column(b.id, "again").is_err());
        Ok(())
    }

    #[test]
    fn test_set_column_order() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("b", false, "u")?;
        let backlog = db.create_column(board.id, "Backlog")?;
        let doing = db.create_column(board.id, "Doing")?;
        let done = db.create_column(board.id, "Done")?;

        db.set_column_order(done.id, 0)?;
        db.set_column_order(backlog.id, 1)?;
        db.set_column_order(doing.id, 2)?;

        let names: Vec<String> = db.list_columns(board.id)?.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Done", "Backlog", "Doing"]);
        assert!(db.set_column_order(done.id, -1).is_err());
        Ok(())
    }

    #[test]
    fn test_create_task_inserts_at_top() -> Result<()> {
        let (db, _, column, _) = seeded(&["A", "B"])?;
        db.create_task(column.id, &task("New"))?;
        assert_eq!(
            positions(&db, column.id),
            vec![("New".into(), 0), ("A".into(), 1), ("B".into(), 2)]
        );
        Ok(())
    }

    #[test]
    fn test_create_task_with_relations() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("b", false, "u")?;
        let column = db.create_column(board.id, "Backlog")?;
        let tag = db.create_tag(board.id, "bug", TagColor::Red)?;
        let created = db.create_task(
            column.id,
            &NewTask {
                name: "Fix login".into(),
                priority: Priority::High,
                due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                assignees: vec!["u2".into(), "u3".into()],
                tags: vec![tag.id],
                created_by: "u1".into(),
                ..Default::default()
            },
        )?;
        assert_eq!(created.priority, Priority::High);
        assert_eq!(created.due_date, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(created.assignees, vec!["u2", "u3"]);
        assert_eq!(created.tags, vec![tag]);
        assert_eq!(created.column_id, Some(column.id));
        Ok(())
    }

    #[test]
    fn test_create_task_rejects_foreign_tag() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let a = db.create_board("a", false, "u")?;
        let b = db.create_board("b", false, "u")?;
        let column = db.create_column(a.id, "Backlog")?;
        let foreign = db.create_tag(b.id, "other", TagColor::Blue)?;
        let err = db
            .create_task(
                column.id,
                &NewTask {
                    name: "x".into(),
                    tags: vec![foreign.id],
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.downcast_ref::<BoardError>().unwrap().is_not_found());
        assert!(db.list_tasks(column.id)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_update_task_reports_added_assignees() -> Result<()> {
        let (db, _, _, tasks) = seeded(&["A"])?;
        let id = tasks[0].id;
        db.update_task(
            id,
            &TaskPatch {
                assignees: Some(vec!["u1".into()]),
                ..Default::default()
            },
        )?;
        let update = db.update_task(
            id,
            &TaskPatch {
                name: Some("Renamed".into()),
                assignees: Some(vec!["u1".into(), "u2".into()]),
                priority: Some(Priority::Critical),
                ..Default::default()
            },
        )?;
        assert_eq!(update.added_assignees, vec!["u2"]);
        assert_eq!(update.task.name, "Renamed");
        assert_eq!(update.task.priority, Priority::Critical);
        assert_eq!(update.task.assignees, vec!["u1", "u2"]);
        Ok(())
    }

    #[test]
    fn test_update_task_without_assignees_adds_nobody() -> Result<()> {
        let (db, _, _, tasks) = seeded(&["A"])?;
        let update = db.update_task(
            tasks[0].id,
            &TaskPatch {
                description: Some("more detail".into()),
                ..Default::default()
            },
        )?;
        assert!(update.added_assignees.is_empty());
        assert_eq!(update.task.description, "more detail");
        Ok(())
    }

    #[test]
    fn test_update_task_reports_each_added_assignee_once() -> Result<()> {
        let (db, _, _, tasks) = seeded(&["A"])?;
        let update = db.update_task(
            tasks[0].id,
            &TaskPatch {
                assignees: Some(vec!["u2".into(), "u2".into(), "u3".into(), "u2".into()]),
                ..Default::default()
            },
        )?;
        assert_eq!(update.added_assignees, vec!["u2", "u3"]);
        assert_eq!(update.task.assignees, vec!["u2", "u3"]);
        Ok(())
    }

    #[test]
    fn test_update_board_name_and_visibility() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("Ops", false, "u1")?;

        let renamed = db.update_board(
            board.id,
            &BoardPatch {
                name: Some("  Platform  ".into()),
                ..Default::default()
            },
        )?;
        assert_eq!(renamed.name, "Platform");
        assert!(!renamed.private);

        let hidden = db.update_board(
            board.id,
            &BoardPatch {
                private: Some(true),
                ..Default::default()
            },
        )?;
        assert_eq!(hidden.name, "Platform");
        assert!(hidden.private);

        let blank = BoardPatch {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(db.update_board(board.id, &blank).is_err());
        let missing = db.update_board(99, &BoardPatch::default()).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<BoardError>(),
            Some(BoardError::BoardNotFound { id: 99 })
        ));
        Ok(())
    }

    #[test]
    fn test_creator_name_is_stored_and_copied() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("b", false, "u")?;
        let column = db.create_column(board.id, "Backlog")?;
        let created = db.create_task(
            column.id,
            &NewTask {
                name: "Audit".into(),
                created_by: "ada@example.com".into(),
                created_by_name: "Ada".into(),
                ..Default::default()
            },
        )?;
        assert_eq!(created.created_by_name, "Ada");
        let copy = db.duplicate_task(created.id)?;
        assert_eq!(copy.created_by, "ada@example.com");
        assert_eq!(copy.created_by_name, "Ada");

        // Re-running migrations on a database that already has the column.
        db.run_migrations()?;
        Ok(())
    }

    #[test]
    fn test_delete_task_is_soft_and_renumbers() -> Result<()> {
        let (db, _, column, tasks) = seeded(&["A", "B", "C"])?;
        let deleted = db.delete_task(tasks[1].id)?;
        assert!(deleted.deleted_at.is_some());
        assert_eq!(deleted.column_id, None);
        assert_eq!(names(&db, column.id), vec!["A", "C"]);
        assert_dense(&db, column.id);

        // The row still exists but is no longer live.
        assert!(db.get_task(tasks[1].id)?.is_some());
        assert!(db.delete_task(tasks[1].id).is_err());
        Ok(())
    }

    #[test]
    fn test_duplicate_task_lands_after_original() -> Result<()> {
        let (db, board, column, tasks) = seeded(&["A", "B"])?;
        let tag = db.create_tag(board.id, "urgent", TagColor::Orange)?;
        db.update_task(
            tasks[0].id,
            &TaskPatch {
                tags: Some(vec![tag.id]),
                assignees: Some(vec!["u9".into()]),
                ..Default::default()
            },
        )?;
        let copy = db.duplicate_task(tasks[0].id)?;
        assert_eq!(copy.name, "A (Copy)");
        assert_eq!(copy.assignees, vec!["u9"]);
        assert_eq!(copy.tags.len(), 1);
        assert_eq!(names(&db, column.id), vec!["A", "A (Copy)", "B"]);
        assert_dense(&db, column.id);
        Ok(())
    }

    #[test]
    fn test_reorder_tasks_assigns_indices() -> Result<()> {
        let (db, _, column, tasks) = seeded(&["A", "B", "C"])?;
        let ids = vec![tasks[2].id, tasks[0].id, tasks[1].id];
        let reordered = db.reorder_tasks(column.id, &ids)?;
        let got: Vec<&str> = reordered.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(got, vec!["C", "A", "B"]);
        assert_dense(&db, column.id);
        Ok(())
    }

    #[test]
    fn test_reorder_tasks_rejects_partial_or_foreign_lists() -> Result<()> {
        let (db, board, column, tasks) = seeded(&["A", "B"])?;
        let other = db.create_column(board.id, "Other")?;
        let stranger = db.create_task(other.id, &task("Z"))?;

        let partial = db.reorder_tasks(column.id, &[tasks[0].id]).unwrap_err();
        assert!(matches!(
            partial.downcast_ref::<BoardError>(),
            Some(BoardError::InvalidReorder { .. })
        ));
        assert!(db
            .reorder_tasks(column.id, &[tasks[0].id, stranger.id])
            .is_err());
        assert!(db
            .reorder_tasks(column.id, &[tasks[0].id, tasks[0].id])
            .is_err());

        // Nothing was written.
        assert_eq!(names(&db, column.id), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn test_move_task_across_columns_keeps_both_dense() -> Result<()> {
        let (db, board, source, tasks) = seeded(&["X", "Y", "Z"])?;
        let dest = db.create_column(board.id, "Doing")?;
        db.create_task(dest.id, &task("Q"))?;
        db.create_task(dest.id, &task("P"))?;

        let moved = db.move_task(tasks[1].id, dest.id, 1)?;
        assert_eq!(moved.column_id, Some(dest.id));
        assert_eq!(moved.position, 1);
        assert_eq!(names(&db, source.id), vec!["X", "Z"]);
        assert_eq!(names(&db, dest.id), vec!["P", "Y", "Q"]);
        assert_dense(&db, source.id);
        assert_dense(&db, dest.id);
        Ok(())
    }

    #[test]
    fn test_move_task_leaves_other_columns_alone() -> Result<()> {
        let (db, board, a, tasks) = seeded(&["A1", "A2"])?;
        let b = db.create_column(board.id, "B")?;
        let c = db.create_column(board.id, "C")?;
        db.create_task(c.id, &task("C2"))?;
        db.create_task(c.id, &task("C1"))?;
        let before = positions(&db, c.id);

        db.move_task(tasks[0].id, b.id, 0)?;
        assert_eq!(positions(&db, c.id), before);
        assert_eq!(names(&db, a.id), vec!["A2"]);
        assert_eq!(names(&db, b.id), vec!["A1"]);
        Ok(())
    }

    #[test]
    fn test_move_task_clamps_position_to_end() -> Result<()> {
        let (db, board, _, tasks) = seeded(&["A"])?;
        let dest = db.create_column(board.id, "Done")?;
        db.create_task(dest.id, &task("D"))?;
        let moved = db.move_task(tasks[0].id, dest.id, 42)?;
        assert_eq!(moved.position, 1);
        assert_eq!(names(&db, dest.id), vec!["D", "A"]);
        Ok(())
    }

    #[test]
    fn test_move_task_within_same_column() -> Result<()> {
        let (db, _, column, tasks) = seeded(&["A", "B", "C"])?;
        db.move_task(tasks[0].id, column.id, 2)?;
        assert_eq!(names(&db, column.id), vec!["B", "C", "A"]);
        assert_dense(&db, column.id);
        Ok(())
    }

    #[test]
    fn test_move_task_across_boards_is_rejected() -> Result<()> {
        let (db, _, _, tasks) = seeded(&["A"])?;
        let other = db.create_board("other", false, "u")?;
        let foreign = db.create_column(other.id, "Backlog")?;
        let err = db.move_task(tasks[0].id, foreign.id, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_transfer_task_to_another_board() -> Result<()> {
        let (db, board, source, tasks) = seeded(&["A", "B", "C"])?;
        let tag = db.create_tag(board.id, "bug", TagColor::Red)?;
        db.update_task(
            tasks[1].id,
            &TaskPatch {
                tags: Some(vec![tag.id]),
                assignees: Some(vec!["u7".into()]),
                ..Default::default()
            },
        )?;
        let other = db.create_board("other", false, "u")?;
        let dest = db.create_column(other.id, "Inbox")?;
        db.create_task(dest.id, &task("Z"))?;

        let transfer = db.transfer_task(tasks[1].id, dest.id)?;
        assert_eq!(transfer.from_board, board.id);
        assert_eq!(transfer.from_column, Some(source.id));
        assert_eq!(transfer.task.board_id, other.id);
        assert_eq!(transfer.task.column_id, Some(dest.id));
        assert_eq!(transfer.task.position, 0);
        assert!(transfer.task.tags.is_empty());
        assert_eq!(transfer.task.assignees, vec!["u7"]);

        assert_eq!(names(&db, source.id), vec!["A", "C"]);
        assert_eq!(names(&db, dest.id), vec!["B", "Z"]);
        assert_dense(&db, source.id);
        assert_dense(&db, dest.id);
        Ok(())
    }

    #[test]
    fn test_transfer_task_within_board_moves_to_top() -> Result<()> {
        let (db, board, source, tasks) = seeded(&["A", "B"])?;
        let tag = db.create_tag(board.id, "keep", TagColor::Green)?;
        db.update_task(
            tasks[1].id,
            &TaskPatch {
                tags: Some(vec![tag.id]),
                ..Default::default()
            },
        )?;
        let dest = db.create_column(board.id, "Doing")?;
        db.create_task(dest.id, &task("D"))?;

        let transfer = db.transfer_task(tasks[1].id, dest.id)?;
        assert_eq!(transfer.from_board, board.id);
        assert_eq!(transfer.task.tags, vec![tag]);
        assert_eq!(names(&db, source.id), vec!["A"]);
        assert_eq!(names(&db, dest.id), vec!["B", "D"]);
        Ok(())
    }

    #[test]
    fn test_transfer_task_to_deleted_column_changes_nothing() -> Result<()> {
        let (db, _, source, tasks) = seeded(&["A"])?;
        let other = db.create_board("other", false, "u")?;
        let dest = db.create_column(other.id, "Inbox")?;
        db.delete_column(dest.id)?;
        let err = db.transfer_task(tasks[0].id, dest.id).unwrap_err();
        assert!(err.downcast_ref::<BoardError>().unwrap().is_not_found());
        assert_eq!(names(&db, source.id), vec!["A"]);
        Ok(())
    }

    #[test]
    fn test_board_view_excludes_deleted() -> Result<()> {
        let (db, board, backlog, tasks) = seeded(&["A", "B"])?;
        let doomed = db.create_column(board.id, "Doomed")?;
        db.create_task(doomed.id, &task("lost"))?;
        db.delete_column(doomed.id)?;
        db.delete_task(tasks[0].id)?;

        let view = db.board_view(board.id)?;
        assert_eq!(view.board.id, board.id);
        assert_eq!(view.columns.len(), 1);
        assert_eq!(view.columns[0].column.id, backlog.id);
        let got: Vec<&str> = view.columns[0].tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(got, vec!["B"]);
        Ok(())
    }

    #[test]
    fn test_saved_views_round_trip() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("b", false, "u")?;
        let filters = vec![FilterItem {
            kind: FilterKind::Tag,
            operator: FilterOperator::Contains,
            value: "bug".into(),
        }];
        let sort = SortSpec {
            key: SortKey::DueDate,
            dir: SortDir::Desc,
        };
        let first = db.create_view(board.id, "Bugs", &filters, Some(sort), "u1")?;
        db.create_view(board.id, "Everything", &[], None, "u1")?;

        let views = db.list_views(board.id)?;
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].filters, filters);
        assert_eq!(views[0].sort, Some(sort));
        assert_eq!(views[1].sort, None);

        let updated = db.update_view(
            first.id,
            &ViewPatch {
                name: Some("Open bugs".into()),
                filters: Some(vec![]),
                ..Default::default()
            },
        )?;
        assert_eq!(updated.name, "Open bugs");
        assert!(updated.filters.is_empty());
        assert_eq!(updated.sort, Some(sort));
        let blank = ViewPatch {
            name: Some("".into()),
            ..Default::default()
        };
        assert!(db.update_view(first.id, &blank).is_err());

        assert_eq!(db.delete_view(first.id)?, board.id);
        assert_eq!(db.list_views(board.id)?.len(), 1);
        assert!(db.delete_view(first.id).is_err());
        assert!(matches!(
            db.update_view(first.id, &ViewPatch::default())
                .unwrap_err()
                .downcast_ref::<BoardError>(),
            Some(BoardError::ViewNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_db_handle_runs_on_blocking_pool() -> Result<()> {
        let handle = DbHandle::new(BoardDb::new_in_memory()?);
        let board = handle
            .call(|db| db.create_board("async", false, "u"))
            .await?;
        let boards = handle.call(|db| db.list_boards()).await?;
        assert_eq!(boards[0].id, board.id);
        Ok(())
    }
}
