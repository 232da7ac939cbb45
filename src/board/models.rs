use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub private: bool,
    pub created_by: String,
    pub created_at: String,
}

/// Partial board update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardPatch {
    pub name: Option<String>,
    pub private: Option<bool>,
}

/// A board lane. `position` is the board-wide column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub position: i32,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Numeric rank used when sorting by priority.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TagColor {
    Gray,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
}

impl TagColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Pink => "pink",
        }
    }
}

impl FromStr for TagColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gray" => Ok(Self::Gray),
            "red" => Ok(Self::Red),
            "orange" => Ok(Self::Orange),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            "blue" => Ok(Self::Blue),
            "purple" => Ok(Self::Purple),
            "pink" => Ok(Self::Pink),
            _ => Err(format!("Invalid tag color: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTag {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub color: TagColor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub board_id: i64,
    /// `None` once the task has been soft-deleted.
    pub column_id: Option<i64>,
    pub name: String,
    pub task_number: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub created_by: String,
    /// Display name of the creator; `created_by` holds their email or id.
    #[serde(default)]
    pub created_by_name: String,
    pub assignees: Vec<String>,
    pub tags: Vec<TaskTag>,
    pub private: bool,
    pub position: i32,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a task. The column comes from the route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub task_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_by_name: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Tag ids.
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub private: bool,
}

/// Partial task update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub task_number: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub assignees: Option<Vec<String>>,
    pub tags: Option<Vec<i64>>,
    pub private: Option<bool>,
}

// ── Filters and sorting ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Assignee,
    Tag,
    DueDate,
    CreatedBy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Is,
    IsNot,
    Contains,
    DoesNotContain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterItem {
    pub kind: FilterKind,
    pub operator: FilterOperator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Priority,
    DueDate,
    #[default]
    Manual,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub dir: SortDir,
}

/// A persisted filter/sort preset for a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedView {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub filters: Vec<FilterItem>,
    pub sort: Option<SortSpec>,
    pub created_by: String,
    pub created_at: String,
}

/// Partial saved-view update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewPatch {
    pub name: Option<String>,
    pub filters: Option<Vec<FilterItem>>,
    pub sort: Option<SortSpec>,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardView {
    pub board: Board,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnView {
    pub column: Column,
    pub tasks: Vec<Task>,
}

/// Result of a task edit: the stored task plus the users newly assigned by it.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub task: Task,
    pub added_assignees: Vec<String>,
}

/// Result of moving a task onto another board.
#[derive(Debug, Clone)]
pub struct TaskTransfer {
    pub task: Task,
    pub from_board: i64,
    pub from_column: Option<i64>,
}
