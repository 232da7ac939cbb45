use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Request, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::cache::BoardCache;
use super::db::DbHandle;
use super::models::*;
use super::notify::{self, Notifier};
use super::outcome::Outcome;
use super::ws::{WsMessage, broadcast_board_change, broadcast_message};
use crate::errors::BoardError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
    pub cache: BoardCache,
    pub notifier: Arc<dyn Notifier>,
    /// Public base URL used in notification links.
    pub app_url: String,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub created_by: String,
}

#[derive(Deserialize)]
pub struct ColumnNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnOrderRequest {
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderTasksRequest {
    pub task_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveTaskRequest {
    pub column_id: i64,
    pub position: i32,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    /// User performing the edit; named in assignment notifications.
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferTaskRequest {
    pub column_id: i64,
}

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: Option<TagColor>,
}

#[derive(Deserialize)]
pub struct CreateViewRequest {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<FilterItem>,
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub created_by: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Deleted {
    pub id: i64,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(Outcome::<()>::Failure(message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<BoardError>() {
            Some(e) if e.is_not_found() => ApiError::NotFound(e.to_string()),
            Some(e @ (BoardError::Validation(_) | BoardError::InvalidReorder { .. })) => {
                ApiError::BadRequest(e.to_string())
            }
            _ => {
                tracing::error!(error = ?err, "request failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "rejected request body");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "rejected path parameters");
        ApiError::BadRequest(rejection.body_text())
    }
}

// ── Extractors ────────────────────────────────────────────────────────

/// JSON body whose rejections are reported as tagged failures.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path parameters whose rejections are reported as tagged failures.
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

fn ok<T: Serialize>(data: T) -> Json<Outcome<T>> {
    Json(Outcome::Success(data))
}

fn created<T: Serialize>(data: T) -> (StatusCode, Json<Outcome<T>>) {
    (StatusCode::CREATED, Json(Outcome::Success(data)))
}

/// Drop the cached view of `board_id` and tell subscribers about the change.
fn after_mutation(state: &AppState, board_id: i64, msg: WsMessage) {
    state.cache.invalidate(board_id);
    broadcast_board_change(&state.ws_tx, board_id, &msg);
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/{id}", get(get_board).patch(update_board))
        .route("/api/boards/{id}/columns", post(create_column))
        .route("/api/boards/{id}/tags", get(list_tags).post(create_tag))
        .route("/api/boards/{id}/views", get(list_views).post(create_view))
        .route(
            "/api/columns/{id}",
            axum::routing::patch(rename_column).delete(delete_column),
        )
        .route("/api/columns/{id}/order", put(set_column_order))
        .route("/api/columns/{id}/tasks", post(create_task))
        .route("/api/columns/{id}/tasks/order", put(reorder_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/move", post(move_task))
        .route("/api/tasks/{id}/duplicate", post(duplicate_task))
        .route("/api/tasks/{id}/transfer", post(transfer_task))
        .route(
            "/api/views/{id}",
            axum::routing::patch(update_view).delete(delete_view),
        )
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_boards(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let boards = state.db.call(|db| db.list_boards()).await?;
    Ok(ok(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let board = state
        .db
        .call(move |db| db.create_board(&req.name, req.private, &req.created_by))
        .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::BoardCreated {
            board: board.clone(),
        },
    );
    Ok(created(board))
}

async fn get_board(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ApiError> {
    let view = match state.cache.get(id) {
        Some(view) => view,
        None => {
            let generation = state.cache.generation(id);
            let fresh = state.db.call(move |db| db.board_view(id)).await?;
            state.cache.insert_if_current(id, generation, fresh)
        }
    };
    Ok(Json(Outcome::Success(view.as_ref())).into_response())
}

async fn update_board(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<BoardPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let board = state
        .db
        .call(move |db| db.update_board(id, &patch))
        .await?;
    after_mutation(
        &state,
        id,
        WsMessage::BoardUpdated {
            board: board.clone(),
        },
    );
    Ok(ok(board))
}

async fn create_column(
    State(state): State<SharedState>,
    ApiPath(board_id): ApiPath<i64>,
    ApiJson(req): ApiJson<ColumnNameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state
        .db
        .call(move |db| db.create_column(board_id, &req.name))
        .await?;
    after_mutation(
        &state,
        board_id,
        WsMessage::ColumnCreated {
            column: column.clone(),
        },
    );
    Ok(created(column))
}

async fn rename_column(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ColumnNameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state
        .db
        .call(move |db| db.rename_column(id, &req.name))
        .await?;
    after_mutation(
        &state,
        column.board_id,
        WsMessage::ColumnUpdated {
            column: column.clone(),
        },
    );
    Ok(ok(column))
}

async fn delete_column(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state.db.call(move |db| db.delete_column(id)).await?;
    after_mutation(
        &state,
        column.board_id,
        WsMessage::ColumnDeleted {
            board_id: column.board_id,
            column_id: id,
        },
    );
    Ok(ok(column))
}

async fn set_column_order(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ColumnOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state
        .db
        .call(move |db| db.set_column_order(id, req.order))
        .await?;
    after_mutation(
        &state,
        column.board_id,
        WsMessage::ColumnReordered {
            board_id: column.board_id,
            column_id: id,
            position: column.position,
        },
    );
    Ok(ok(column))
}

async fn reorder_tasks(
    State(state): State<SharedState>,
    ApiPath(column_id): ApiPath<i64>,
    ApiJson(req): ApiJson<ReorderTasksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task_ids = req.task_ids.clone();
    let (board_id, tasks) = state
        .db
        .call(move |db| {
            let tasks = db.reorder_tasks(column_id, &task_ids)?;
            let board_id = db
                .get_column(column_id)?
                .map(|c| c.board_id)
                .ok_or(BoardError::ColumnNotFound { id: column_id })?;
            Ok((board_id, tasks))
        })
        .await?;
    after_mutation(
        &state,
        board_id,
        WsMessage::TasksReordered {
            board_id,
            column_id,
            task_ids: req.task_ids,
        },
    );
    Ok(ok(tasks))
}

async fn create_task(
    State(state): State<SharedState>,
    ApiPath(column_id): ApiPath<i64>,
    ApiJson(req): ApiJson<NewTask>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .db
        .call(move |db| db.create_task(column_id, &req))
        .await?;
    after_mutation(
        &state,
        task.board_id,
        WsMessage::TaskCreated { task: task.clone() },
    );
    Ok(created(task))
}

async fn get_task(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.db.call(move |db| db.get_task(id)).await?;
    match task {
        Some(task) if task.deleted_at.is_none() => Ok(ok(task)),
        _ => Err(ApiError::NotFound(format!("Task {} not found", id))),
    }
}

async fn update_task(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = req.patch;
    let update = state
        .db
        .call(move |db| db.update_task(id, &patch))
        .await?;
    let task = update.task;
    after_mutation(
        &state,
        task.board_id,
        WsMessage::TaskUpdated { task: task.clone() },
    );

    let message = notify::assignment_message(req.actor.as_deref(), &state.app_url, &task);
    notify::dispatch(state.notifier.clone(), update.added_assignees, message);

    Ok(ok(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.db.call(move |db| db.delete_task(id)).await?;
    after_mutation(
        &state,
        task.board_id,
        WsMessage::TaskDeleted {
            board_id: task.board_id,
            task_id: id,
        },
    );
    Ok(ok(task))
}

async fn move_task(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<MoveTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (from_column, task) = state
        .db
        .call(move |db| {
            let from_column = db.get_task(id)?.and_then(|t| t.column_id);
            let task = db.move_task(id, req.column_id, req.position)?;
            Ok((from_column, task))
        })
        .await?;
    after_mutation(
        &state,
        task.board_id,
        WsMessage::TaskMoved {
            board_id: task.board_id,
            task_id: id,
            from_column,
            to_column: req.column_id,
            position: task.position,
        },
    );
    Ok(ok(task))
}

async fn transfer_task(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<TransferTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer = state
        .db
        .call(move |db| db.transfer_task(id, req.column_id))
        .await?;
    let task = transfer.task;
    let from_board = transfer.from_board;
    after_mutation(
        &state,
        task.board_id,
        WsMessage::TaskTransferred {
            task: task.clone(),
            from_board,
            from_column: transfer.from_column,
        },
    );
    if from_board != task.board_id {
        state.cache.invalidate(from_board);
        broadcast_message(&state.ws_tx, &WsMessage::BoardStale { board_id: from_board });
    }
    Ok(ok(task))
}

async fn duplicate_task(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.db.call(move |db| db.duplicate_task(id)).await?;
    after_mutation(
        &state,
        task.board_id,
        WsMessage::TaskCreated { task: task.clone() },
    );
    Ok(created(task))
}

async fn list_tags(
    State(state): State<SharedState>,
    ApiPath(board_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = state.db.call(move |db| db.list_tags(board_id)).await?;
    Ok(ok(tags))
}

async fn create_tag(
    State(state): State<SharedState>,
    ApiPath(board_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let color = req.color.unwrap_or(TagColor::Gray);
    let tag = state
        .db
        .call(move |db| db.create_tag(board_id, &req.name, color))
        .await?;
    after_mutation(&state, board_id, WsMessage::TagCreated { tag: tag.clone() });
    Ok(created(tag))
}

async fn list_views(
    State(state): State<SharedState>,
    ApiPath(board_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state.db.call(move |db| db.list_views(board_id)).await?;
    Ok(ok(views))
}

async fn create_view(
    State(state): State<SharedState>,
    ApiPath(board_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreateViewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .db
        .call(move |db| {
            db.create_view(board_id, &req.name, &req.filters, req.sort, &req.created_by)
        })
        .await?;
    broadcast_message(&state.ws_tx, &WsMessage::ViewCreated { view: view.clone() });
    Ok(created(view))
}

async fn update_view(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<ViewPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.db.call(move |db| db.update_view(id, &patch)).await?;
    broadcast_message(&state.ws_tx, &WsMessage::ViewUpdated { view: view.clone() });
    Ok(ok(view))
}

async fn delete_view(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let board_id = state.db.call(move |db| db.delete_view(id)).await?;
    broadcast_message(&state.ws_tx, &WsMessage::ViewDeleted { board_id, view_id: id });
    Ok(ok(Deleted { id }))
}

// ── Tests ─────────────────────────────────────────────────────────────
