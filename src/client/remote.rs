use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::board::api::{ColumnOrderRequest, MoveTaskRequest, ReorderTasksRequest};
use crate::board::models::{BoardView, Column, Task};
use crate::board::outcome::Outcome;
use crate::errors::RemoteError;

/// The three mutation endpoints a drag can hit.
#[async_trait]
pub trait BoardRemote: Send + Sync {
    async fn set_column_order(&self, column_id: i64, order: i32) -> Result<(), RemoteError>;

    async fn reorder_tasks(&self, column_id: i64, task_ids: &[i64]) -> Result<(), RemoteError>;

    async fn move_task(&self, task_id: i64, column_id: i64, position: i32)
    -> Result<(), RemoteError>;
}

/// `BoardRemote` over the board service's HTTP API.
#[derive(Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Load the full board, e.g. after a `BoardStale` signal.
    pub async fn fetch_board(&self, board_id: i64) -> Result<BoardView, RemoteError> {
        let request = self.client.get(self.url(&format!("/api/boards/{}", board_id)));
        self.send(request).await
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        self.send(self.client.put(self.url(path)).json(body)).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    /// Send a request and unwrap the tagged outcome in its body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(RemoteError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(RemoteError::Transport)?;

        match serde_json::from_str::<Outcome<T>>(&body) {
            Ok(Outcome::Success(data)) if status.is_success() => Ok(data),
            Ok(Outcome::Success(_)) => Err(RemoteError::Status {
                status: status.as_u16(),
                message: "unexpected success payload".to_string(),
            }),
            Ok(Outcome::Failure(message)) if status.is_success() => {
                Err(RemoteError::Rejected(message))
            }
            Ok(Outcome::Failure(message)) => Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            }),
            Err(_) if !status.is_success() => Err(RemoteError::Status {
                status: status.as_u16(),
                message: body,
            }),
            Err(e) => Err(RemoteError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl BoardRemote for HttpRemote {
    async fn set_column_order(&self, column_id: i64, order: i32) -> Result<(), RemoteError> {
        let _: Column = self
            .put_json(
                &format!("/api/columns/{}/order", column_id),
                &ColumnOrderRequest { order },
            )
            .await?;
        Ok(())
    }

    async fn reorder_tasks(&self, column_id: i64, task_ids: &[i64]) -> Result<(), RemoteError> {
        let _: Vec<Task> = self
            .put_json(
                &format!("/api/columns/{}/tasks/order", column_id),
                &ReorderTasksRequest {
                    task_ids: task_ids.to_vec(),
                },
            )
            .await?;
        Ok(())
    }

    async fn move_task(
        &self,
        task_id: i64,
        column_id: i64,
        position: i32,
    ) -> Result<(), RemoteError> {
        let _: Task = self
            .post_json(
                &format!("/api/tasks/{}/move", task_id),
                &MoveTaskRequest {
                    column_id,
                    position,
                },
            )
            .await?;
        Ok(())
    }
}
