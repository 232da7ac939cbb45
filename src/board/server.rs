use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::cache::BoardCache;
use super::db::{BoardDb, DbHandle};
use super::notify;
use super::ws;

/// Configuration for the board server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub app_url: String,
    pub webhook_url: Option<String>,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3141,
            db_path: PathBuf::from(".taskboard/board.db"),
            app_url: "http://localhost:3141".to_string(),
            webhook_url: None,
            dev_mode: false,
        }
    }
}

/// Build the full application router with API and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database and assemble the shared state for `config`.
pub fn build_state(config: &ServerConfig) -> Result<Arc<AppState>> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = BoardDb::new(&config.db_path).context("Failed to initialize board database")?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);

    Ok(Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
        cache: BoardCache::new(),
        notifier: notify::from_webhook_url(config.webhook_url.as_deref()),
        app_url: config.app_url.clone(),
    }))
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Start the board server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = build_state(&config)?;

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr: SocketAddr = listener.local_addr()?;
    tracing::info!(%local_addr, db = %config.db_path.display(), "taskboard server listening");
    println!("Taskboard running at http://{}", local_addr);

    serve_on(listener, app, shutdown_signal()).await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            db_path: dir.path().join("nested/board.db"),
            ..Default::default()
        };
        let state = build_state(&config).unwrap();
        (dir, build_router(state))
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let (_dir, app) = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_create_board_via_full_router() {
        let (_dir, app) = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/boards")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"name": "server-test"}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["name"], "server-test");
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let (_dir, app) = test_router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // A plain GET without upgrade headers is refused by the extractor.
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_dir, app) = test_router();
        let req = Request::builder()
            .uri("/some/client/route")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_build_state_creates_db_directory() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            db_path: dir.path().join("a/b/board.db"),
            ..Default::default()
        };
        build_state(&config).unwrap();
        assert!(dir.path().join("a/b/board.db").exists());
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3141);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.db_path, PathBuf::from(".taskboard/board.db"));
        assert!(config.webhook_url.is_none());
        assert!(!config.dev_mode);
    }
}
