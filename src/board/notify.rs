//! Assignment notifications.
//!
//! Delivery is fire-and-forget: [`dispatch`] spawns the send and returns
//! immediately. A failed delivery is logged and otherwise ignored; it never
//! reaches the caller and never undoes the mutation that triggered it.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::models::Task;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipients: &[String], message: &str) -> Result<()>;
}

/// Writes notifications to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipients: &[String], message: &str) -> Result<()> {
        tracing::info!(?recipients, %message, "assignment notification");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    recipients: &'a [String],
}

/// Posts Slack-style `{"text": ...}` payloads to an incoming-webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, recipients: &[String], message: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&WebhookPayload {
                text: message,
                recipients,
            })
            .send()
            .await
            .context("Failed to send notification webhook")?
            .error_for_status()
            .context("Notification webhook returned error status")?;
        Ok(())
    }
}

/// Pick the notifier for a deployment: a webhook when a URL is set, the log otherwise.
pub fn from_webhook_url(url: Option<&str>) -> Arc<dyn Notifier> {
    match url {
        Some(url) if !url.trim().is_empty() => Arc::new(WebhookNotifier::new(url.trim())),
        _ => Arc::new(LogNotifier),
    }
}

/// Message sent to users newly assigned to `task`.
pub fn assignment_message(actor: Option<&str>, app_url: &str, task: &Task) -> String {
    let actor = actor.filter(|a| !a.trim().is_empty()).unwrap_or("Someone");
    format!(
        "{} assigned you to task <{}/board/{}?taskId={}|{}>.",
        actor,
        app_url.trim_end_matches('/'),
        task.board_id,
        task.id,
        task.name
    )
}

/// Send `message` to `recipients` on a background task.
/// Returns `None` without spawning when there is nobody to notify.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
    message: String,
) -> Option<JoinHandle<()>> {
    if recipients.is_empty() {
        return None;
    }
    Some(tokio::spawn(async move {
        if let Err(e) = notifier.notify(&recipients, &message).await {
            tracing::warn!(error = %e, ?recipients, "failed to deliver assignment notification");
        }
    }))
}
