use std::sync::Mutex;

/// Sink for short-lived, user-visible error notifications.
pub trait Toaster: Send + Sync {
    fn error(&self, message: &str);
}

/// Emits toasts as log events.
pub struct LogToaster;

impl Toaster for LogToaster {
    fn error(&self, message: &str) {
        tracing::warn!(toast = %message, "error toast");
    }
}

/// Collects toasts for a UI loop to drain and render.
#[derive(Default)]
pub struct ToastQueue {
    pending: Mutex<Vec<String>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending toast, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Toaster for ToastQueue {
    fn error(&self, message: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}
