use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastStyle {
    Success,
    Failure,
    Animated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub style: ToastStyle,
    pub title: String,
    pub message: Option<String>,
}

impl Toast {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            style: ToastStyle::Success,
            title: title.into(),
            message: None,
        }
    }

    /// In-progress notice; hosts render it with a spinner.
    pub fn animated(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            style: ToastStyle::Animated,
            title: title.into(),
            message: Some(message.into()),
        }
    }

    pub fn failure(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            style: ToastStyle::Failure,
            title: title.into(),
            message: Some(message.into()),
        }
    }
}

/// Host notification capability.
pub trait Notifier: Send + Sync {
    fn show(&self, toast: Toast);
}

/// Writes toasts to the log when no host surface is attached.
#[derive(Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, toast: Toast) {
        match toast.style {
            ToastStyle::Failure => error!(
                target: "toast",
                title = %toast.title,
                message = toast.message.as_deref().unwrap_or_default(),
                "failure"
            ),
            _ => info!(
                target: "toast",
                title = %toast.title,
                message = toast.message.as_deref().unwrap_or_default(),
                "notice"
            ),
        }
    }
}

/// Keeps every toast it is shown.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}
