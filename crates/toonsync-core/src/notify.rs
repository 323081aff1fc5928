// ── Notification bus ──
//
// Process-wide fan-out of user-visible status messages. The engine publishes
// here; front-ends subscribe and render. Publishing with no subscribers is
// not an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: Option<String>,
    pub message: String,
    /// How long a front-end should keep the notice up; its own default when
    /// `None`, until dismissed when zero.
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: None,
            message: message.into(),
            duration: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Broadcast channel of [`Notification`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Arc<Notification>>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish to every current subscriber.
    pub fn notify(&self, notification: Notification) {
        // Err only means nobody is listening.
        let _ = self.tx.send(Arc::new(notification));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationKind::Success, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationKind::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationKind::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationKind::Error, message));
    }

    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
