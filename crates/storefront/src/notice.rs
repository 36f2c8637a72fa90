//! User-visible outcome channel.
//!
//! Every mutation resolution produces exactly one [`Notice`]: a success, a
//! failure, or a request to sign in. Views subscribe and render them as
//! transient toasts; the CLI prints them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Kind of notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Failure,
    /// The caller must sign in before retrying.
    SignInRequired,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Failure, message)
    }

    #[must_use]
    pub fn sign_in_required() -> Self {
        Self::new(NoticeKind::SignInRequired, "Please sign in to continue")
    }
}

/// Broadcasts notices to every subscriber.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    /// A notifier buffering up to `capacity` notices per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every notice emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice. Dropped silently when nobody is listening.
    pub fn emit(&self, notice: Notice) {
        tracing::debug!(kind = ?notice.kind, message = %notice.message, "notice");
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notices_in_order() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.emit(Notice::success("Quantity increased"));
        notifier.emit(Notice::failure("Out of stock"));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, NoticeKind::Success);
        assert_eq!(first.message, "Quantity increased");
        assert_eq!(rx.recv().await.unwrap().kind, NoticeKind::Failure);
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        Notifier::new(0).emit(Notice::sign_in_required());
    }

    #[test]
    fn test_notice_serializes_kind_in_snake_case() {
        let json = serde_json::to_value(Notice::sign_in_required()).unwrap();
        assert_eq!(json["kind"], "sign_in_required");
    }
}
