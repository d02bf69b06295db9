//! Fire-and-forget notification events.
//!
//! The engine reports stage lifecycle moments (reminders, completions,
//! auto-skips) to a [`NotificationSink`]. Delivery is best-effort by
//! contract: sink failures are logged and swallowed, and events are only
//! handed to the sink after the ledger mutation they describe has committed,
//! so a failing sink can never block or roll back the core.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::notebook::NotebookId;

/// Kind of notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A stage is past its window but still inside its grace period.
    Reminder,
    /// A stage finished with all required observations confirmed.
    StageComplete,
    /// A stage was auto-skipped after its grace period ran out.
    StageSkipped,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Reminder => write!(f, "reminder"),
            EventKind::StageComplete => write!(f, "stage_complete"),
            EventKind::StageSkipped => write!(f, "stage_skipped"),
        }
    }
}

/// One event record handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub notebook_id: NotebookId,
    pub stage_number: u32,
    /// Event-specific context (day of life, days missed, ...).
    pub payload: serde_json::Value,
}

impl NotificationEvent {
    /// Build an event.
    #[must_use]
    pub fn new(
        kind: EventKind,
        notebook_id: NotebookId,
        stage_number: u32,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            notebook_id,
            stage_number,
            payload,
        }
    }
}

/// Accepts fire-and-forget event records.
pub trait NotificationSink: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine logs and swallows the error.
    fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

impl<S: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<S> {
    fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        (**self).notify(event)
    }
}

/// Sink that writes events to the tracing log. The default for the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        info!(
            kind = %event.kind,
            notebook = %event.notebook_id,
            stage = event.stage_number,
            payload = %event.payload,
            "notification"
        );
        Ok(())
    }
}

/// Deliver a batch of events, swallowing (and logging) sink failures.
pub fn emit_all(sink: &dyn NotificationSink, events: &[NotificationEvent]) {
    for event in events {
        if let Err(e) = sink.notify(event) {
            warn!(
                kind = %event.kind,
                notebook = %event.notebook_id,
                stage = event.stage_number,
                "notification sink failed: {e}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn notify(&self, _event: &NotificationEvent) -> anyhow::Result<()> {
            anyhow::bail!("sink down")
        }
    }

    struct CountingSink(Mutex<u32>);

    impl NotificationSink for CountingSink {
        fn notify(&self, _event: &NotificationEvent) -> anyhow::Result<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn event(kind: EventKind) -> NotificationEvent {
        NotificationEvent::new(kind, NotebookId::new(), 1, serde_json::json!({}))
    }

    #[test]
    fn test_emit_all_swallows_failures() {
        let events = vec![event(EventKind::Reminder), event(EventKind::StageSkipped)];
        // Must not panic or propagate.
        emit_all(&FailingSink, &events);
    }

    #[test]
    fn test_emit_all_delivers_every_event() {
        let sink = CountingSink(Mutex::new(0));
        let events = vec![
            event(EventKind::Reminder),
            event(EventKind::StageComplete),
            event(EventKind::StageSkipped),
        ];
        emit_all(&sink, &events);
        assert_eq!(*sink.0.lock().unwrap(), 3);
    }

    #[test]
    fn test_event_serde() {
        let e = event(EventKind::StageComplete);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"stage_complete\""));
        let back: NotificationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
