//! Shared helpers for unit tests.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Collects the level and formatted message of every event it sees.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventRecorder {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl<S: Subscriber> Layer<S> for EventRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageVisitor(String::new());
        event.record(&mut message);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message.0));
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Events emitted while `f` runs, under a subscriber scoped to this thread.
pub(crate) fn capture_events<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    let recorder = EventRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    let events = recorder.events.lock().unwrap().clone();
    (out, events)
}

/// Messages recorded at exactly `level`.
pub(crate) fn messages_at(events: &[(Level, String)], level: Level) -> Vec<&str> {
    events
        .iter()
        .filter(|(l, _)| *l == level)
        .map(|(_, m)| m.as_str())
        .collect()
}
