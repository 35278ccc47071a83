//! Event system for elements
//!
//! Elements publish events through the sink handed to them by the graph
//! builder. The sink is shared and never owned by the element.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event raised by element code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementEvent {
    /// Application-defined event key
    pub key: String,
    /// Name of the emitting element
    pub element: String,
    pub payload: serde_json::Value,
}

/// Event envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub timestamp: u64,
    pub event: ElementEvent,
}

/// Event sink trait for emitting events
pub trait EventSink: Send + Sync {
    fn emit(&self, envelope: &EventEnvelope);
}

/// A simple logging event sink
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        tracing::debug!(
            sequence = envelope.sequence,
            element = %envelope.event.element,
            "Event {}: {}",
            envelope.event.key,
            envelope.event.payload
        );
    }
}

/// A buffering event sink that collects events
#[derive(Default)]
pub struct BufferingEventSink {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl BufferingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_events(&self) -> Vec<EventEnvelope> {
        self.events.read().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|envelope| envelope.event.key.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for BufferingEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        self.events.write().push(envelope.clone());
    }
}

/// Global sequence counter for events
static EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub fn next_sequence() -> u64 {
    EVENT_SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

/// Current timestamp in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Wrap an event in a sequenced envelope
pub fn envelope(event: ElementEvent) -> EventEnvelope {
    EventEnvelope {
        sequence: next_sequence(),
        timestamp: now_ms(),
        event,
    }
}
