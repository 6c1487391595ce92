//! Ledger event emission
//!
//! Events announce balance-setting and transfers to whoever listens. Emission
//! is fire-and-forget: a sink cannot fail the operation that produced the
//! event, and nothing is retried.

use crate::types::AccountId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum LedgerEvent {
    /// Mint overwrote an account balance
    SetAccountBalance {
        /// Credited account
        to: AccountId,
        /// New balance
        value: Decimal,
    },

    /// Escrowed funds moved from owner to spender
    TransferFrom {
        /// Debited account
        from: AccountId,
        /// Credited account
        to: AccountId,
        /// Amount moved
        value: Decimal,
    },
}

impl LedgerEvent {
    /// Event name as announced to listeners
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::SetAccountBalance { .. } => "SetAccountBalance",
            LedgerEvent::TransferFrom { .. } => "TransferFrom",
        }
    }
}

/// Event with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Emission timestamp
    pub emitted_at: DateTime<Utc>,

    /// Payload
    #[serde(flatten)]
    pub event: LedgerEvent,
}

impl EventEnvelope {
    /// Wrap an event with a fresh ID and timestamp
    pub fn new(event: LedgerEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            emitted_at: Utc::now(),
            event,
        }
    }
}

/// Best-effort event sink
pub trait EventSink: Send + Sync {
    /// Deliver one event; must not panic
    fn emit(&self, envelope: &EventEnvelope);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _envelope: &EventEnvelope) {}
}

/// Sink that logs each event as a JSON line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, envelope: &EventEnvelope) {
        match serde_json::to_string(envelope) {
            Ok(payload) => tracing::info!(
                target: "datamarket_ledger::events",
                event = envelope.event.name(),
                %payload,
                "Ledger event"
            ),
            Err(e) => tracing::warn!(
                event = envelope.event.name(),
                error = %e,
                "Failed to encode ledger event"
            ),
        }
    }
}

/// Sink that keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingSink {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Drop everything recorded
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, envelope: &EventEnvelope) {
        self.events.lock().push(envelope.clone());
    }
}
