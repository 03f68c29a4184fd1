//! Bounded in-memory event log.
//!
//! The camera node accumulates the events observed during one recording
//! cycle here and turns them into the notification text once the clip is
//! uploaded. Memory is fixed: three slots, oldest overwritten silently.
//! Logging must never fail or push back on the caller.

use std::collections::VecDeque;
use std::time::Instant;

use latchkey_core::constants::{EVENT_DESCRIPTION_MAX, EVENT_SUMMARY_LIMIT, MAX_EVENT_SLOTS};
use latchkey_core::Clock;

/// One logged event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Milliseconds since `begin()`.
    pub timestamp_ms: u64,
    /// Wire code of the event, 0 for free-form serial messages.
    pub value: u8,
    pub description: String,
}

impl EventRecord {
    /// Timestamp rendered as `mm:ss.SSS`.
    pub fn formatted_timestamp(&self) -> String {
        let ms = self.timestamp_ms;
        format!("{:02}:{:02}.{:03}", ms / 60_000, (ms / 1_000) % 60, ms % 1_000)
    }
}

/// Fixed-capacity event log with silent oldest-overwrite.
#[derive(Debug)]
pub struct EventLogger<C> {
    clock: C,
    started_at: Option<Instant>,
    slots: VecDeque<EventRecord>,
    summary_limit: usize,
}

impl<C: Clock> EventLogger<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            started_at: None,
            slots: VecDeque::with_capacity(MAX_EVENT_SLOTS),
            summary_limit: EVENT_SUMMARY_LIMIT,
        }
    }

    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit;
        self
    }

    /// Start the log; timestamps are relative to this call.
    pub fn begin(&mut self) {
        self.started_at = Some(self.clock.now());
    }

    /// Record an event. A no-op before `begin()`; never fails.
    ///
    /// Descriptions longer than the slot width are truncated.
    pub fn log_event(&mut self, value: u8, description: &str) {
        let Some(started_at) = self.started_at else {
            return;
        };

        let description: String = description.chars().take(EVENT_DESCRIPTION_MAX).collect();
        if self.slots.len() == MAX_EVENT_SLOTS {
            self.slots.pop_front();
        }
        self.slots.push_back(EventRecord {
            timestamp_ms: self.clock.elapsed_ms(started_at),
            value,
            description,
        });
    }

    /// Record a free-form message received over the serial link.
    pub fn log_serial_message(&mut self, text: &str) {
        self.log_event(0, text);
    }

    pub fn has_events(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.slots.iter()
    }

    /// Chronological summary of the logged events.
    ///
    /// Events past the length limit are collapsed into a trailing
    /// `... and N more`.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mut rendered = 0usize;

        for record in &self.slots {
            let entry = format!(
                "[{}] {}",
                record.formatted_timestamp(),
                record.description
            );
            let sep = if out.is_empty() { 0 } else { 2 };
            if out.len() + sep + entry.len() > self.summary_limit {
                break;
            }
            if sep > 0 {
                out.push_str("; ");
            }
            out.push_str(&entry);
            rendered += 1;
        }

        let remaining = self.slots.len() - rendered;
        if remaining > 0 {
            out.push_str(&format!("... and {remaining} more"));
        }
        out
    }

    /// Drop all logged events. The log stays active.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
