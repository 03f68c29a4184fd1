//! Sensor registry and edge detection.
//!
//! The sensor node polls its attached sensors once per check interval and
//! reports level changes as events. Raw levels never leave this module;
//! consumers only see edges (motion started, door opened, door closed),
//! which keeps the serial link quiet while nothing changes.

use std::time::Instant;

use tracing::{debug, warn};

use latchkey_core::constants::{MAX_SENSORS, MOTION_THRESHOLD, SENSOR_CHECK_INTERVAL_MS};
use latchkey_core::Clock;
use latchkey_hardware::{HardwareError, Result, SensorInput, SensorKind};

/// Edge-triggered sensor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    /// Motion level crossed the threshold upward.
    MotionDetected,
    /// Door contact opened.
    DoorOpened,
    /// Door contact closed.
    DoorClosed,
}

struct Channel<S> {
    sensor: S,
    /// Previous sample, for edge detection. None until first poll.
    last: Option<u16>,
}

/// Polls registered sensors and converts level changes into events.
///
/// Holds at most [`MAX_SENSORS`] channels. Polling is rate limited to one
/// sweep per [`SENSOR_CHECK_INTERVAL_MS`]; calls in between return no
/// events without touching the hardware.
pub struct SensorManager<S, C> {
    channels: Vec<Channel<S>>,
    clock: C,
    motion_threshold: u16,
    last_sweep: Option<Instant>,
}

impl<S: SensorInput, C: Clock> SensorManager<S, C> {
    pub fn new(clock: C) -> Self {
        Self {
            channels: Vec::new(),
            clock,
            motion_threshold: MOTION_THRESHOLD,
            last_sweep: None,
        }
    }

    pub fn with_motion_threshold(mut self, threshold: u16) -> Self {
        self.motion_threshold = threshold;
        self
    }

    /// Register a sensor channel.
    ///
    /// # Errors
    ///
    /// Returns an error once [`MAX_SENSORS`] channels are registered.
    pub fn register(&mut self, sensor: S) -> Result<()> {
        if self.channels.len() >= MAX_SENSORS {
            return Err(HardwareError::invalid_data(format!(
                "sensor limit reached ({MAX_SENSORS})"
            )));
        }
        debug!(kind = %sensor.kind(), "sensor registered");
        self.channels.push(Channel { sensor, last: None });
        Ok(())
    }

    pub fn sensor_count(&self) -> usize {
        self.channels.len()
    }

    /// Sweep all sensors if the check interval has elapsed.
    ///
    /// The first sweep establishes baselines and never emits events; a door
    /// that boots open is not an opening. A channel read failure is logged
    /// and skipped so one wedged sensor cannot blind the others.
    pub async fn poll(&mut self) -> Vec<SensorEvent> {
        let now = self.clock.now();
        if let Some(last) = self.last_sweep {
            let elapsed = now.saturating_duration_since(last).as_millis() as u64;
            if elapsed < SENSOR_CHECK_INTERVAL_MS {
                return Vec::new();
            }
        }
        self.last_sweep = Some(now);

        let mut events = Vec::new();
        for channel in &mut self.channels {
            let value = match channel.sensor.sample().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(kind = %channel.sensor.kind(), error = %e, "sensor read failed");
                    continue;
                }
            };

            if let Some(prev) = channel.last {
                if let Some(event) =
                    detect_edge(channel.sensor.kind(), prev, value, self.motion_threshold)
                {
                    debug!(kind = %channel.sensor.kind(), prev, value, ?event, "sensor edge");
                    events.push(event);
                }
            }
            channel.last = Some(value);
        }
        events
    }
}

/// Map a level change on one channel to an event, if it crossed an edge.
fn detect_edge(kind: SensorKind, prev: u16, value: u16, threshold: u16) -> Option<SensorEvent> {
    match kind {
        SensorKind::Motion => {
            if prev <= threshold && value > threshold {
                Some(SensorEvent::MotionDetected)
            } else {
                None
            }
        }
        SensorKind::DoorContact => match (prev, value) {
            (0, v) if v != 0 => Some(SensorEvent::DoorOpened),
            (p, 0) if p != 0 => Some(SensorEvent::DoorClosed),
            _ => None,
        },
    }
}
