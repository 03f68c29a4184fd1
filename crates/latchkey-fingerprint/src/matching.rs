//! Fingerprint matching state machine.
//!
//! Runs continuously on the sensor node: poll for a finger, identify it
//! against the stored template database, open the door on a match. The
//! machine advances one state per [`update`] call and never blocks or
//! sleeps; all timing runs against the injected [`Clock`].
//!
//! # States
//!
//! - `Idle`: waiting for a finger; capture attempts are rate limited to one
//!   per [`MATCH_POLL_INTERVAL_MS`]
//! - `Processing`: an image was captured, convert it to a character buffer
//! - `Searching`: search the template database and emit the outcome effects
//! - `Settling`: cooldown of [`MATCH_SETTLE_MS`] so one press triggers one
//!   decision
//!
//! # Valid Transitions
//!
//! - Idle -> Processing -> Searching -> Settling -> Idle
//!
//! # Outcome Asymmetry
//!
//! A match notifies the peer board (which relays it upstream); a failed
//! match stays local by default, only sounding the buzzer. The camera node
//! would otherwise record and notify for every smudged press. Set
//! [`MatchingConfig::notify_on_failure`] to report failures too.
//!
//! [`update`]: MatchingMachine::update

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use latchkey_core::constants::{MATCH_POLL_INTERVAL_MS, MATCH_SETTLE_MS};
use latchkey_core::{Clock, EventType};
use latchkey_hardware::{CharBuffer, FingerprintModule, Melody, Result, SearchOutcome};
use latchkey_protocol::Message;

use crate::effect::Effect;

/// States of the matching flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Polling for a finger on the window.
    Idle,

    /// Image captured; converting to the search buffer.
    Processing,

    /// Searching the stored template database.
    Searching,

    /// Post-decision cooldown before polling resumes.
    Settling,
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchState::Idle => "Idle",
            MatchState::Processing => "Processing",
            MatchState::Searching => "Searching",
            MatchState::Settling => "Settling",
        };
        write!(f, "{s}")
    }
}

impl MatchState {
    /// Check if a transition to `target` is part of the matching flow.
    pub fn can_transition_to(&self, target: &MatchState) -> bool {
        matches!(
            (self, target),
            (MatchState::Idle, MatchState::Processing)
                | (MatchState::Processing, MatchState::Searching)
                | (MatchState::Searching, MatchState::Settling)
                | (MatchState::Settling, MatchState::Idle)
        )
    }
}

/// Tunables for the matching machine.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Report failed matches to the peer board as sensor events.
    ///
    /// Off by default: failures stay local to the door.
    pub notify_on_failure: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            notify_on_failure: false,
        }
    }
}

/// Continuous fingerprint identification machine.
#[derive(Debug)]
pub struct MatchingMachine<C> {
    clock: C,
    config: MatchingConfig,
    state: MatchState,
    next_poll_at: Option<Instant>,
    settle_until: Option<Instant>,
}

impl<C: Clock> MatchingMachine<C> {
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, MatchingConfig::default())
    }

    pub fn with_config(clock: C, config: MatchingConfig) -> Self {
        Self {
            clock,
            config,
            state: MatchState::Idle,
            next_poll_at: None,
            settle_until: None,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Advance the machine by one state.
    ///
    /// Returns the effects the caller must apply. A sensor fault resets the
    /// machine into the settle cooldown (acting as a retry backoff) and
    /// propagates the error for logging.
    pub async fn update<F: FingerprintModule>(&mut self, sensor: &mut F) -> Result<Vec<Effect>> {
        let result = match self.state {
            MatchState::Idle => self.poll(sensor).await,
            MatchState::Processing => self.process(sensor).await,
            MatchState::Searching => self.search(sensor).await,
            MatchState::Settling => Ok(self.settle()),
        };

        if result.is_err() {
            warn!(state = %self.state, "sensor fault, backing off");
            self.enter_settling();
        }
        result
    }

    async fn poll<F: FingerprintModule>(&mut self, sensor: &mut F) -> Result<Vec<Effect>> {
        let now = self.clock.now();
        if let Some(at) = self.next_poll_at {
            if now < at {
                return Ok(Vec::new());
            }
        }

        if sensor.capture_image().await?.is_captured() {
            debug!("finger detected");
            self.state = MatchState::Processing;
        } else {
            self.next_poll_at = Some(now + Duration::from_millis(MATCH_POLL_INTERVAL_MS));
        }
        Ok(Vec::new())
    }

    async fn process<F: FingerprintModule>(&mut self, sensor: &mut F) -> Result<Vec<Effect>> {
        sensor.process_image(CharBuffer::One).await?;
        self.state = MatchState::Searching;
        Ok(Vec::new())
    }

    async fn search<F: FingerprintModule>(&mut self, sensor: &mut F) -> Result<Vec<Effect>> {
        let outcome = sensor.search().await?;
        self.enter_settling();

        match outcome {
            SearchOutcome::Match { slot, score } => {
                info!(slot = slot.value(), score, "fingerprint matched");
                Ok(vec![
                    Effect::SendMessage(Message::unlock_fingerprint(slot)),
                    Effect::Unlock,
                    Effect::Play(Melody::Success),
                ])
            }
            SearchOutcome::NoMatch => {
                info!("fingerprint not recognized");
                let mut effects = vec![Effect::Play(Melody::Failure)];
                if self.config.notify_on_failure {
                    effects.push(Effect::SendMessage(Message::sensor_event(
                        EventType::FingerprintFailure.code(),
                    )));
                }
                Ok(effects)
            }
        }
    }

    fn settle(&mut self) -> Vec<Effect> {
        if let Some(until) = self.settle_until {
            if self.clock.now() >= until {
                self.settle_until = None;
                self.next_poll_at = None;
                self.state = MatchState::Idle;
            }
        } else {
            self.state = MatchState::Idle;
        }
        Vec::new()
    }

    fn enter_settling(&mut self) {
        self.state = MatchState::Settling;
        self.settle_until = Some(self.clock.now() + Duration::from_millis(MATCH_SETTLE_MS));
    }
}
