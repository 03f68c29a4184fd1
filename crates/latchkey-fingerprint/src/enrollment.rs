//! Fingerprint enrollment state machine.
//!
//! Guides a user through the two-capture enrollment sequence: press, remove,
//! press again, then the sensor fuses both captures into a template and
//! stores it in the requested slot. Prompts and the final verdict travel to
//! the peer board as messages; the peer relays them to the user interface.
//!
//! # Valid Transitions
//!
//! - Idle -> WaitFirstPress (on `start`)
//! - WaitFirstPress -> WaitRemove -> WaitSecondPress -> CreatingModel ->
//!   StoringModel -> Idle
//! - any active state -> Idle (failure)
//!
//! Every started sequence terminates with exactly one enrollment result
//! message: success, or a failure carrying the reason code. Sensor faults
//! mid-sequence are folded into that failure message rather than propagated,
//! so the peer board never sees a sequence end silently.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use latchkey_core::constants::{ENROLL_PRESS_TIMEOUT_MS, ENROLL_REMOVE_TIMEOUT_MS};
use latchkey_core::{Clock, EnrollError, FingerprintId, UserPrompt};
use latchkey_hardware::{CharBuffer, FingerprintModule, HardwareError, Melody, ModelOutcome};
use latchkey_protocol::Message;

use crate::effect::Effect;

/// States of the enrollment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollState {
    /// No enrollment in progress.
    Idle,

    /// Waiting for the first finger press.
    WaitFirstPress,

    /// First capture taken; waiting for the finger to lift.
    WaitRemove,

    /// Waiting for the second press of the same finger.
    WaitSecondPress,

    /// Fusing the two captures into a template.
    CreatingModel,

    /// Writing the template into its flash slot.
    StoringModel,
}

impl fmt::Display for EnrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnrollState::Idle => "Idle",
            EnrollState::WaitFirstPress => "WaitFirstPress",
            EnrollState::WaitRemove => "WaitRemove",
            EnrollState::WaitSecondPress => "WaitSecondPress",
            EnrollState::CreatingModel => "CreatingModel",
            EnrollState::StoringModel => "StoringModel",
        };
        write!(f, "{s}")
    }
}

impl EnrollState {
    /// Check if a transition to `target` is part of the enrollment flow.
    pub fn can_transition_to(&self, target: &EnrollState) -> bool {
        match (self, target) {
            (EnrollState::Idle, EnrollState::WaitFirstPress)
            | (EnrollState::WaitFirstPress, EnrollState::WaitRemove)
            | (EnrollState::WaitRemove, EnrollState::WaitSecondPress)
            | (EnrollState::WaitSecondPress, EnrollState::CreatingModel)
            | (EnrollState::CreatingModel, EnrollState::StoringModel) => true,
            // Any active state can abort back to Idle
            (from, EnrollState::Idle) => *from != EnrollState::Idle,
            _ => false,
        }
    }
}

/// Two-capture enrollment machine.
///
/// Advances one state per [`update`](Self::update) call; timing runs against
/// the injected [`Clock`].
#[derive(Debug)]
pub struct EnrollmentMachine<C> {
    clock: C,
    state: EnrollState,
    slot: Option<FingerprintId>,
    deadline: Option<Instant>,
}

impl<C: Clock> EnrollmentMachine<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: EnrollState::Idle,
            slot: None,
            deadline: None,
        }
    }

    pub fn state(&self) -> EnrollState {
        self.state
    }

    /// Whether an enrollment sequence is in progress.
    pub fn is_active(&self) -> bool {
        self.state != EnrollState::Idle
    }

    /// Begin enrolling into `slot`.
    ///
    /// A start request while a sequence is already running is ignored, so
    /// the running sequence still produces its single result message.
    pub fn start(&mut self, slot: FingerprintId) -> Vec<Effect> {
        if self.is_active() {
            warn!(state = %self.state, "enroll start ignored, sequence in progress");
            return Vec::new();
        }
        info!(slot = slot.value(), "enrollment started");
        self.slot = Some(slot);
        self.state = EnrollState::WaitFirstPress;
        self.arm_deadline(ENROLL_PRESS_TIMEOUT_MS);
        Self::prompt_effects(UserPrompt::PlaceFinger)
    }

    /// Advance the machine by one state.
    ///
    /// Sensor faults do not surface as errors here; they terminate the
    /// sequence with a failure message instead.
    pub async fn update<F: FingerprintModule>(&mut self, sensor: &mut F) -> Vec<Effect> {
        let step = match self.state {
            EnrollState::Idle => return Vec::new(),
            EnrollState::WaitFirstPress => self.wait_press(sensor, CharBuffer::One).await,
            EnrollState::WaitRemove => self.wait_remove(sensor).await,
            EnrollState::WaitSecondPress => self.wait_press(sensor, CharBuffer::Two).await,
            EnrollState::CreatingModel => self.create_model(sensor).await,
            EnrollState::StoringModel => self.store_model(sensor).await,
        };

        match step {
            Ok(effects) => effects,
            Err(err) => {
                warn!(state = %self.state, error = %err, "sensor fault during enrollment");
                self.fail(EnrollError::SensorError)
            }
        }
    }

    async fn wait_press<F: FingerprintModule>(
        &mut self,
        sensor: &mut F,
        buffer: CharBuffer,
    ) -> Result<Vec<Effect>, HardwareError> {
        if self.deadline_passed() {
            return Ok(self.fail(EnrollError::Timeout));
        }
        if !sensor.capture_image().await?.is_captured() {
            return Ok(Vec::new());
        }
        sensor.process_image(buffer).await?;

        match buffer {
            CharBuffer::One => {
                self.state = EnrollState::WaitRemove;
                self.arm_deadline(ENROLL_REMOVE_TIMEOUT_MS);
                Ok(Self::prompt_effects(UserPrompt::RemoveFinger))
            }
            CharBuffer::Two => {
                self.state = EnrollState::CreatingModel;
                self.deadline = None;
                Ok(Vec::new())
            }
        }
    }

    async fn wait_remove<F: FingerprintModule>(
        &mut self,
        sensor: &mut F,
    ) -> Result<Vec<Effect>, HardwareError> {
        if self.deadline_passed() {
            return Ok(self.fail(EnrollError::Timeout));
        }
        if sensor.capture_image().await?.is_captured() {
            // Finger still down
            return Ok(Vec::new());
        }
        self.state = EnrollState::WaitSecondPress;
        self.arm_deadline(ENROLL_PRESS_TIMEOUT_MS);
        Ok(Self::prompt_effects(UserPrompt::PlaceAgain))
    }

    async fn create_model<F: FingerprintModule>(
        &mut self,
        sensor: &mut F,
    ) -> Result<Vec<Effect>, HardwareError> {
        match sensor.create_model().await? {
            ModelOutcome::Created => {
                self.state = EnrollState::StoringModel;
                Ok(Vec::new())
            }
            ModelOutcome::Mismatch => Ok(self.fail(EnrollError::Mismatch)),
        }
    }

    async fn store_model<F: FingerprintModule>(
        &mut self,
        sensor: &mut F,
    ) -> Result<Vec<Effect>, HardwareError> {
        let slot = self.slot.take().ok_or_else(|| {
            HardwareError::other("enrollment storing state without a target slot")
        })?;

        match sensor.store_model(slot).await {
            Ok(()) => {
                info!(slot = slot.value(), "enrollment complete");
                self.reset();
                Ok(vec![
                    Effect::SendMessage(Message::enroll_success(slot)),
                    Effect::Play(Melody::Success),
                ])
            }
            Err(HardwareError::TemplateStorageError { .. }) => {
                Ok(self.fail(EnrollError::StorageFailed))
            }
            Err(err) => Err(err),
        }
    }

    /// One prompt message plus an attention beep, emitted on entry to every
    /// state that needs a user action.
    fn prompt_effects(prompt: UserPrompt) -> Vec<Effect> {
        vec![
            Effect::SendMessage(Message::prompt(prompt)),
            Effect::Play(Melody::Warning),
        ]
    }

    fn fail(&mut self, reason: EnrollError) -> Vec<Effect> {
        info!(%reason, "enrollment failed");
        self.reset();
        vec![
            Effect::SendMessage(Message::enroll_failure(reason)),
            Effect::Play(Melody::Failure),
        ]
    }

    fn reset(&mut self) {
        self.state = EnrollState::Idle;
        self.slot = None;
        self.deadline = None;
    }

    fn arm_deadline(&mut self, ms: u64) {
        self.deadline = Some(self.clock.now() + Duration::from_millis(ms));
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| self.clock.now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::ManualClock;
    use latchkey_hardware::mock::{MockFingerprint, MockFingerprintHandle};
    use latchkey_hardware::CaptureOutcome;
    use latchkey_protocol::Opcode;

    fn machine() -> (
        EnrollmentMachine<ManualClock>,
        MockFingerprint,
        MockFingerprintHandle,
        ManualClock,
    ) {
        let clock = ManualClock::new();
        let (sensor, handle) = MockFingerprint::new();
        (EnrollmentMachine::new(clock.clone()), sensor, handle, clock)
    }

    fn slot(n: u8) -> FingerprintId {
        FingerprintId::new(n).unwrap()
    }

    fn result_messages(effects: &[Effect]) -> Vec<&Message> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::SendMessage(m)
                    if matches!(m.opcode(), Opcode::EnrollSuccess | Opcode::EnrollFailure) =>
                {
                    Some(m)
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn happy_path_stores_template_and_reports_success() {
        let (mut m, mut sensor, handle, _clock) = machine();

        let effects = m.start(slot(7));
        assert_eq!(
            effects,
            vec![
                Effect::SendMessage(Message::prompt(UserPrompt::PlaceFinger)),
                Effect::Play(Melody::Warning),
            ]
        );

        // First press
        handle.queue_capture(CaptureOutcome::Captured);
        let effects = m.update(&mut sensor).await;
        assert_eq!(m.state(), EnrollState::WaitRemove);
        assert_eq!(
            effects,
            vec![
                Effect::SendMessage(Message::prompt(UserPrompt::RemoveFinger)),
                Effect::Play(Melody::Warning),
            ]
        );

        // Finger lifts (default capture outcome is NoFinger)
        let effects = m.update(&mut sensor).await;
        assert_eq!(m.state(), EnrollState::WaitSecondPress);
        assert_eq!(
            effects,
            vec![
                Effect::SendMessage(Message::prompt(UserPrompt::PlaceAgain)),
                Effect::Play(Melody::Warning),
            ]
        );

        // Second press, then model creation and store
        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        m.update(&mut sensor).await;
        let effects = m.update(&mut sensor).await;

        assert_eq!(
            effects,
            vec![
                Effect::SendMessage(Message::enroll_success(slot(7))),
                Effect::Play(Melody::Success),
            ]
        );
        assert_eq!(handle.stored_slots(), vec![7]);
        assert!(!m.is_active());
    }

    #[tokio::test]
    async fn press_timeout_emits_single_failure() {
        let (mut m, mut sensor, handle, clock) = machine();
        m.start(slot(3));

        // Poll a few times with no finger, then cross the deadline
        m.update(&mut sensor).await;
        m.update(&mut sensor).await;
        clock.advance(ENROLL_PRESS_TIMEOUT_MS);
        let effects = m.update(&mut sensor).await;

        assert_eq!(
            effects,
            vec![
                Effect::SendMessage(Message::enroll_failure(EnrollError::Timeout)),
                Effect::Play(Melody::Failure),
            ]
        );
        assert!(!m.is_active());

        // Exactly one terminal frame, with the timeout reason byte
        let results = result_messages(&effects);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].encode(), vec![0xAA, 0x51, 0x01, 0x01, 0x53]);

        // Further updates stay silent
        assert!(m.update(&mut sensor).await.is_empty());
        let _ = handle;
    }

    #[tokio::test]
    async fn remove_timeout_fails_with_timeout_reason() {
        let (mut m, mut sensor, handle, clock) = machine();
        m.start(slot(3));

        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        assert_eq!(m.state(), EnrollState::WaitRemove);

        // Finger never lifts
        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        clock.advance(ENROLL_REMOVE_TIMEOUT_MS);
        let effects = m.update(&mut sensor).await;

        assert!(effects.contains(&Effect::SendMessage(Message::enroll_failure(
            EnrollError::Timeout
        ))));
        assert!(!m.is_active());
    }

    #[tokio::test]
    async fn capture_mismatch_reports_mismatch() {
        let (mut m, mut sensor, handle, _clock) = machine();
        m.start(slot(5));

        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await; // first press
        m.update(&mut sensor).await; // remove
        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await; // second press
        handle.queue_model(ModelOutcome::Mismatch);
        let effects = m.update(&mut sensor).await;

        assert_eq!(
            effects,
            vec![
                Effect::SendMessage(Message::enroll_failure(EnrollError::Mismatch)),
                Effect::Play(Melody::Failure),
            ]
        );
        assert!(handle.stored_slots().is_empty());
    }

    #[tokio::test]
    async fn store_rejection_reports_storage_failure() {
        let (mut m, mut sensor, handle, _clock) = machine();
        m.start(slot(5));

        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        m.update(&mut sensor).await;
        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        m.update(&mut sensor).await; // create model
        handle.fail_next_store("flash write failed");
        let effects = m.update(&mut sensor).await;

        assert!(effects.contains(&Effect::SendMessage(Message::enroll_failure(
            EnrollError::StorageFailed
        ))));
        assert!(handle.stored_slots().is_empty());
    }

    #[tokio::test]
    async fn sensor_fault_mid_sequence_ends_with_sensor_error() {
        let (mut m, mut sensor, handle, _clock) = machine();
        m.start(slot(2));

        handle.fail_next_capture("bus noise");
        let effects = m.update(&mut sensor).await;

        let results = result_messages(&effects);
        assert_eq!(results.len(), 1);
        assert_eq!(
            *results[0],
            Message::enroll_failure(EnrollError::SensorError)
        );
        assert!(!m.is_active());
    }

    #[tokio::test]
    async fn start_while_active_is_ignored() {
        let (mut m, mut sensor, handle, _clock) = machine();
        m.start(slot(2));

        assert!(m.start(slot(9)).is_empty());
        assert_eq!(m.state(), EnrollState::WaitFirstPress);

        // The running sequence still targets the original slot
        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        m.update(&mut sensor).await;
        handle.queue_capture(CaptureOutcome::Captured);
        m.update(&mut sensor).await;
        m.update(&mut sensor).await;
        m.update(&mut sensor).await;
        assert_eq!(handle.stored_slots(), vec![2]);
    }

    #[test]
    fn transition_table() {
        use EnrollState::*;
        assert!(Idle.can_transition_to(&WaitFirstPress));
        assert!(WaitFirstPress.can_transition_to(&WaitRemove));
        assert!(StoringModel.can_transition_to(&Idle));
        assert!(CreatingModel.can_transition_to(&Idle));
        assert!(!Idle.can_transition_to(&Idle));
        assert!(!WaitRemove.can_transition_to(&CreatingModel));
    }
}
