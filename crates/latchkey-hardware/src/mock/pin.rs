//! Mock GPIO pin recording every transition.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::traits::GpioPin;
use crate::types::PinState;

#[derive(Debug)]
struct PinRecord {
    state: PinState,
    transitions: Vec<PinState>,
}

/// Mock GPIO output pin.
///
/// Starts low. Every `set_high`/`set_low` is appended to a transition log
/// the test can inspect through the handle, so lock timing tests can assert
/// the exact relay sequence.
#[derive(Debug)]
pub struct MockPin {
    record: Arc<Mutex<PinRecord>>,
}

impl MockPin {
    pub fn new() -> (Self, MockPinHandle) {
        let record = Arc::new(Mutex::new(PinRecord {
            state: PinState::Low,
            transitions: Vec::new(),
        }));
        (
            Self {
                record: Arc::clone(&record),
            },
            MockPinHandle { record },
        )
    }
}

impl GpioPin for MockPin {
    async fn set_high(&mut self) -> Result<()> {
        let mut rec = self.record.lock().expect("pin lock poisoned");
        rec.state = PinState::High;
        rec.transitions.push(PinState::High);
        Ok(())
    }

    async fn set_low(&mut self) -> Result<()> {
        let mut rec = self.record.lock().expect("pin lock poisoned");
        rec.state = PinState::Low;
        rec.transitions.push(PinState::Low);
        Ok(())
    }

    async fn state(&self) -> Result<PinState> {
        Ok(self.record.lock().expect("pin lock poisoned").state)
    }
}

/// Handle for inspecting a [`MockPin`].
#[derive(Debug, Clone)]
pub struct MockPinHandle {
    record: Arc<Mutex<PinRecord>>,
}

impl MockPinHandle {
    /// Current driven state.
    pub fn state(&self) -> PinState {
        self.record.lock().expect("pin lock poisoned").state
    }

    /// All transitions in write order.
    pub fn transitions(&self) -> Vec<PinState> {
        self.record
            .lock()
            .expect("pin lock poisoned")
            .transitions
            .clone()
    }
}
