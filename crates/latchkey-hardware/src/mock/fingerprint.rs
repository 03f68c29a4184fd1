//! Mock fingerprint module for testing and development.
//!
//! Simulates the serial fingerprint sensor by replaying scripted outcomes.
//! Each sensor operation pops the next scripted result for that operation;
//! when its queue is empty, a neutral default applies (no finger, no match,
//! model created, store accepted). This lets a test script exactly the
//! sensor behavior a state machine path needs without modeling timing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use latchkey_core::FingerprintId;

use crate::error::{HardwareError, Result};
use crate::traits::{CaptureOutcome, CharBuffer, FingerprintModule, ModelOutcome, SearchOutcome};

/// One scripted result: a value or a sensor fault message.
type Scripted<T> = std::result::Result<T, String>;

#[derive(Debug, Default)]
struct Script {
    captures: VecDeque<Scripted<CaptureOutcome>>,
    processes: VecDeque<Scripted<()>>,
    models: VecDeque<Scripted<ModelOutcome>>,
    stores: VecDeque<Scripted<()>>,
    searches: VecDeque<Scripted<SearchOutcome>>,
    stored_slots: Vec<u8>,
    calls: Vec<String>,
}

/// Mock fingerprint module.
///
/// # Examples
///
/// ```
/// use latchkey_hardware::mock::MockFingerprint;
/// use latchkey_hardware::traits::{CaptureOutcome, FingerprintModule};
///
/// #[tokio::main]
/// async fn main() -> latchkey_hardware::Result<()> {
///     let (mut sensor, handle) = MockFingerprint::new();
///
///     handle.queue_capture(CaptureOutcome::Captured);
///     assert_eq!(sensor.capture_image().await?, CaptureOutcome::Captured);
///
///     // Queue empty: defaults to no finger
///     assert_eq!(sensor.capture_image().await?, CaptureOutcome::NoFinger);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockFingerprint {
    script: Arc<Mutex<Script>>,
}

impl MockFingerprint {
    pub fn new() -> (Self, MockFingerprintHandle) {
        let script = Arc::new(Mutex::new(Script::default()));
        (
            Self {
                script: Arc::clone(&script),
            },
            MockFingerprintHandle { script },
        )
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }
}

impl FingerprintModule for MockFingerprint {
    async fn capture_image(&mut self) -> Result<CaptureOutcome> {
        self.with_script(|s| {
            s.calls.push("capture_image".into());
            match s.captures.pop_front() {
                Some(Ok(outcome)) => Ok(outcome),
                Some(Err(msg)) => Err(HardwareError::fingerprint(msg)),
                None => Ok(CaptureOutcome::NoFinger),
            }
        })
    }

    async fn process_image(&mut self, buffer: CharBuffer) -> Result<()> {
        self.with_script(|s| {
            s.calls.push(format!("process_image:{buffer:?}"));
            match s.processes.pop_front() {
                Some(Ok(())) => Ok(()),
                Some(Err(msg)) => Err(HardwareError::fingerprint(msg)),
                None => Ok(()),
            }
        })
    }

    async fn create_model(&mut self) -> Result<ModelOutcome> {
        self.with_script(|s| {
            s.calls.push("create_model".into());
            match s.models.pop_front() {
                Some(Ok(outcome)) => Ok(outcome),
                Some(Err(msg)) => Err(HardwareError::fingerprint(msg)),
                None => Ok(ModelOutcome::Created),
            }
        })
    }

    async fn store_model(&mut self, slot: FingerprintId) -> Result<()> {
        self.with_script(|s| {
            s.calls.push(format!("store_model:{}", slot.value()));
            match s.stores.pop_front() {
                Some(Ok(())) => {
                    s.stored_slots.push(slot.value());
                    Ok(())
                }
                Some(Err(msg)) => Err(HardwareError::template_storage(msg)),
                None => {
                    s.stored_slots.push(slot.value());
                    Ok(())
                }
            }
        })
    }

    async fn search(&mut self) -> Result<SearchOutcome> {
        self.with_script(|s| {
            s.calls.push("search".into());
            match s.searches.pop_front() {
                Some(Ok(outcome)) => Ok(outcome),
                Some(Err(msg)) => Err(HardwareError::fingerprint(msg)),
                None => Ok(SearchOutcome::NoMatch),
            }
        })
    }

    async fn delete_model(&mut self, slot: FingerprintId) -> Result<()> {
        self.with_script(|s| {
            s.calls.push(format!("delete_model:{}", slot.value()));
            s.stored_slots.retain(|&v| v != slot.value());
            Ok(())
        })
    }

    async fn template_count(&mut self) -> Result<u16> {
        self.with_script(|s| {
            s.calls.push("template_count".into());
            Ok(s.stored_slots.len() as u16)
        })
    }
}

/// Handle for scripting a [`MockFingerprint`].
#[derive(Debug, Clone)]
pub struct MockFingerprintHandle {
    script: Arc<Mutex<Script>>,
}

impl MockFingerprintHandle {
    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }

    /// Queue the outcome of the next `capture_image` call.
    pub fn queue_capture(&self, outcome: CaptureOutcome) {
        self.with_script(|s| s.captures.push_back(Ok(outcome)));
    }

    /// Queue a sensor fault for the next `capture_image` call.
    pub fn fail_next_capture(&self, message: impl Into<String>) {
        let msg = message.into();
        self.with_script(|s| s.captures.push_back(Err(msg)));
    }

    /// Queue a sensor fault for the next `process_image` call.
    pub fn fail_next_process(&self, message: impl Into<String>) {
        let msg = message.into();
        self.with_script(|s| s.processes.push_back(Err(msg)));
    }

    /// Queue the outcome of the next `create_model` call.
    pub fn queue_model(&self, outcome: ModelOutcome) {
        self.with_script(|s| s.models.push_back(Ok(outcome)));
    }

    /// Queue a rejection for the next `store_model` call.
    pub fn fail_next_store(&self, message: impl Into<String>) {
        let msg = message.into();
        self.with_script(|s| s.stores.push_back(Err(msg)));
    }

    /// Queue the outcome of the next `search` call.
    pub fn queue_search(&self, outcome: SearchOutcome) {
        self.with_script(|s| s.searches.push_back(Ok(outcome)));
    }

    /// Convenience: script a full successful finger press (capture succeeds
    /// and the database search matches the given slot).
    pub fn queue_matching_press(&self, slot: FingerprintId, score: u16) {
        self.queue_capture(CaptureOutcome::Captured);
        self.queue_search(SearchOutcome::Match { slot, score });
    }

    /// Convenience: script a press by an unenrolled finger.
    pub fn queue_unknown_press(&self) {
        self.queue_capture(CaptureOutcome::Captured);
        self.queue_search(SearchOutcome::NoMatch);
    }

    /// Preload a stored template, as if enrolled on an earlier boot.
    pub fn seed_template(&self, slot: u8) {
        self.with_script(|s| s.stored_slots.push(slot));
    }

    /// Slots written by `store_model` so far.
    pub fn stored_slots(&self) -> Vec<u8> {
        self.with_script(|s| s.stored_slots.clone())
    }

    /// Full journal of sensor operations, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.with_script(|s| s.calls.clone())
    }
}
