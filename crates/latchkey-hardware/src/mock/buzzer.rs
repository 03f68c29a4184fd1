//! Mock buzzer recording played melodies.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::traits::Buzzer;
use crate::types::Melody;

/// Mock buzzer.
///
/// Playing completes instantly; the handle exposes the sequence of melodies
/// for assertions.
#[derive(Debug)]
pub struct MockBuzzer {
    played: Arc<Mutex<Vec<Melody>>>,
}

impl MockBuzzer {
    pub fn new() -> (Self, MockBuzzerHandle) {
        let played = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                played: Arc::clone(&played),
            },
            MockBuzzerHandle { played },
        )
    }
}

impl Buzzer for MockBuzzer {
    async fn play(&mut self, melody: Melody) -> Result<()> {
        self.played.lock().expect("buzzer lock poisoned").push(melody);
        Ok(())
    }
}

/// Handle for inspecting a [`MockBuzzer`].
#[derive(Debug, Clone)]
pub struct MockBuzzerHandle {
    played: Arc<Mutex<Vec<Melody>>>,
}

impl MockBuzzerHandle {
    /// Melodies played so far, in order.
    pub fn played(&self) -> Vec<Melody> {
        self.played.lock().expect("buzzer lock poisoned").clone()
    }
}
