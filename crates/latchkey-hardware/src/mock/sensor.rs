//! Mock sensor input with scripted samples.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::traits::SensorInput;
use crate::types::SensorKind;

#[derive(Debug)]
struct SampleQueue {
    queued: VecDeque<u16>,
    /// Returned when the queue runs dry; updated by each queued sample, so
    /// a sensor "holds" its last scripted reading.
    resting: u16,
}

/// Mock sensor input.
///
/// Replays queued samples in order; once exhausted it keeps returning the
/// last sample, matching how a real contact or PIR holds its level between
/// events.
#[derive(Debug)]
pub struct MockSensor {
    kind: SensorKind,
    samples: Arc<Mutex<SampleQueue>>,
}

impl MockSensor {
    pub fn new(kind: SensorKind) -> (Self, MockSensorHandle) {
        let samples = Arc::new(Mutex::new(SampleQueue {
            queued: VecDeque::new(),
            resting: 0,
        }));
        (
            Self {
                kind,
                samples: Arc::clone(&samples),
            },
            MockSensorHandle { samples },
        )
    }
}

impl SensorInput for MockSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    async fn sample(&mut self) -> Result<u16> {
        let mut q = self.samples.lock().expect("sensor lock poisoned");
        match q.queued.pop_front() {
            Some(v) => {
                q.resting = v;
                Ok(v)
            }
            None => Ok(q.resting),
        }
    }
}

/// Handle for scripting a [`MockSensor`].
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    samples: Arc<Mutex<SampleQueue>>,
}

impl MockSensorHandle {
    /// Queue one sample.
    pub fn push(&self, value: u16) {
        self.samples
            .lock()
            .expect("sensor lock poisoned")
            .queued
            .push_back(value);
    }

    /// Set the level held once the queue is exhausted.
    pub fn set_resting(&self, value: u16) {
        self.samples.lock().expect("sensor lock poisoned").resting = value;
    }
}
