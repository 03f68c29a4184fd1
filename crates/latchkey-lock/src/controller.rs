//! Door lock relay controller.
//!
//! Owns the relay pin and all unlock timing. The controller never sleeps:
//! [`unlock`] energizes the relay and records a relock deadline against the
//! injected [`Clock`], and the board loop calls [`update`] every tick to
//! re-lock once the deadline passes. This keeps the sensor node responsive
//! while the door is open.
//!
//! [`unlock`]: LockController::unlock
//! [`update`]: LockController::update

use std::time::{Duration, Instant};

use tracing::{debug, info};

use latchkey_core::constants::UNLOCK_DURATION_MS;
use latchkey_core::Clock;
use latchkey_hardware::{GpioPin, Result};

/// Relay controller for the door lock.
#[derive(Debug)]
pub struct LockController<P, C> {
    pin: P,
    clock: C,
    unlock_duration: Duration,
    /// Set while the relay is energized.
    unlocked_at: Option<Instant>,
}

impl<P: GpioPin, C: Clock> LockController<P, C> {
    pub fn new(pin: P, clock: C) -> Self {
        Self::with_duration(pin, clock, Duration::from_millis(UNLOCK_DURATION_MS))
    }

    pub fn with_duration(pin: P, clock: C, unlock_duration: Duration) -> Self {
        Self {
            pin,
            clock,
            unlock_duration,
            unlocked_at: None,
        }
    }

    /// Energize the relay and start (or restart) the relock countdown.
    ///
    /// Calling while already unlocked extends the open window from now;
    /// two quick authorized events keep the door open, they do not queue
    /// two relocks.
    pub async fn unlock(&mut self) -> Result<()> {
        self.pin.set_high().await?;
        self.unlocked_at = Some(self.clock.now());
        info!(duration_ms = self.unlock_duration.as_millis() as u64, "door unlocked");
        Ok(())
    }

    /// Drop the relay immediately, cancelling any pending relock.
    pub async fn force_lock(&mut self) -> Result<()> {
        self.pin.set_low().await?;
        if self.unlocked_at.take().is_some() {
            info!("door force locked");
        }
        Ok(())
    }

    /// Relock if the open window has elapsed.
    ///
    /// Returns `true` when this call closed the lock.
    pub async fn update(&mut self) -> Result<bool> {
        let Some(opened) = self.unlocked_at else {
            return Ok(false);
        };

        if self.clock.now().saturating_duration_since(opened) >= self.unlock_duration {
            self.pin.set_low().await?;
            self.unlocked_at = None;
            debug!("unlock window elapsed, relocking");
            return Ok(true);
        }
        Ok(false)
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::ManualClock;
    use latchkey_hardware::mock::MockPin;
    use latchkey_hardware::PinState;

    fn controller() -> (
        LockController<MockPin, ManualClock>,
        latchkey_hardware::mock::MockPinHandle,
        ManualClock,
    ) {
        let clock = ManualClock::new();
        let (pin, handle) = MockPin::new();
        (LockController::new(pin, clock.clone()), handle, clock)
    }

    #[tokio::test]
    async fn starts_locked() {
        let (lock, handle, _clock) = controller();
        assert!(!lock.is_unlocked());
        assert_eq!(handle.state(), PinState::Low);
    }

    #[tokio::test]
    async fn relocks_after_duration_not_before() {
        let (mut lock, handle, clock) = controller();

        lock.unlock().await.unwrap();
        assert!(lock.is_unlocked());
        assert_eq!(handle.state(), PinState::High);

        // One millisecond early: still open
        clock.advance(2999);
        assert!(!lock.update().await.unwrap());
        assert!(lock.is_unlocked());
        assert_eq!(handle.state(), PinState::High);

        // Deadline reached: relocks
        clock.advance(1);
        assert!(lock.update().await.unwrap());
        assert!(!lock.is_unlocked());
        assert_eq!(handle.state(), PinState::Low);
    }

    #[tokio::test]
    async fn update_while_locked_is_noop() {
        let (mut lock, handle, clock) = controller();
        clock.advance(10_000);
        assert!(!lock.update().await.unwrap());
        assert!(handle.transitions().is_empty());
    }

    #[tokio::test]
    async fn reunlock_extends_open_window() {
        let (mut lock, _handle, clock) = controller();

        lock.unlock().await.unwrap();
        clock.advance(2000);
        lock.unlock().await.unwrap();

        // 2.5s after the second unlock, 4.5s after the first: still open
        clock.advance(2500);
        assert!(!lock.update().await.unwrap());
        assert!(lock.is_unlocked());

        clock.advance(500);
        assert!(lock.update().await.unwrap());
        assert!(!lock.is_unlocked());
    }

    #[tokio::test]
    async fn force_lock_cancels_pending_relock() {
        let (mut lock, handle, clock) = controller();

        lock.unlock().await.unwrap();
        lock.force_lock().await.unwrap();
        assert!(!lock.is_unlocked());
        assert_eq!(handle.state(), PinState::Low);

        // The old deadline must not fire later
        clock.advance(5000);
        assert!(!lock.update().await.unwrap());
    }
}
