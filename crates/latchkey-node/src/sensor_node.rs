//! STM32 sensor node board loop.
//!
//! Owns the door-side hardware: lock relay, motion and door sensors, the
//! fingerprint module and the buzzer, plus the serial link to the camera
//! node. Everything runs from [`tick`](SensorNode::tick); state machines
//! return effects and the node applies them, so no component reaches around
//! another to touch hardware.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use latchkey_core::{Clock, Error, EventType, FingerprintId, Result};
use latchkey_fingerprint::{Effect, EnrollmentMachine, MatchingMachine};
use latchkey_hardware::{Buzzer, FingerprintModule, GpioPin, Melody, SensorInput};
use latchkey_lock::{LockController, SensorEvent, SensorManager};
use latchkey_protocol::{Message, Opcode, Port};

use crate::shell::Shell;

/// How long one tick waits for serial traffic before moving on.
const PORT_POLL: Duration = Duration::from_millis(1);

/// Debug shell actions for the sensor board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorShellAction {
    Unlock,
    ForceLock,
    Enroll,
    Delete,
    Status,
}

/// Command table for the sensor board's debug shell.
pub fn sensor_shell() -> Shell<SensorShellAction> {
    Shell::new()
        .command("unlock", "energize the lock relay", SensorShellAction::Unlock)
        .command("lock", "drop the relay immediately", SensorShellAction::ForceLock)
        .command(
            "enroll",
            "enroll a fingerprint: enroll <slot>",
            SensorShellAction::Enroll,
        )
        .command(
            "delete",
            "delete a stored fingerprint: delete <slot>",
            SensorShellAction::Delete,
        )
        .command("status", "report lock and enrollment state", SensorShellAction::Status)
}

/// The sensor-side board.
pub struct SensorNode<IO, F, P, S, B, C> {
    port: Port<IO>,
    fingerprint: F,
    lock: LockController<P, C>,
    sensors: SensorManager<S, C>,
    buzzer: B,
    matching: MatchingMachine<C>,
    enrollment: EnrollmentMachine<C>,
}

impl<IO, F, P, S, B, C> SensorNode<IO, F, P, S, B, C>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    F: FingerprintModule,
    P: GpioPin,
    S: SensorInput,
    B: Buzzer,
    C: Clock + Clone,
{
    pub fn new(
        port: Port<IO>,
        fingerprint: F,
        lock: LockController<P, C>,
        sensors: SensorManager<S, C>,
        buzzer: B,
        clock: C,
    ) -> Self {
        Self {
            port,
            fingerprint,
            lock,
            sensors,
            buzzer,
            matching: MatchingMachine::new(clock.clone()),
            enrollment: EnrollmentMachine::new(clock),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.lock.is_unlocked()
    }

    pub fn enrollment_active(&self) -> bool {
        self.enrollment.is_active()
    }

    /// Run one board loop iteration.
    pub async fn tick(&mut self) -> Result<()> {
        self.drain_port().await?;
        self.check_sensors().await?;
        self.lock.update().await.map_err(hw_err)?;
        self.drive_fingerprint().await?;
        Ok(())
    }

    async fn drain_port(&mut self) -> Result<()> {
        loop {
            match self.port.recv_timeout(PORT_POLL).await {
                Ok(Some(msg)) => self.handle_message(msg).await?,
                Ok(None) => return Ok(()),
                // Partial frame abandoned; the link recovers on its own
                Err(Error::ReceiveTimeout { .. }) => {
                    warn!("partial frame abandoned");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn handle_message(&mut self, msg: Message) -> Result<()> {
        match msg.opcode() {
            Opcode::Unlock => {
                info!("unlock command from camera node");
                self.lock.unlock().await.map_err(hw_err)?;
                self.buzzer.play(Melody::Success).await.map_err(hw_err)?;
                self.port.send(&Message::empty(Opcode::Ack)).await?;
            }
            Opcode::EnrollStart => {
                let Some(raw) = msg.first_byte() else {
                    warn!("enroll start without a slot byte");
                    return Ok(());
                };
                match FingerprintId::new(raw) {
                    Ok(slot) => {
                        let effects = self.enrollment.start(slot);
                        self.apply_effects(effects).await?;
                    }
                    Err(err) => warn!(raw, error = %err, "enroll start with invalid slot"),
                }
            }
            other => debug!(opcode = %other, "ignoring message not addressed to this board"),
        }
        Ok(())
    }

    async fn check_sensors(&mut self) -> Result<()> {
        for event in self.sensors.poll().await {
            let event_type = match event {
                SensorEvent::MotionDetected => EventType::MotionDetected,
                SensorEvent::DoorOpened => {
                    if self.lock.is_unlocked() {
                        EventType::DoorOpened
                    } else {
                        EventType::UnauthorizedDoorOpen
                    }
                }
                SensorEvent::DoorClosed => {
                    debug!("door closed");
                    continue;
                }
            };

            info!(%event_type, "reporting sensor event");
            self.port
                .send(&Message::sensor_event(event_type.code()))
                .await?;
            self.port.send(&Message::empty(Opcode::StartVideo)).await?;
        }
        Ok(())
    }

    /// Enrollment preempts matching; exactly one machine runs per tick.
    async fn drive_fingerprint(&mut self) -> Result<()> {
        let effects = if self.enrollment.is_active() {
            self.enrollment.update(&mut self.fingerprint).await
        } else {
            match self.matching.update(&mut self.fingerprint).await {
                Ok(effects) => effects,
                Err(err) => {
                    warn!(error = %err, "fingerprint sensor fault");
                    Vec::new()
                }
            }
        };
        self.apply_effects(effects).await
    }

    async fn apply_effects(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::SendMessage(msg) => self.port.send(&msg).await?,
                Effect::Unlock => self.lock.unlock().await.map_err(hw_err)?,
                Effect::Play(melody) => self.buzzer.play(melody).await.map_err(hw_err)?,
            }
        }
        Ok(())
    }

    /// Run one debug shell action and return its output line.
    pub async fn run_shell_action(
        &mut self,
        action: SensorShellAction,
        args: &[String],
    ) -> Result<String> {
        match action {
            SensorShellAction::Unlock => {
                self.lock.unlock().await.map_err(hw_err)?;
                Ok("door unlocked".into())
            }
            SensorShellAction::ForceLock => {
                self.lock.force_lock().await.map_err(hw_err)?;
                Ok("door locked".into())
            }
            SensorShellAction::Enroll => {
                let slot = parse_slot(args, "enroll")?;
                let effects = self.enrollment.start(slot);
                self.apply_effects(effects).await?;
                Ok(format!("enrolling into {slot}"))
            }
            SensorShellAction::Delete => {
                let slot = parse_slot(args, "delete")?;
                self.fingerprint.delete_model(slot).await.map_err(hw_err)?;
                info!(%slot, "template deleted");
                Ok(format!("deleted {slot}"))
            }
            SensorShellAction::Status => {
                let templates = self.fingerprint.template_count().await.map_err(hw_err)?;
                Ok(format!(
                    "lock: {}, enrollment: {}, templates: {templates}",
                    if self.lock.is_unlocked() { "open" } else { "closed" },
                    if self.enrollment.is_active() { "active" } else { "idle" },
                ))
            }
        }
    }
}

fn parse_slot(args: &[String], command: &str) -> Result<FingerprintId> {
    let raw = args
        .first()
        .ok_or_else(|| Error::InvalidValue(format!("usage: {command} <slot>")))?
        .parse::<u8>()
        .map_err(|_| Error::InvalidValue("slot must be a number".into()))?;
    FingerprintId::new(raw)
}

fn hw_err(err: latchkey_hardware::HardwareError) -> Error {
    Error::Hardware(err.to_string())
}
