//! Side effects requested by the fingerprint state machines.
//!
//! The machines never touch the lock, buzzer or serial port themselves.
//! Each `update()` returns the effects the caller must apply, which keeps
//! the machines synchronous over their own state and directly testable:
//! a test asserts on the returned effects instead of instrumenting globals.

use latchkey_hardware::Melody;
use latchkey_protocol::Message;

/// An action the board loop must perform on behalf of a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message to the peer board.
    SendMessage(Message),
    /// Open the door lock.
    Unlock,
    /// Play a buzzer melody.
    Play(Melody),
}

impl Effect {
    pub fn is_message(&self) -> bool {
        matches!(self, Self::SendMessage(_))
    }
}
