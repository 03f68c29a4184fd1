//! Shared types for peripheral devices.

use std::fmt;

/// Logic level of a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Low,
    High,
}

impl PinState {
    pub fn is_high(&self) -> bool {
        matches!(self, Self::High)
    }
}

/// Kind of sensor attached to the sensor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Analog PIR motion sensor; readings above the threshold mean motion.
    Motion,
    /// Magnetic door contact; 0 = closed, nonzero = open.
    DoorContact,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Motion => "motion",
            Self::DoorContact => "door contact",
        };
        write!(f, "{s}")
    }
}

/// A single raw sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub value: u16,
}

/// Buzzer melodies used for audible feedback.
///
/// The concrete tone sequences live in the buzzer driver; callers only name
/// the occasion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Melody {
    /// Played once on boot.
    Startup,
    /// Successful match or completed enrollment.
    Success,
    /// Failed match or aborted enrollment.
    Failure,
    /// Door held open or unauthorized opening.
    Warning,
}

impl fmt::Display for Melody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Startup => "startup",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_state_predicates() {
        assert!(PinState::High.is_high());
        assert!(!PinState::Low.is_high());
    }

    #[test]
    fn sensor_kind_display() {
        assert_eq!(SensorKind::Motion.to_string(), "motion");
        assert_eq!(SensorKind::DoorContact.to_string(), "door contact");
    }
}
