//! Calibration state machine.
//!
//! The synchronizer alternates between two states and has no terminal one:
//! CALIBRATED → RECALIBRATING → CALIBRATED.

use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calibration states of the timestamp synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationState {
    /// Offset considered valid for the current schedule interval.
    #[default]
    Calibrated,
    /// Estimator actively sampling both clocks.
    Recalibrating,
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calibrated => write!(f, "CALIBRATED"),
            Self::Recalibrating => write!(f, "RECALIBRATING"),
        }
    }
}

impl CalibrationState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: CalibrationState) -> bool {
        use CalibrationState::{Calibrated, Recalibrating};

        matches!(
            (self, target),
            (Calibrated, Recalibrating) | (Recalibrating, Calibrated)
        )
    }

    /// Attempt to transition to `target`, returning error if invalid.
    pub fn transition_to(&mut self, target: CalibrationState) -> HubResult<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(HubError::Config(format!(
                "invalid calibration transition from {self} to {target}"
            )))
        }
    }

    /// Decode from the flag stored in the synchronizer's busy slot.
    #[inline]
    #[must_use]
    pub fn from_busy(busy: bool) -> Self {
        if busy {
            Self::Recalibrating
        } else {
            Self::Calibrated
        }
    }
}
