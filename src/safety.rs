// Safety interlock: decides per frame whether the robot may keep driving

use crate::roomba::{HazardFlags, SensorFrame};

/// Outcome of checking one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe { hazards: HazardFlags },
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Check the cliff, wheel-drop and overcurrent flags of a frame
pub fn evaluate(frame: &SensorFrame) -> SafetyVerdict {
    if frame.hazards.any() {
        SafetyVerdict::Unsafe {
            hazards: frame.hazards,
        }
    } else {
        SafetyVerdict::Safe
    }
}

pub fn is_safe(frame: &SensorFrame) -> bool {
    evaluate(frame).is_safe()
}
