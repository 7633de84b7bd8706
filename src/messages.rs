// Define message types published by the runtime

use serde::{Deserialize, Serialize};

use crate::roomba::SensorFrame;

/// Dead-reckoned pose after a processed frame
///
/// Position in millimetres from the session origin. Heading 0 faces +y and
/// grows counter-clockwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub heading_degrees: f64,
}

impl PoseSnapshot {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading,
            heading_degrees: heading.to_degrees(),
        }
    }
}

/// One telemetry entry handed to the telemetry sink per decoded frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub sequence: u64,
    pub safe: bool,
    pub pose: PoseSnapshot,
    pub frame: SensorFrame,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    HazardDetected,
    TelemetryStale,
}
