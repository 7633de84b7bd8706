// Timeouts, topics, calibration
use std::time::Duration;

use crate::roomba::packet::PacketGroupId;

// Pause between acquisition cycles
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Telemetry silence watchdog
pub const SILENCE_THRESHOLD: Duration = Duration::from_millis(5000);

// Streaming group requested every cycle (all sensor packets 7-58)
pub const STREAM_GROUP: PacketGroupId = PacketGroupId::P100;

// Zenoh topics
pub const TOPIC_SENSORS: &str = "roomba/telemetry/sensors"; // decoded frames
pub const TOPIC_POSE: &str = "roomba/state/pose"; // dead-reckoned pose
pub const TOPIC_HEALTH: &str = "roomba/state/health"; // health status

// Serial link
pub const ROOMBA_PORT: &str = "/dev/ttyUSB0";
pub const ROOMBA_BAUDRATE: u32 = 115_200;

// Calibration (Roomba 500/600 series)
pub const WHEEL_DIAMETER_MM: f64 = 72.0;
pub const ENCODER_COUNTS_PER_WHEEL_TURN: f64 = 508.8;
pub const WHEELBASE_MM: f64 = 258.0;

// Encoder counters are 16 bit and wrap
pub const MAX_ENCODER_COUNT: i32 = 65_536;
pub const ROLLOVER_GUARD: i32 = 10_000;

// Below this heading change a step is integrated as a straight line
pub const STRAIGHT_LINE_EPSILON: f64 = 1e-9;

/// Robot-specific constants used by the kinematics and odometry code
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub wheel_diameter_mm: f64,
    pub counts_per_wheel_turn: f64,
    pub wheelbase_mm: f64,
    pub max_encoder_count: i32,
    pub rollover_guard: i32,
    pub straight_line_epsilon: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            wheel_diameter_mm: WHEEL_DIAMETER_MM,
            counts_per_wheel_turn: ENCODER_COUNTS_PER_WHEEL_TURN,
            wheelbase_mm: WHEELBASE_MM,
            max_encoder_count: MAX_ENCODER_COUNT,
            rollover_guard: ROLLOVER_GUARD,
            straight_line_epsilon: STRAIGHT_LINE_EPSILON,
        }
    }
}

impl Calibration {
    /// Wheel travel for a single encoder count
    pub fn millimeters_per_count(&self) -> f64 {
        std::f64::consts::PI * self.wheel_diameter_mm / self.counts_per_wheel_turn
    }
}

/// Settings for the acquisition loop
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub poll_interval: Duration,
    pub silence_threshold: Duration,
    pub stream_group: PacketGroupId,
    pub calibration: Calibration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            silence_threshold: SILENCE_THRESHOLD,
            stream_group: STREAM_GROUP,
            calibration: Calibration::default(),
        }
    }
}
