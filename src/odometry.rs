//! Wheel-encoder dead reckoning
//!
//! Integrates rollover-safe encoder deltas into a pose using the circular-arc
//! model of a differential drive, so large single-step turns stay consistent
//! with the geometry instead of a midpoint approximation.

use tracing::debug;

use crate::config::Calibration;
use crate::messages::PoseSnapshot;
use crate::roomba::kinematics::{
    Direction, Side, change_in_encoder_counts_with, encoder_counts_to_millimeters,
    heading_delta_from_wheel_travel, point_on_circle, turn_radius_from_arc,
};
use crate::roomba::{EncoderReading, SensorFrame};

/// Position (mm) and heading (rad) relative to the session origin
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn snapshot(&self) -> PoseSnapshot {
        PoseSnapshot::new(self.x, self.y, self.heading)
    }
}

/// Holds the last encoder reading and the current pose for one session
pub struct OdometryIntegrator {
    calibration: Calibration,
    last: EncoderReading,
    pose: Pose,
    seeded: bool,
}

impl OdometryIntegrator {
    pub fn new(calibration: Calibration) -> Self {
        debug!(
            "Odometry: wheelbase={:.1}mm, {:.4}mm/count",
            calibration.wheelbase_mm,
            calibration.millimeters_per_count()
        );
        Self {
            calibration,
            last: EncoderReading::default(),
            pose: Pose::default(),
            seeded: false,
        }
    }

    /// Current pose without integrating anything
    pub fn pose(&self) -> PoseSnapshot {
        self.pose.snapshot()
    }

    /// Back to the origin; the next reading becomes the new baseline
    pub fn reset(&mut self) {
        self.last = EncoderReading::default();
        self.pose = Pose::default();
        self.seeded = false;
    }

    /// Integrate the encoder counts of a decoded frame
    ///
    /// Frames from packet groups without encoder counts leave the pose as is.
    pub fn process_frame(&mut self, frame: &SensorFrame) -> PoseSnapshot {
        if !frame.carries_encoders() {
            debug!("Odometry: group {} carries no encoder counts", frame.group);
            return self.pose();
        }
        self.update(frame.encoders)
    }

    /// Integrate one encoder reading
    ///
    /// The first reading of a session only seeds the baseline.
    pub fn update(&mut self, reading: EncoderReading) -> PoseSnapshot {
        if !self.seeded {
            self.last = reading;
            self.seeded = true;
            debug!(
                "Odometry: baseline encoders L={}, R={}",
                reading.left, reading.right
            );
            return self.pose();
        }

        let cal = &self.calibration;
        let left_counts = change_in_encoder_counts_with(
            self.last.left,
            reading.left,
            cal.max_encoder_count,
            cal.rollover_guard,
        );
        let right_counts = change_in_encoder_counts_with(
            self.last.right,
            reading.right,
            cal.max_encoder_count,
            cal.rollover_guard,
        );
        self.last = reading;

        let left_mm = encoder_counts_to_millimeters(left_counts, cal);
        let right_mm = encoder_counts_to_millimeters(right_counts, cal);
        let delta_heading = heading_delta_from_wheel_travel(left_mm, right_mm, cal.wheelbase_mm);

        let (dx, dy) = self.displacement(left_mm, right_mm, delta_heading);
        self.pose.x += dx;
        self.pose.y += dy;
        self.pose.heading += delta_heading;

        if left_counts != 0 || right_counts != 0 {
            debug!(
                "Odometry: dL={}, dR={}, dTheta={:.4}rad -> ({:.1}, {:.1}) {:.1}deg",
                left_counts,
                right_counts,
                delta_heading,
                self.pose.x,
                self.pose.y,
                self.pose.heading.to_degrees()
            );
        }

        self.pose()
    }

    /// World-frame displacement for one step starting at the current heading
    fn displacement(&self, left_mm: f64, right_mm: f64, delta_heading: f64) -> (f64, f64) {
        let travel = (left_mm + right_mm) / 2.0;

        // Robot frame: +y forward, +x to the right
        let (local_x, local_y) = if delta_heading.abs() < self.calibration.straight_line_epsilon {
            (0.0, travel)
        } else {
            let radius = turn_radius_from_arc(delta_heading, travel).abs();
            let side = if delta_heading > 0.0 {
                Side::Left
            } else {
                Side::Right
            };
            let direction = if travel >= 0.0 {
                Direction::Forwards
            } else {
                Direction::Backwards
            };

            let (start_x, start_y) = point_on_circle(0.0, radius, side, direction);
            let (end_x, end_y) = point_on_circle(delta_heading, radius, side, direction);
            (end_x - start_x, end_y - start_y)
        };

        let (sin, cos) = self.pose.heading.sin_cos();
        (
            local_x * cos - local_y * sin,
            local_x * sin + local_y * cos,
        )
    }
}
