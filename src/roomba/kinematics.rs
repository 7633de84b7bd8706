// Differential-drive kinematics for the Roomba base
// Converts encoder counts to wheel travel and relates wheel travel, turn radius
// and swept angle on a circular arc. All angles are radians.

use std::f64::consts::PI;

use crate::config::{Calibration, MAX_ENCODER_COUNT, ROLLOVER_GUARD};

/// Sense in which the heading rotates during a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Counter-clockwise, heading increases
    Left,
    /// Clockwise, heading decreases
    Right,
}

/// Sign of the mean wheel travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forwards,
    Backwards,
}

/// Convert encoder counts to wheel travel in millimetres
pub fn encoder_counts_to_millimeters(counts: i32, calibration: &Calibration) -> f64 {
    counts as f64 * calibration.millimeters_per_count()
}

/// Heading change produced by the given wheel travel
///
/// Positive is counter-clockwise, so a right turn (left wheel travelling
/// further) yields a negative angle.
pub fn heading_delta_from_wheel_travel(left_mm: f64, right_mm: f64, wheelbase_mm: f64) -> f64 {
    (right_mm - left_mm) / wheelbase_mm
}

/// Radius of the arc of length `arc_distance` sweeping `angle`
///
/// Undefined for a zero angle, callers handle straight-line motion first.
pub fn turn_radius_from_arc(angle: f64, arc_distance: f64) -> f64 {
    arc_distance / angle
}

pub fn arc_distance_from_radius(angle: f64, radius: f64) -> f64 {
    radius * angle
}

/// Straight-line distance between the ends of an arc
pub fn chord_distance(angle: f64, radius: f64) -> f64 {
    let r2 = radius.powi(2);
    (2.0 * r2 - 2.0 * r2 * angle.cos()).sqrt()
}

/// Angle between the chord and the radius at the end of an arc
///
/// Law of sines on the triangle formed by the two radii and the chord.
/// Valid for `0 < angle < PI`, where the chord is non-zero.
pub fn chord_turn_angle(angle: f64, chord: f64, radius: f64) -> f64 {
    PI - angle - (radius * angle.sin() / chord).asin()
}

/// Side adjacent to `angle` in a right triangle
pub fn near_side_length(angle: f64, hypotenuse: f64) -> f64 {
    hypotenuse * angle.cos()
}

/// Side opposite `angle` in a right triangle
pub fn far_side_length(angle: f64, hypotenuse: f64) -> f64 {
    hypotenuse * angle.sin()
}

/// Point at `angle` on a circle of `radius` around the turn centre
///
/// When the turn centre lies to the robot's right (a clockwise turn driving
/// forwards, or a counter-clockwise turn reversing) the robot starts on the
/// far side of the circle, hence the half-turn phase shift.
pub fn point_on_circle(angle: f64, radius: f64, side: Side, direction: Direction) -> (f64, f64) {
    let phase = match (side, direction) {
        (Side::Right, Direction::Forwards) | (Side::Left, Direction::Backwards) => angle + PI,
        _ => angle,
    };
    (
        near_side_length(phase, radius),
        far_side_length(phase, radius),
    )
}

/// Change between two encoder readings, accounting for counter rollover
pub fn change_in_encoder_counts(last: i16, current: i16) -> i32 {
    change_in_encoder_counts_with(last, current, MAX_ENCODER_COUNT, ROLLOVER_GUARD)
}

/// Rollover-safe encoder delta with custom counter range and guard margin
///
/// A rollover is only assumed when the raw delta flips sign against the
/// rolled delta and is already within `guard` counts of the full range.
pub fn change_in_encoder_counts_with(last: i16, current: i16, max_count: i32, guard: i32) -> i32 {
    let last = last as i32;
    let current = current as i32;

    let count = current - last;
    let forward_roll = (current + max_count) - last;
    let backward_roll = current - (last + max_count);
    let near_full_range = count.abs() > max_count - guard;

    if !same_sign(count, forward_roll) && near_full_range {
        forward_roll
    } else if !same_sign(count, backward_roll) && near_full_range {
        backward_roll
    } else {
        count
    }
}

/// Zero counts as positive
fn same_sign(a: i32, b: i32) -> bool {
    (a ^ b) >= 0
}
