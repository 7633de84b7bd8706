// Acquisition loop with telemetry watchdog
// Each cycle: request one sensor packet, drain every queued frame, stop the
// robot on any hazard, integrate odometry, then sleep.
// Note: the watchdog only reports silence, it never aborts the loop

use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// local imports
use crate::config::RuntimeConfig;
use crate::messages::{RuntimeHealth, TelemetryRecord};
use crate::odometry::OdometryIntegrator;
use crate::roomba::{
    Command, CommandSink, DecodeError, FrameSource, PacketGroupId, PacketSizeTable, SensorFrame,
};
use crate::safety::{self, SafetyVerdict};
use crate::telemetry::TelemetrySink;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("No size known for packet group {0}")]
    UnknownPacketGroup(PacketGroupId),
}

/// Warns once per silence episode when no frame has arrived for too long
#[derive(Debug)]
pub struct SilenceWatchdog {
    threshold: Duration,
    last_frame_at: Instant,
    warned: bool,
}

impl SilenceWatchdog {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_frame_at: now,
            warned: false,
        }
    }

    /// A frame arrived: restart the timer and re-arm the warning
    pub fn on_frame(&mut self, now: Instant) {
        self.last_frame_at = now;
        self.warned = false;
    }

    /// Returns true exactly once when the silence exceeds the threshold
    pub fn check(&mut self, now: Instant) -> bool {
        let silent_for = now.saturating_duration_since(self.last_frame_at);
        if silent_for > self.threshold && !self.warned {
            self.warned = true;
            return true;
        }
        false
    }

    pub fn is_stale(&self) -> bool {
        self.warned
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub frames: usize,
    pub unsafe_frames: usize,
    pub decode_errors: usize,
    pub silence_warning: bool,
}

pub struct Runtime<S, C, T> {
    source: S,
    commands: C,
    telemetry: T,
    config: RuntimeConfig,
    odometry: OdometryIntegrator,
    watchdog: SilenceWatchdog,
    health: RuntimeHealth,
    sequence: u64,
    decode_errors: u64,
}

impl<S, C, T> Runtime<S, C, T>
where
    S: FrameSource,
    C: CommandSink,
    T: TelemetrySink,
{
    /// Build the loop; fails if the streaming group has no known size
    pub fn new(
        source: S,
        commands: C,
        telemetry: T,
        config: RuntimeConfig,
        sizes: &PacketSizeTable,
    ) -> Result<Self, RuntimeError> {
        let group = config.stream_group;
        let expected = sizes
            .size(group)
            .ok_or(RuntimeError::UnknownPacketGroup(group))?;
        debug!("Streaming group {} answers with {} bytes", group, expected);

        Ok(Self {
            source,
            commands,
            telemetry,
            odometry: OdometryIntegrator::new(config.calibration),
            watchdog: SilenceWatchdog::new(config.silence_threshold, Instant::now()),
            config,
            health: RuntimeHealth::TelemetryStale, // Start stale until first frame
            sequence: 0,
            decode_errors: 0,
        })
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn odometry(&self) -> &OdometryIntegrator {
        &self.odometry
    }

    /// Number of frames processed so far
    pub fn frames_processed(&self) -> u64 {
        self.sequence
    }

    /// Send a command, logging instead of failing the cycle
    fn send(&mut self, command: Command) {
        if let Err(e) = self.commands.send(&command) {
            warn!("Failed to send {:?}: {}", command, e);
        }
    }

    /// Process incoming frame
    fn on_frame(&mut self, frame: SensorFrame, now: Instant) -> SafetyVerdict {
        self.watchdog.on_frame(now);
        self.sequence += 1;

        let verdict = safety::evaluate(&frame);
        let pose = match verdict {
            SafetyVerdict::Unsafe { hazards } => {
                self.send(Command::Stop);
                warn!(
                    "Unsafe condition detected by sensors ({}), stopping robot",
                    hazards.active().join(", ")
                );
                self.health = RuntimeHealth::HazardDetected;
                self.odometry.pose()
            }
            SafetyVerdict::Safe => {
                self.health = RuntimeHealth::Ok;
                self.odometry.process_frame(&frame)
            }
        };

        self.telemetry.record(&TelemetryRecord {
            sequence: self.sequence,
            safe: verdict.is_safe(),
            pose,
            frame,
        });
        verdict
    }

    fn on_decode_error(&mut self, error: DecodeError) {
        self.decode_errors += 1;
        warn!("Dropping sensor frame: {}", error);
    }

    /// One acquisition cycle: request, drain everything queued, watchdog
    pub fn cycle(&mut self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();

        // 1. Ask for the next packet
        self.send(Command::RequestSensors(self.config.stream_group));

        // 2. Drain all pending frames (non-blocking)
        while let Some(result) = self.source.poll_frame() {
            match result {
                Ok(frame) => {
                    report.frames += 1;
                    if !self.on_frame(frame, now).is_safe() {
                        report.unsafe_frames += 1;
                    }
                }
                Err(e) => {
                    report.decode_errors += 1;
                    self.on_decode_error(e);
                }
            }
        }

        // 3. Watchdog
        if self.watchdog.check(now) {
            warn!(
                "No sensor data in over {:?}. Make sure the Roomba is on.",
                self.config.silence_threshold
            );
            report.silence_warning = true;
        }
        if self.watchdog.is_stale() {
            self.health = RuntimeHealth::TelemetryStale;
        }

        // 4. Publish health
        self.telemetry.health(self.health);
        report
    }

    /// Run until the shutdown signal flips to true
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        info!(
            "Runtime started: group {}, {}ms poll interval, {}ms silence threshold",
            self.config.stream_group,
            self.config.poll_interval.as_millis(),
            self.config.silence_threshold.as_millis()
        );

        self.send(Command::Start);
        self.watchdog.on_frame(Instant::now());

        while !*shutdown.borrow() {
            self.cycle(Instant::now());
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!("Disconnecting");
        self.send(Command::Stop);
        self.source.release();

        let pose = self.odometry.pose();
        info!(
            "Done: {} frames, {} dropped, final pose ({:.1}, {:.1}) {:.1}deg",
            self.sequence, self.decode_errors, pose.x, pose.y, pose.heading_degrees
        );
    }
}
