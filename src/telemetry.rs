// Telemetry sinks: where decoded frames and the pose go after each cycle

use tracing::{debug, info, warn};
use zenoh::Wait;
use zenoh::pubsub::Publisher;

use crate::config::{TOPIC_HEALTH, TOPIC_POSE, TOPIC_SENSORS};
use crate::messages::{RuntimeHealth, TelemetryRecord};

/// Receives one record per decoded frame, in arrival order
pub trait TelemetrySink {
    fn record(&mut self, record: &TelemetryRecord);

    /// Health after each cycle
    fn health(&mut self, _health: RuntimeHealth) {}
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn record(&mut self, record: &TelemetryRecord) {
        (**self).record(record)
    }

    fn health(&mut self, health: RuntimeHealth) {
        (**self).health(health)
    }
}

/// Logs every record at debug level
#[derive(Debug, Default)]
pub struct TracingSink {
    last_health: Option<RuntimeHealth>,
}

impl TelemetrySink for TracingSink {
    fn record(&mut self, record: &TelemetryRecord) {
        debug!(
            "Sensor data {}: safe={}, pose=({:.1}, {:.1}) {:.1}deg, encoders L={} R={}",
            record.sequence,
            record.safe,
            record.pose.x,
            record.pose.y,
            record.pose.heading_degrees,
            record.frame.encoders.left,
            record.frame.encoders.right
        );
    }

    fn health(&mut self, health: RuntimeHealth) {
        if self.last_health != Some(health) {
            info!("Health: {:?}", health);
            self.last_health = Some(health);
        }
    }
}

/// Publishes records, pose and health as JSON over zenoh
pub struct ZenohSink {
    _session: zenoh::Session,
    pub_sensors: Publisher<'static>,
    pub_pose: Publisher<'static>,
    pub_health: Publisher<'static>,
}

impl ZenohSink {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default()).await?;

        let pub_sensors = session.declare_publisher(TOPIC_SENSORS).await?;
        let pub_pose = session.declare_publisher(TOPIC_POSE).await?;
        let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
        info!(
            "Publishing to: {}, {}, {}",
            TOPIC_SENSORS, TOPIC_POSE, TOPIC_HEALTH
        );

        Ok(Self {
            _session: session,
            pub_sensors,
            pub_pose,
            pub_health,
        })
    }

    fn put_json<S: serde::Serialize>(publisher: &Publisher<'static>, value: &S) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode telemetry: {}", e);
                return;
            }
        };
        if let Err(e) = publisher.put(json).wait() {
            warn!("Failed to publish on {}: {}", publisher.key_expr(), e);
        }
    }
}

impl TelemetrySink for ZenohSink {
    fn record(&mut self, record: &TelemetryRecord) {
        Self::put_json(&self.pub_sensors, record);
        Self::put_json(&self.pub_pose, &record.pose);
    }

    fn health(&mut self, health: RuntimeHealth) {
        Self::put_json(&self.pub_health, &health);
    }
}
