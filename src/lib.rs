pub mod config;
pub mod messages;
pub mod odometry;
pub mod roomba;
pub mod runtime;
pub mod safety;
pub mod shutdown;
pub mod telemetry;
