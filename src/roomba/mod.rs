// Roomba Open Interface support
//
// Provides:
// - Sensor packet groups and their response sizes
// - Sensor frame decoding
// - Differential-drive kinematics
// - Command encoding and the serial link

pub mod commands;
pub mod kinematics;
mod link;
pub mod packet;
pub mod sensors;
pub mod serial;

pub use commands::{Command, OpCode};
pub use link::{CommandSink, FrameResult, FrameSource, LinkError};
pub use packet::{PacketGroupId, PacketSizeTable};
pub use sensors::{DecodeError, EncoderReading, HazardFlags, SensorFrame, decode};
pub use serial::SerialLink;
