// Open Interface command opcodes
//
// Commands are fire-and-forget: the robot never acknowledges them, only a
// SENSORS request produces a response.

use super::packet::PacketGroupId;

/// Opcodes used by the runtime
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Start = 128,
    Sensors = 142,
}

/// Commands the acquisition loop sends to the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Open the interface (passive mode)
    Start,
    /// Halt all actuators
    Stop,
    /// Ask for one response of the given packet group
    RequestSensors(PacketGroupId),
}

impl Command {
    /// Bytes written to the serial link
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Command::Start => vec![OpCode::Start as u8],
            // Dropping back to passive mode stops the motors, sensors keep answering
            Command::Stop => vec![OpCode::Start as u8],
            Command::RequestSensors(group) => vec![OpCode::Sensors as u8, group.0],
        }
    }

    /// Packet group the robot answers this command with, if any
    pub fn response_group(&self) -> Option<PacketGroupId> {
        match self {
            Command::RequestSensors(group) => Some(*group),
            _ => None,
        }
    }
}
