// Transport capability seen by the acquisition loop
//
// Any transport that can send command bytes and hand over decoded frames fits
// behind these two traits; the loop never knows which one it has.

use tokio::sync::mpsc::UnboundedReceiver;

use super::commands::Command;
use super::sensors::{DecodeError, SensorFrame};

/// What the producer publishes for each response it read
pub type FrameResult = Result<SensorFrame, DecodeError>;

/// Error types for the robot link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Link closed")]
    Closed,
}

/// Non-blocking supply of decoded frames
pub trait FrameSource {
    /// Next queued frame, `None` when nothing is waiting
    fn poll_frame(&mut self) -> Option<FrameResult>;

    /// Stop accepting frames (called once on shutdown)
    fn release(&mut self) {}
}

/// Fire-and-forget command output
pub trait CommandSink {
    fn send(&mut self, command: &Command) -> Result<(), LinkError>;
}

impl FrameSource for UnboundedReceiver<FrameResult> {
    fn poll_frame(&mut self) -> Option<FrameResult> {
        self.try_recv().ok()
    }

    fn release(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roomba::PacketGroupId;

    #[test]
    fn test_channel_source_is_fifo_and_non_blocking() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        assert!(rx.poll_frame().is_none());

        tx.send(Ok(SensorFrame::blank(PacketGroupId::P100))).unwrap();
        tx.send(Err(DecodeError::UnknownGroup(PacketGroupId(9)))).unwrap();

        assert!(matches!(rx.poll_frame(), Some(Ok(_))));
        assert!(matches!(rx.poll_frame(), Some(Err(DecodeError::UnknownGroup(_)))));
        assert!(rx.poll_frame().is_none());
    }

    #[test]
    fn test_released_source_rejects_producer() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<FrameResult>();
        rx.release();
        assert!(tx.send(Ok(SensorFrame::blank(PacketGroupId::P100))).is_err());
    }
}
