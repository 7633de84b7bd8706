// Serial link to the Roomba Open Interface
//
// Writes commands on the caller's thread. A reader thread waits for each
// SENSORS request, reads the fixed-length response, decodes it and publishes
// the result on an unbounded channel. A short read purges the input buffer so
// the next response starts on a frame boundary.

use serialport::{ClearBuffer, FlowControl, SerialPort};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use super::commands::Command;
use super::link::{CommandSink, FrameResult, LinkError};
use super::packet::{PacketGroupId, PacketSizeTable};
use super::sensors::{DecodeError, decode};

/// Read timeout for one sensor response
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Sensor requests allowed to wait behind the one being read
const PENDING_REQUESTS: usize = 1;

/// How often the reader re-checks the shutdown flag while idle
const REQUEST_POLL: Duration = Duration::from_millis(50);

pub type Result<T> = std::result::Result<T, LinkError>;

/// Byte source the reader thread pulls responses from
pub(super) trait ResponsePort: Read {
    /// Drop whatever input is still buffered
    fn discard_input(&mut self) -> io::Result<()>;
}

impl ResponsePort for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Serial connection to the robot
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    requests: SyncSender<PacketGroupId>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Open the port and start the reader thread
    pub fn open_with(
        port_name: &str,
        baudrate: u32,
        hardware_flow: bool,
        sizes: Arc<PacketSizeTable>,
    ) -> Result<(Self, UnboundedReceiver<FrameResult>)> {
        let flow_control = if hardware_flow {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };

        info!("Opening {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .flow_control(flow_control)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        let reader_port = port.try_clone()?;

        let (frames_tx, frames_rx) = unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::sync_channel(PENDING_REQUESTS);
        let shutdown = Arc::new(AtomicBool::new(false));

        let reader = thread::Builder::new()
            .name("roomba-reader".to_string())
            .spawn({
                let shutdown = Arc::clone(&shutdown);
                move || reader_loop(reader_port, requests_rx, frames_tx, sizes, shutdown)
            })?;

        let link = Self {
            port,
            requests: requests_tx,
            shutdown,
            reader: Some(reader),
        };
        Ok((link, frames_rx))
    }

    /// Write raw bytes to the robot
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Stop the reader thread and wait for it
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Reader thread panicked");
            }
        }
    }
}

impl CommandSink for SerialLink {
    fn send(&mut self, command: &Command) -> Result<()> {
        // Register the expected response before the robot can answer
        if let Some(group) = command.response_group() {
            if !register_request(&self.requests, group)? {
                debug!("Reader still busy, skipping {:?}", command);
                return Ok(());
            }
        }
        debug!("Sending {:?}", command);
        self.send_bytes(&command.to_bytes())
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Queue a response for the reader; false when the queue is already full
fn register_request(requests: &SyncSender<PacketGroupId>, group: PacketGroupId) -> Result<bool> {
    match requests.try_send(group) {
        Ok(()) => Ok(true),
        Err(TrySendError::Full(_)) => Ok(false),
        Err(TrySendError::Disconnected(_)) => Err(LinkError::Closed),
    }
}

/// Reader loop - one decoded result per sensor request
///
/// Runs until shutdown is flagged, the request side goes away or
/// nobody is listening for frames anymore.
pub(super) fn reader_loop<R: ResponsePort>(
    mut port: R,
    requests: Receiver<PacketGroupId>,
    frames: UnboundedSender<FrameResult>,
    sizes: Arc<PacketSizeTable>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let group = match requests.recv_timeout(REQUEST_POLL) {
            Ok(group) => group,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let result = match sizes.size(group) {
            None => Err(DecodeError::UnknownGroup(group)),
            Some(expected) => match read_response(&mut port, expected) {
                Ok(bytes) if bytes.is_empty() => {
                    debug!("No response to group {} request", group);
                    continue;
                }
                Ok(bytes) => {
                    if bytes.len() < expected {
                        // The rest of this response would prefix the next one
                        discard_pending(&mut port);
                    }
                    decode(&bytes, group, &sizes)
                }
                Err(e) => {
                    warn!("Serial read error: {}", e);
                    discard_pending(&mut port);
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
            },
        };

        if frames.send(result).is_err() {
            debug!("Frame receiver dropped");
            break;
        }
    }

    info!("Reader thread exiting");
}

fn discard_pending<R: ResponsePort>(port: &mut R) {
    if let Err(e) = port.discard_input() {
        warn!("Failed to clear serial input: {}", e);
    }
}

/// Read up to `expected` bytes, stopping early on timeout or end of stream
pub(super) fn read_response<R: Read + ?Sized>(
    port: &mut R,
    expected: usize,
) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; expected];
    let mut filled = 0;

    while filled < expected {
        match port.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    impl ResponsePort for &[u8] {
        fn discard_input(&mut self) -> io::Result<()> {
            *self = &[];
            Ok(())
        }
    }

    /// Serial input arriving in bursts; a read between bursts times out
    struct BurstPort {
        bursts: VecDeque<Vec<u8>>,
        current: Vec<u8>,
        started: bool,
    }

    impl BurstPort {
        fn new(bursts: Vec<Vec<u8>>) -> Self {
            Self {
                bursts: bursts.into(),
                current: Vec::new(),
                started: false,
            }
        }
    }

    impl Read for BurstPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.current.is_empty() {
                let Some(burst) = self.bursts.pop_front() else {
                    return Ok(0);
                };
                self.current = burst;
                if self.started {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
                }
                self.started = true;
            }
            let n = buf.len().min(self.current.len());
            buf[..n].copy_from_slice(&self.current[..n]);
            self.current.drain(..n);
            Ok(n)
        }
    }

    impl ResponsePort for BurstPort {
        fn discard_input(&mut self) -> io::Result<()> {
            // Only the burst that has already arrived is buffered
            self.current.clear();
            Ok(())
        }
    }

    fn p100_frame(left: i16, right: i16) -> Vec<u8> {
        let mut frame = vec![0u8; 93];
        frame[52..54].copy_from_slice(&left.to_be_bytes());
        frame[54..56].copy_from_slice(&right.to_be_bytes());
        frame
    }

    fn run_reader<R: ResponsePort>(port: R, requested: &[PacketGroupId]) -> Vec<FrameResult> {
        let (requests_tx, requests_rx) = mpsc::sync_channel(requested.len());
        let (frames_tx, mut frames_rx) = unbounded_channel();
        for &group in requested {
            requests_tx.send(group).unwrap();
        }
        drop(requests_tx);

        reader_loop(
            port,
            requests_rx,
            frames_tx,
            Arc::new(PacketSizeTable::default()),
            Arc::new(AtomicBool::new(false)),
        );

        let mut results = Vec::new();
        while let Ok(result) = frames_rx.try_recv() {
            results.push(result);
        }
        results
    }

    #[test]
    fn test_read_response_full() {
        let data: Vec<u8> = (0..93).collect();
        let mut reader = &data[..];
        let bytes = read_response(&mut reader, 93).unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_read_response_short() {
        let data = [1u8, 2, 3];
        let mut reader = &data[..];
        let bytes = read_response(&mut reader, 10).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_read_response_stops_at_timeout() {
        let mut port = BurstPort::new(vec![vec![7u8; 40], vec![8u8; 53]]);
        let bytes = read_response(&mut port, 93).unwrap();
        assert_eq!(bytes, vec![7u8; 40]);
    }

    #[test]
    fn test_reader_decodes_each_request() {
        let mut stream = p100_frame(77, 0);
        stream.extend_from_slice(&[0u8; 10]);

        let results = run_reader(&stream[..], &[PacketGroupId::P100, PacketGroupId::P1]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().encoders.left, 77);
        assert_eq!(results[1].as_ref().unwrap().group, PacketGroupId::P1);
    }

    #[test]
    fn test_reader_reports_truncated_response() {
        let stream = vec![0u8; 40];
        let results = run_reader(&stream[..], &[PacketGroupId::P100]);
        assert_eq!(
            results,
            vec![Err(DecodeError::LengthMismatch {
                group: PacketGroupId::P100,
                expected: 93,
                actual: 40
            })]
        );
    }

    #[test]
    fn test_reader_resyncs_after_late_response() {
        // First response is cut by the timeout; its tail arrives with the next one
        let first = p100_frame(100, 0);
        let second = p100_frame(200, 200);
        let mut tail_then_next = first[40..].to_vec();
        tail_then_next.extend_from_slice(&second);
        let port = BurstPort::new(vec![first[..40].to_vec(), tail_then_next, second]);

        let results = run_reader(port, &[PacketGroupId::P100; 3]);
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(DecodeError::LengthMismatch { actual: 40, .. })
        ));
        let frame = results[1].as_ref().unwrap();
        assert_eq!(frame.encoders.left, 200);
        assert_eq!(frame.encoders.right, 200);
    }

    #[test]
    fn test_reader_reports_unknown_group() {
        let stream = vec![0u8; 20];
        let results = run_reader(&stream[..], &[PacketGroupId(77)]);
        assert_eq!(results, vec![Err(DecodeError::UnknownGroup(PacketGroupId(77)))]);
    }

    #[test]
    fn test_reader_skips_silent_robot() {
        let results = run_reader(&[][..], &[PacketGroupId::P100]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_request_queue_is_bounded() {
        let (requests_tx, requests_rx) = mpsc::sync_channel(PENDING_REQUESTS);
        assert!(register_request(&requests_tx, PacketGroupId::P100).unwrap());
        assert!(!register_request(&requests_tx, PacketGroupId::P100).unwrap());

        // Room again once the reader has taken the pending request
        assert_eq!(requests_rx.recv().unwrap(), PacketGroupId::P100);
        assert!(register_request(&requests_tx, PacketGroupId::P100).unwrap());

        drop(requests_rx);
        assert!(matches!(
            register_request(&requests_tx, PacketGroupId::P100),
            Err(LinkError::Closed)
        ));
    }
}
