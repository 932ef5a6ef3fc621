//! Serial port driver built on `tokio-serial`.
//!
//! [`SerialPortDriver`] implements [`LinkDriver`]: `open` creates the port
//! handle and spawns a reader task, `close` stops that task, which drops the
//! handle and releases the device.
//!
//! # Byte stream
//!
//! A single `read()` may return part of a line or several lines at once.  The
//! reader buffers bytes in a [`LineFramer`] and forwards each complete CRLF
//! line to the control loop.  Decoding happens there, not here, so the reader
//! never needs to know which attempt is current.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use sensor_core::LineFramer;

use crate::application::link_manager::{LinkDriver, LinkError, LinkEventSink};

/// Size of the temporary buffer for each `read()`.
const READ_CHUNK: usize = 1024;

/// [`LinkDriver`] for a real serial device.
pub struct SerialPortDriver {
    path: String,
    baud_rate: u32,
    reader: Option<JoinHandle<()>>,
}

impl SerialPortDriver {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            reader: None,
        }
    }

    fn stop_reader(&mut self) -> bool {
        match self.reader.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl LinkDriver for SerialPortDriver {
    fn open(&mut self, sink: LinkEventSink) -> Result<(), LinkError> {
        if self.stop_reader() {
            debug!("stopped previous reader for {}", self.path);
        }

        // 8 data bits, no parity, 1 stop bit are the builder defaults.
        let port = tokio_serial::new(&self.path, self.baud_rate)
            .open_native_async()
            .map_err(|e| LinkError::Open {
                port: self.path.clone(),
                source: std::io::Error::from(e),
            })?;

        info!(
            "opened serial port {} at {} baud (attempt {})",
            self.path,
            self.baud_rate,
            sink.attempt()
        );
        let path = self.path.clone();
        self.reader = Some(tokio::spawn(read_serial_lines(port, path, sink)));
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        if self.stop_reader() {
            debug!("released serial port {}", self.path);
        }
        Ok(())
    }
}

impl Drop for SerialPortDriver {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads CRLF lines from `port` and reports them through `sink`.
///
/// Sends `Opened` first, one `Line` per complete line, and `Closed` when the
/// stream ends (EOF) or a read fails.  Returns early without `Closed` if the
/// control loop has gone away.
pub async fn read_serial_lines<R>(mut port: R, path: String, sink: LinkEventSink)
where
    R: AsyncRead + Unpin,
{
    if !sink.opened().await {
        return;
    }

    let mut framer = LineFramer::new();
    let mut read_tmp = vec![0u8; READ_CHUNK];

    let error = loop {
        let n = match port.read(&mut read_tmp).await {
            Ok(0) => {
                debug!("serial port {path} reached end of stream");
                break None;
            }
            Ok(n) => n,
            Err(e) => break Some(e.to_string()),
        };

        framer.extend(&read_tmp[..n]);

        while let Some(next) = framer.next_line() {
            match next {
                Ok(line) => {
                    if !sink.line(line).await {
                        debug!("event channel closed; stopping reader for {path}");
                        return;
                    }
                }
                Err(e) => warn!("serial port {path}: {e}"),
            }
        }
    };

    if framer.buffered() > 0 {
        debug!(
            "serial port {path}: dropping {} bytes of partial line",
            framer.buffered()
        );
    }
    sink.closed(error).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use tokio_test::io::Builder;

    use super::*;
    use crate::application::events::{event_channel, BridgeEvent, LinkEvent};

    const PATH: &str = "/dev/ttyTEST";

    async fn drain(mut rx: mpsc::Receiver<BridgeEvent>) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                BridgeEvent::Link(link) => events.push(link),
                other => panic!("unexpected event {other:?}"),
            }
        }
        events
    }

    #[tokio::test]
    async fn test_lines_split_across_reads_are_reassembled() {
        // Arrange: one line arrives in three pieces, a second in the same read
        let port = Builder::new()
            .read(b"1 2 3")
            .read(b" 4\r")
            .read(b"\n5 6\r\n")
            .build();
        let (tx, rx) = event_channel();

        // Act
        read_serial_lines(port, PATH.to_string(), LinkEventSink::new(7, tx)).await;

        // Assert
        assert_eq!(
            drain(rx).await,
            vec![
                LinkEvent::Opened { attempt: 7 },
                LinkEvent::Line {
                    attempt: 7,
                    line: "1 2 3 4".to_string()
                },
                LinkEvent::Line {
                    attempt: 7,
                    line: "5 6".to_string()
                },
                LinkEvent::Closed {
                    attempt: 7,
                    error: None
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_read_error_reports_close_with_reason() {
        let port = Builder::new()
            .read(b"10 20\r\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            ))
            .build();
        let (tx, rx) = event_channel();

        read_serial_lines(port, PATH.to_string(), LinkEventSink::new(1, tx)).await;

        let events = drain(rx).await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            LinkEvent::Closed {
                attempt: 1,
                error: Some("device unplugged".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_partial_line_at_eof_is_not_forwarded() {
        let port = Builder::new().read(b"1 2 3\r\n4 5").build();
        let (tx, rx) = event_channel();

        read_serial_lines(port, PATH.to_string(), LinkEventSink::new(1, tx)).await;

        let lines: Vec<_> = drain(rx)
            .await
            .into_iter()
            .filter(|e| matches!(e, LinkEvent::Line { .. }))
            .collect();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_reader_stops_when_control_loop_is_gone() {
        // No reads are scripted: the reader must give up before reading.
        let port = Builder::new().build();
        let (tx, rx) = event_channel();
        drop(rx);

        read_serial_lines(port, PATH.to_string(), LinkEventSink::new(1, tx)).await;
    }

    #[tokio::test]
    async fn test_open_missing_device_fails_synchronously() {
        // Arrange
        let mut driver = SerialPortDriver::new("/dev/this-port-does-not-exist", 115_200);
        let (tx, _rx) = event_channel();

        // Act
        let result = driver.open(LinkEventSink::new(1, tx));

        // Assert
        match result {
            Err(LinkError::Open { port, .. }) => {
                assert_eq!(port, "/dev/this-port-does-not-exist")
            }
            other => panic!("expected an open error, got {other:?}"),
        }
    }

    #[test]
    fn test_close_without_open_is_ok() {
        let mut driver = SerialPortDriver::new(PATH, 115_200);
        assert!(driver.close().is_ok());
    }
}
