//! Observation uplink over a blocking UART.

use embedded_io::Write;
use hydromet_core::io::{SinkError, TransmitSink};

/// One observation line per `send`, CRLF-terminated for the receiving modem.
pub struct SerialUplink<W: Write> {
    tx: W,
}

impl<W: Write> SerialUplink<W> {
    pub fn new(tx: W) -> Self {
        Self { tx }
    }
}

impl<W: Write> TransmitSink for SerialUplink<W> {
    async fn send(&mut self, line: &str) -> Result<(), SinkError> {
        self.tx
            .write_all(line.as_bytes())
            .and_then(|()| self.tx.write_all(b"\r\n"))
            .and_then(|()| self.tx.flush())
            .map_err(|_| SinkError::WriteFailed)
    }
}
