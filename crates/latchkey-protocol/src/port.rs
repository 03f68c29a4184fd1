//! Async message port with frame stall detection.
//!
//! [`Port`] wraps any `AsyncRead + AsyncWrite` transport (a serial device,
//! a TCP socket, an in-process duplex pipe) and exchanges [`Message`]s over
//! it. Unlike a plain `Framed` stream it enforces the link's stall rule:
//! once a frame has started arriving, each subsequent byte must land within
//! [`BYTE_TIMEOUT_MS`]. A mid-frame stall abandons the partial frame so a
//! wedged peer cannot hold the receive path hostage, and the next receive
//! resumes at header scanning.
//!
//! Sends are fire-and-forget at the protocol level: the frame is written
//! and flushed, and no acknowledgement is awaited.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use latchkey_core::constants::BYTE_TIMEOUT_MS;
use latchkey_core::{Error, Result};

use crate::message::Message;
use crate::stream_parser::StreamParser;

/// Read chunk size for the underlying transport.
const READ_CHUNK: usize = 64;

/// Message-level port over a byte transport.
#[derive(Debug)]
pub struct Port<T> {
    io: T,
    parser: StreamParser,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Port<T> {
    pub fn new(io: T) -> Self {
        Self {
            io,
            parser: StreamParser::new(),
        }
    }

    /// Send a message, flushing the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the transport write or flush fails.
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        self.io.write_all(&msg.encode()).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Receive the next complete message, waiting as long as it takes for a
    /// frame to start.
    ///
    /// # Errors
    ///
    /// - [`Error::ReceiveTimeout`] if a frame stalls mid-reception. The
    ///   partial frame is discarded; calling `recv` again is safe.
    /// - [`Error::Io`] on transport failure or EOF.
    pub async fn recv(&mut self) -> Result<Message> {
        loop {
            if let Some(msg) = self.parser.next_message() {
                return Ok(msg);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = if self.parser.mid_frame() {
                // Stall rule only applies once a header byte has arrived.
                match timeout(
                    Duration::from_millis(BYTE_TIMEOUT_MS),
                    self.io.read(&mut chunk),
                )
                .await
                {
                    Ok(read) => read?,
                    Err(_) => {
                        self.parser.abort_frame();
                        return Err(Error::ReceiveTimeout { stage: "frame body" });
                    }
                }
            } else {
                self.io.read(&mut chunk).await?
            };

            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "transport closed",
                )));
            }
            self.parser.feed(&chunk[..n]);
        }
    }

    /// Receive with an overall deadline, returning `Ok(None)` if no message
    /// starts arriving within `wait`.
    ///
    /// Mid-frame stalls still surface as [`Error::ReceiveTimeout`]; only
    /// the initial wait for a header byte is bounded by `wait`.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<Message>> {
        if let Some(msg) = self.parser.next_message() {
            return Ok(Some(msg));
        }
        match timeout(wait, self.recv()).await {
            Ok(res) => res.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Frames the parser has rejected on this port.
    pub fn frames_dropped(&self) -> u64 {
        self.parser.frames_dropped()
    }

    /// Consume the port, returning the underlying transport.
    pub fn into_inner(self) -> T {
        self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Opcode;
    use latchkey_core::FingerprintId;

    #[tokio::test]
    async fn send_and_receive_over_duplex() {
        let (a, b) = tokio::io::duplex(256);
        let mut tx = Port::new(a);
        let mut rx = Port::new(b);

        let slot = FingerprintId::new(7).unwrap();
        tx.send(&Message::enroll_start(slot)).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.opcode(), Opcode::EnrollStart);
        assert_eq!(msg.first_byte(), Some(7));
    }

    #[tokio::test]
    async fn queued_messages_returned_before_reading() {
        let (a, b) = tokio::io::duplex(256);
        let mut tx = Port::new(a);
        let mut rx = Port::new(b);

        tx.send(&Message::unlock()).await.unwrap();
        tx.send(&Message::empty(Opcode::StopVideo)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().opcode(), Opcode::Unlock);
        assert_eq!(rx.recv().await.unwrap().opcode(), Opcode::StopVideo);
    }

    #[tokio::test(start_paused = true)]
    async fn mid_frame_stall_times_out() {
        let (mut a, b) = tokio::io::duplex(256);
        let mut rx = Port::new(b);

        // Header and opcode only, then silence
        a.write_all(&[0xAA, 0x06]).await.unwrap();

        let err = rx.recv().await.unwrap_err();
        assert!(matches!(err, Error::ReceiveTimeout { .. }));

        // Port recovers: a complete frame afterwards is received
        a.write_all(&[0xAA, 0x06, 0x00, 0x06]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().opcode(), Opcode::Unlock);
    }

    #[tokio::test(start_paused = true)]
    async fn recv_timeout_returns_none_when_idle() {
        let (_a, b) = tokio::io::duplex(256);
        let mut rx = Port::new(b);

        let got = rx
            .recv_timeout(Duration::from_millis(20))
            .await
            .unwrap();
        assert!(got.is_none());
    }
}
