//! Tokio codec for serial link frame framing.
//!
//! Wraps the [`StreamParser`] in Tokio's [`Decoder`]/[`Encoder`] traits so
//! the binary frame protocol plugs into `Framed` streams. Used by the
//! emulated board harness and anywhere a full async stream abstraction is
//! more convenient than the byte-level [`Port`](crate::Port).
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio_util::codec::Framed;
//! use futures::{SinkExt, StreamExt};
//! use latchkey_protocol::{FrameCodec, Message};
//!
//! # async fn example() -> latchkey_core::Result<()> {
//! let (a, _b) = tokio::io::duplex(256);
//! let mut framed = Framed::new(a, FrameCodec::new());
//!
//! framed.send(Message::unlock()).await?;
//!
//! if let Some(Ok(msg)) = framed.next().await {
//!     println!("Received: {}", msg.opcode());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Corrupt frames (bad checksum, unknown opcode, oversized length) never
//! surface as decode errors: the link is best-effort and the parser drops
//! them internally while staying aligned with the stream. `decode` only
//! fails on I/O-level errors from the transport.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use latchkey_core::{Error, Result};

use crate::message::Message;
use crate::stream_parser::StreamParser;

/// Tokio codec for serial link messages.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Stream parser handling buffering, resync and frame validation.
    parser: StreamParser,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            parser: StreamParser::new(),
        }
    }

    /// Count of frames the parser rejected since construction.
    pub fn frames_dropped(&self) -> u64 {
        self.parser.frames_dropped()
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = Error;

    /// Decode one message from the byte stream.
    ///
    /// Feeds pending bytes to the internal [`StreamParser`] and pops the
    /// next complete message. Returns `Ok(None)` while a frame is still
    /// partial; corrupt frames are skipped, not reported.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // StreamParser copies into its own buffer; src is fully consumed.
            self.parser.feed(src);
            src.clear();
        }

        Ok(self.parser.next_message())
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = Error;

    /// Encode a message to the wire, header and checksum included.
    ///
    /// Cannot fail: an existing [`Message`] is payload-validated at
    /// construction.
    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&item.encode());
        Ok(())
    }
}
