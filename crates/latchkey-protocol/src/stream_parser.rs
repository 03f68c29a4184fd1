//! Stream parser for serial link frames.
//!
//! This module provides a stateful parser capable of handling partial frames
//! from a byte stream. The parser accumulates bytes in an internal buffer and
//! extracts complete messages using a state machine keyed on the frame
//! header byte and the declared payload length.
//!
//! # Protocol Framing
//!
//! ```text
//! [0xAA] [opcode:1] [len:1] [payload:0..=64] [checksum:1]
//! ```
//!
//! The checksum is `(opcode + len + sum(payload)) mod 256`. There is no end
//! marker: the declared length tells the parser where the frame stops.
//!
//! # Usage
//!
//! ```
//! use latchkey_protocol::StreamParser;
//!
//! let mut parser = StreamParser::new();
//!
//! // Feed partial data from the serial line
//! parser.feed(&[0xAA, 0x06]);
//! parser.feed(&[0x00]);
//! parser.feed(&[0x06]);
//!
//! // Extract complete message
//! if let Some(msg) = parser.next_message() {
//!     println!("Received: {}", msg.opcode());
//! }
//! ```
//!
//! # Error Recovery
//!
//! The parser never surfaces corrupt frames:
//!
//! - Bytes before a header byte are discarded as line noise.
//! - A length field above the payload limit marks the frame invalid; the
//!   parser drains exactly `len + 1` bytes (the claimed payload plus the
//!   checksum) so the stream stays aligned, then resumes header scanning.
//! - A checksum mismatch or unknown opcode drops the frame silently.
//!
//! Dropped frames are counted and observable via [`frames_dropped()`].
//!
//! [`frames_dropped()`]: StreamParser::frames_dropped

use bytes::BytesMut;
use std::collections::VecDeque;

use latchkey_core::constants::{MAX_PAYLOAD_SIZE, MSG_HEADER};

use crate::commands::Opcode;
use crate::message::{checksum, Message};

/// Initial buffer capacity for incoming serial data.
///
/// Sized for a few frames of burst traffic without reallocation.
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Recommended initial capacity for the message queue.
const INITIAL_QUEUE_CAPACITY: usize = 4;

/// Frame byte count once the header is consumed: opcode + len + checksum
/// plus the declared payload.
const FRAME_BODY_MIN: usize = 2;

/// State machine states for parsing serial link frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Scanning for the 0xAA header byte.
    ///
    /// Any bytes before the header are considered line noise and are
    /// discarded.
    WaitingHeader,

    /// Accumulating opcode, length, payload and checksum bytes.
    ///
    /// The parser knows the total frame length as soon as the length byte
    /// arrives and waits until exactly that many bytes are available.
    ReadingFrame,

    /// Discarding the remainder of a frame whose length field exceeded the
    /// payload limit.
    ///
    /// Exactly `len + 1` bytes (claimed payload plus checksum) are consumed
    /// before returning to header scanning, keeping the parser aligned with
    /// the sender even though the frame itself is rejected.
    Draining { remaining: usize },
}

/// Stateful stream parser for serial link frames.
///
/// Handles partial frame reception from a byte stream, buffering incomplete
/// data and extracting complete [`Message`]s.
///
/// # State Machine
///
/// - `WaitingHeader` -> `ReadingFrame`: when the 0xAA header byte is found
/// - `ReadingFrame` -> `WaitingHeader`: when the frame completes (valid
///   frames are queued, corrupt ones counted and dropped)
/// - `ReadingFrame` -> `Draining`: when the length byte exceeds the limit
/// - `Draining` -> `WaitingHeader`: once `len + 1` bytes are consumed
///
/// # Example
///
/// ```
/// use latchkey_protocol::{Opcode, StreamParser};
///
/// let mut parser = StreamParser::new();
///
/// parser.feed(&[0xAA, 0x06]); // partial
/// assert!(parser.next_message().is_none());
///
/// parser.feed(&[0x00, 0x06]); // rest of the frame
/// let msg = parser.next_message().unwrap();
/// assert_eq!(msg.opcode(), Opcode::Unlock);
/// ```
#[derive(Debug)]
pub struct StreamParser {
    /// Internal buffer for accumulating incoming bytes.
    buffer: BytesMut,

    /// Current state of the parser state machine.
    state: ParserState,

    /// Bytes of the frame body collected so far (opcode onward).
    frame: Vec<u8>,

    /// Queue of complete messages ready for extraction.
    messages: VecDeque<Message>,

    /// Frames rejected for bad length, checksum or opcode.
    frames_dropped: u64,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ParserState::WaitingHeader,
            frame: Vec::with_capacity(FRAME_BODY_MIN + MAX_PAYLOAD_SIZE + 1),
            messages: VecDeque::with_capacity(INITIAL_QUEUE_CAPACITY),
            frames_dropped: 0,
        }
    }

    /// Feed bytes from the serial line into the parser.
    ///
    /// Appends new bytes to the internal buffer and extracts as many
    /// complete messages as the data allows. Multiple messages may become
    /// available from a single `feed()` call.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        while self.advance() {
            // Keep extracting while progress is possible
        }
    }

    /// Extract the next complete message, if available.
    pub fn next_message(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    /// Returns the current parser state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// True when the parser is mid-frame and waiting on more bytes.
    ///
    /// Used by the receive path to decide whether a read stall should be
    /// treated as a frame timeout.
    pub fn mid_frame(&self) -> bool {
        self.state != ParserState::WaitingHeader
    }

    /// Number of messages ready for extraction.
    pub fn messages_available(&self) -> usize {
        self.messages.len()
    }

    /// Count of frames rejected since construction.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Abandon any partially received frame and return to header scanning.
    ///
    /// Called by the receive path when a mid-frame stall exceeds the byte
    /// timeout. Queued complete messages are kept; only the partial frame
    /// is discarded.
    pub fn abort_frame(&mut self) {
        if self.mid_frame() {
            self.frames_dropped += 1;
        }
        self.frame.clear();
        self.state = ParserState::WaitingHeader;
    }

    /// Clear all internal buffers and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frame.clear();
        self.messages.clear();
        self.state = ParserState::WaitingHeader;
    }

    /// Returns an iterator that drains all currently available messages.
    ///
    /// Yields messages until the internal queue is empty. It does NOT
    /// process more data from the buffer; call [`feed()`] first.
    ///
    /// [`feed()`]: StreamParser::feed
    pub fn drain_messages(&mut self) -> DrainMessages<'_> {
        DrainMessages { parser: self }
    }

    /// Run one step of the state machine.
    ///
    /// Returns `true` if progress was made (state changed or a frame
    /// completed), `false` when more input is needed.
    fn advance(&mut self) -> bool {
        match self.state {
            ParserState::WaitingHeader => self.handle_waiting_header(),
            ParserState::ReadingFrame => self.handle_reading_frame(),
            ParserState::Draining { remaining } => self.handle_draining(remaining),
        }
    }

    /// Scan for the header byte, discarding noise before it.
    fn handle_waiting_header(&mut self) -> bool {
        match self.buffer.iter().position(|&b| b == MSG_HEADER) {
            Some(pos) => {
                let _ = self.buffer.split_to(pos + 1);
                self.frame.clear();
                self.state = ParserState::ReadingFrame;
                true
            }
            None => {
                self.buffer.clear();
                false
            }
        }
    }

    /// Accumulate frame body bytes and finish the frame when complete.
    fn handle_reading_frame(&mut self) -> bool {
        // Opcode and length first; the length byte fixes the frame size.
        while self.frame.len() < FRAME_BODY_MIN {
            match self.take_byte() {
                Some(b) => self.frame.push(b),
                None => return false,
            }
        }

        let declared_len = self.frame[1] as usize;
        if declared_len > MAX_PAYLOAD_SIZE {
            self.frames_dropped += 1;
            self.frame.clear();
            self.state = ParserState::Draining {
                remaining: declared_len + 1,
            };
            return true;
        }

        let total = FRAME_BODY_MIN + declared_len + 1;
        while self.frame.len() < total {
            match self.take_byte() {
                Some(b) => self.frame.push(b),
                None => return false,
            }
        }

        self.finish_frame(declared_len);
        self.state = ParserState::WaitingHeader;
        true
    }

    /// Consume bytes belonging to an oversized frame.
    fn handle_draining(&mut self, remaining: usize) -> bool {
        let take = remaining.min(self.buffer.len());
        let _ = self.buffer.split_to(take);

        let left = remaining - take;
        if left == 0 {
            self.state = ParserState::WaitingHeader;
            true
        } else {
            self.state = ParserState::Draining { remaining: left };
            false
        }
    }

    /// Validate checksum and opcode, queueing the message if both pass.
    ///
    /// Corrupt frames are dropped without error: the link is best-effort
    /// and the sender never retries, so there is nobody to notify.
    fn finish_frame(&mut self, payload_len: usize) {
        let opcode_byte = self.frame[0];
        let payload = &self.frame[FRAME_BODY_MIN..FRAME_BODY_MIN + payload_len];
        let received = self.frame[FRAME_BODY_MIN + payload_len];

        if checksum(opcode_byte, payload) != received {
            self.frames_dropped += 1;
            return;
        }

        match Opcode::parse(opcode_byte)
            .and_then(|opcode| Message::new(opcode, payload.to_vec()))
        {
            Ok(msg) => self.messages.push_back(msg),
            Err(_) => self.frames_dropped += 1,
        }
    }

    fn take_byte(&mut self) -> Option<u8> {
        if self.buffer.is_empty() {
            None
        } else {
            let b = self.buffer[0];
            let _ = self.buffer.split_to(1);
            Some(b)
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator that drains messages from a [`StreamParser`].
///
/// Created by [`StreamParser::drain_messages`].
pub struct DrainMessages<'a> {
    parser: &'a mut StreamParser,
}

impl<'a> Iterator for DrainMessages<'a> {
    type Item = Message;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_message()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.parser.messages_available();
        (len, Some(len))
    }
}

impl<'a> ExactSizeIterator for DrainMessages<'a> {
    fn len(&self) -> usize {
        self.parser.messages_available()
    }
}
