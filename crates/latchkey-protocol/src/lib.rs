pub mod codec;
pub mod commands;
pub mod message;
pub mod port;
pub mod stream_parser;

pub use codec::FrameCodec;
pub use commands::Opcode;
pub use message::{checksum, Message};
pub use port::Port;
pub use stream_parser::{DrainMessages, ParserState, StreamParser};
