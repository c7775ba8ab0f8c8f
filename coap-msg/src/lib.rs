//! Low-level CoAP message parsing and serialization: options, blockwise
//! descriptors, and UDP/TCP wire framing, with no transport or scheduling
//! concerns attached.
//!
//! Buffers are caller-provided (`&mut [u8]`) wherever the wire format
//! allows it; [`opt::OptionList`] can also grow on the heap when built up
//! from scratch rather than parsed off the wire.

pub mod block;
pub mod cursor;
pub mod framing;
pub mod message;
pub mod opt;

pub use block::{Block, BlockError};
pub use message::{Code, CodeOutOfRange, Message, MessageType, Token, TokenTooLong};
