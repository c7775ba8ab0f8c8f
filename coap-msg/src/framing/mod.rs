//! Wire framing for the two CoAP transports this crate supports: UDP's
//! fixed 4-byte header (RFC7252 §3) and TCP's variable length-prefixed
//! header (RFC8323 §3.2).

pub mod tcp;
pub mod udp;

pub use tcp::{TcpFrameError, TcpParseOutcome};
pub use udp::{UdpFrameError, UdpMessage};
