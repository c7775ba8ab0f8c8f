//! The protocol-independent parts of a CoAP message: code, token, and the
//! option/payload body shared by both the UDP and TCP framings.

use crate::opt::OptionList;

/// A CoAP response/request class+detail code, e.g. `2.05` or `4.04`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code {
  /// 3-bit class (0 = request/empty, 2-5 = response, 7 = signaling).
  pub class: u8,
  /// 5-bit detail.
  pub detail: u8,
}

/// A code field didn't fit its 3+5 bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeOutOfRange;

impl Code {
  /// The empty message code, `0.00`.
  pub const EMPTY: Code = Code { class: 0, detail: 0 };

  /// Construct from class/detail, failing if either is out of its bit width.
  pub fn new(class: u8, detail: u8) -> Result<Self, CodeOutOfRange> {
    if class > 0b111 || detail > 0b11111 {
      return Err(CodeOutOfRange);
    }
    Ok(Self { class, detail })
  }

  /// Decode the wire byte `ccc.ddddd`.
  pub fn from_byte(b: u8) -> Self {
    Self { class: b >> 5, detail: b & 0b0001_1111 }
  }

  /// Encode to the wire byte.
  pub fn to_byte(self) -> u8 {
    (self.class << 5) | self.detail
  }

  /// `0.01`-`0.31`: a request.
  pub fn is_request(self) -> bool {
    self.class == 0 && self.detail != 0
  }

  /// `2.xx`-`5.xx`: a response.
  pub fn is_response(self) -> bool {
    (2..=5).contains(&self.class)
  }

  /// `7.xx`: a CoAP-over-TCP signaling code (RFC8323 §11.3).
  pub fn is_signal(self) -> bool {
    self.class == 7
  }

  /// `0.00`: an empty message (UDP ack/reset, or unused over TCP).
  pub fn is_empty(self) -> bool {
    self.class == 0 && self.detail == 0
  }
}

impl core::fmt::Display for Code {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}

/// A message token, 0-8 bytes (RFC7252 §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
  bytes: [u8; 8],
  len: u8,
}

/// A token length nibble was outside `0..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTooLong;

impl Token {
  /// The empty token.
  pub const EMPTY: Token = Token { bytes: [0; 8], len: 0 };

  /// Build a token from up to 8 bytes.
  pub fn new(bytes: &[u8]) -> Result<Self, TokenTooLong> {
    if bytes.len() > 8 {
      return Err(TokenTooLong);
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(Self { bytes: buf, len: bytes.len() as u8 })
  }

  /// The token's bytes.
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes[..self.len as usize]
  }

  /// Token length, `0..=8`.
  pub fn len(&self) -> u8 {
    self.len
  }

  /// Whether the token is empty.
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

/// A UDP message's type (RFC7252 §3): confirmable, non-confirmable, ack, or
/// reset. Meaningless over TCP, which has no retransmission layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
  Confirmable,
  NonConfirmable,
  Acknowledgement,
  Reset,
}

impl MessageType {
  /// Decode the 2-bit `T` field.
  pub fn from_bits(bits: u8) -> Self {
    match bits & 0b11 {
      | 0 => MessageType::Confirmable,
      | 1 => MessageType::NonConfirmable,
      | 2 => MessageType::Acknowledgement,
      | _ => MessageType::Reset,
    }
  }

  /// Encode to the 2-bit `T` field.
  pub fn to_bits(self) -> u8 {
    match self {
      | MessageType::Confirmable => 0,
      | MessageType::NonConfirmable => 1,
      | MessageType::Acknowledgement => 2,
      | MessageType::Reset => 3,
    }
  }
}

/// The body shared by UDP and TCP messages: code, token, options, payload.
/// The UDP `Id`/`Type` fields and TCP length fields live in their
/// respective framing modules.
#[derive(Debug, PartialEq)]
pub struct Message<'a> {
  pub code: Code,
  pub token: Token,
  pub options: OptionList<'a>,
  pub payload: &'a [u8],
}
