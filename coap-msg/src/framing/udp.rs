//! UDP framing: `ver(2) type(2) tkl(4)` + code + 16-bit message id, then
//! token, options, and an optional `0xFF`-delimited payload.

use crate::cursor::{Appender, Extractor};
use crate::message::{Code, Message, MessageType, Token};
use crate::opt::{header, OptionList};

const VERSION: u8 = 1;

/// Failure reasons for parsing or serializing a UDP-framed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpFrameError {
  /// Fewer than 4 bytes: not even a full fixed header.
  TruncatedHeader,
  /// The `Ver` field wasn't `1`.
  UnsupportedVersion,
  /// `TKL` was 9-15 (reserved).
  ReservedTokenLength,
  /// Ran out of bytes reading the token or options.
  Truncated,
  /// The option section didn't parse.
  MalformedOptions,
  /// The message wouldn't fit the destination buffer.
  DestinationTooSmall,
}

/// A fully parsed UDP-framed message (the fixed header's `Id`/`Type` plus
/// the shared [`Message`] body).
#[derive(Debug, PartialEq)]
pub struct UdpMessage<'a> {
  pub id: u16,
  pub ty: MessageType,
  pub message: Message<'a>,
}

/// Parse a complete UDP datagram. UDP is message-oriented, so unlike TCP
/// there's no concept of a partial frame: the whole datagram is either a
/// complete message or malformed.
pub fn parse(datagram: &mut [u8]) -> Result<UdpMessage<'_>, UdpFrameError> {
  let len = datagram.len();
  if len < 4 {
    return Err(UdpFrameError::TruncatedHeader);
  }

  let head = datagram[0];
  let version = head >> 6;
  if version != VERSION {
    return Err(UdpFrameError::UnsupportedVersion);
  }
  let ty = MessageType::from_bits((head >> 4) & 0b11);
  let tkl = head & 0x0F;
  if tkl > 8 {
    return Err(UdpFrameError::ReservedTokenLength);
  }

  let code = Code::from_byte(datagram[1]);
  let id = u16::from_be_bytes([datagram[2], datagram[3]]);

  let mut ex = Extractor::new(&datagram[4..]);
  let token_bytes = ex.take(tkl as usize).map_err(|_| UdpFrameError::Truncated)?;
  let token = Token::new(token_bytes).expect("tkl already bounds-checked to <= 8");

  let rest_start = 4 + tkl as usize;
  let rest_len = len - rest_start;
  let (options_len, has_payload) = {
    let probe = OptionList::from_serialized(&mut datagram[rest_start..], rest_len);
    probe.validate_until_payload_marker(rest_len).map_err(|_| UdpFrameError::MalformedOptions)?
  };

  let (opts_slice, after_opts) = datagram[rest_start..].split_at_mut(options_len);
  let options = OptionList::from_serialized(opts_slice, options_len);

  let payload = if has_payload { &after_opts[1..] } else { &[] };

  Ok(UdpMessage { id, ty, message: Message { code, token, options, payload } })
}

/// Serialize a UDP message into `dst`, returning the number of bytes
/// written.
pub fn serialize(dst: &mut [u8], id: u16, ty: MessageType, message: &Message<'_>)
                  -> Result<usize, UdpFrameError> {
  let mut a = Appender::new(dst);
  let head = (VERSION << 6) | (ty.to_bits() << 4) | message.token.len();
  a.append_u8(head).map_err(|_| UdpFrameError::DestinationTooSmall)?;
  a.append_u8(message.code.to_byte()).map_err(|_| UdpFrameError::DestinationTooSmall)?;
  a.append(&id.to_be_bytes()).map_err(|_| UdpFrameError::DestinationTooSmall)?;
  a.append(message.token.as_bytes()).map_err(|_| UdpFrameError::DestinationTooSmall)?;
  a.append(message.options.as_bytes()).map_err(|_| UdpFrameError::DestinationTooSmall)?;

  if !message.payload.is_empty() {
    a.append_u8(0xFF).map_err(|_| UdpFrameError::DestinationTooSmall)?;
    a.append(message.payload).map_err(|_| UdpFrameError::DestinationTooSmall)?;
  }

  let _ = header::OptError::Eof; // keep opt::header's error type linked for doc links
  Ok(a.position())
}
