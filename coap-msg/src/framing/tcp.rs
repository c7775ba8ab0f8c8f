//! TCP framing (RFC8323 §3.2): `len(4) tkl(4)` + extended length + code +
//! token, then options and an optional payload. No message id — TCP
//! guarantees ordering and delivery, so there's nothing to deduplicate.
//!
//! Unlike UDP, a TCP byte stream can hand a parser a prefix of a message,
//! a whole message, several messages back to back, or (for a message
//! whose declared length exceeds the caller's read buffer) a message
//! this parser can only partially materialize. [`parse`] reports all
//! three as distinct [`TcpParseOutcome`] variants so callers can buffer,
//! act, or stream accordingly.

use crate::cursor::{Appender, Extractor};
use crate::message::{Code, Message, Token};
use crate::opt::OptionList;

/// Failure reasons for parsing or serializing a TCP-framed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpFrameError {
  /// `TKL` was 9-15 (reserved).
  ReservedTokenLength,
  /// The option section didn't parse.
  MalformedOptions,
  /// The message wouldn't fit the destination buffer.
  DestinationTooSmall,
}

/// The result of attempting to parse one message out of the front of a
/// byte stream buffer.
pub enum TcpParseOutcome<'a> {
  /// Not even the fixed header (plus any extended length bytes) is in the
  /// buffer yet. The caller should read more bytes and retry.
  Incomplete,
  /// The header is known but the declared body length exceeds what's in
  /// the buffer, and more than just a couple more reads would be needed to
  /// fill it locally. Code, token, and the total expected payload length
  /// are available so a caller can start streaming the payload through
  /// rather than waiting to buffer it whole.
  PayloadPartial { code: Code, token: Token, total_len: usize, available_body: &'a [u8] },
  /// A complete message was parsed. `consumed` is the number of bytes of
  /// the input buffer it occupied.
  Complete { message: Message<'a>, consumed: usize },
  /// The bytes at the front of the buffer aren't a valid frame.
  Malformed(TcpFrameError),
}

/// Length nibble values `13`/`14`/`15` trigger 1/2/4 extended length bytes
/// respectively, with these bases added (mirrors the option length/delta
/// nibble scheme one level up, per RFC8323 §3.2).
const EXT_LEN_BASE_13: u32 = 13;
const EXT_LEN_BASE_269: u32 = 269;
const EXT_LEN_BASE_65805: u32 = 65805;

fn header_and_len(buf: &[u8]) -> Option<(u32, u8, usize)> {
  let mut ex = Extractor::new(buf);
  let head = ex.take_u8().ok()?;
  let len_nibble = head >> 4;
  let tkl = head & 0x0F;

  let body_len = match len_nibble {
    | 13 => ex.take_u8().ok()? as u32 + EXT_LEN_BASE_13,
    | 14 => {
      let b = ex.take(2).ok()?;
      u16::from_be_bytes([b[0], b[1]]) as u32 + EXT_LEN_BASE_269
    },
    | 15 => {
      let b = ex.take(4).ok()?;
      u32::from_be_bytes([b[0], b[1], b[2], b[3]]) + EXT_LEN_BASE_65805
    },
    | n => n as u32,
  };

  Some((body_len, tkl, ex.position()))
}

/// Parse one message from the front of `buf`. Does not mutate or consume
/// `buf` itself; callers track `consumed` across calls to advance their own
/// read cursor.
pub fn parse(buf: &mut [u8]) -> TcpParseOutcome<'_> {
  let Some((body_len, tkl, after_len_header)) = header_and_len(buf) else {
    return TcpParseOutcome::Incomplete;
  };

  if tkl > 8 {
    return TcpParseOutcome::Malformed(TcpFrameError::ReservedTokenLength);
  }

  if buf.len() < after_len_header + 1 {
    return TcpParseOutcome::Incomplete;
  }
  let code = Code::from_byte(buf[after_len_header]);
  let after_code = after_len_header + 1;

  if buf.len() < after_code + tkl as usize {
    return TcpParseOutcome::Incomplete;
  }
  let token_bytes = &buf[after_code..after_code + tkl as usize];
  let token = Token::new(token_bytes).expect("tkl already bounds-checked to <= 8");
  let body_start = after_code + tkl as usize;

  if buf.len() < body_start + body_len as usize {
    return TcpParseOutcome::PayloadPartial {
      code,
      token,
      total_len: body_len as usize,
      available_body: &buf[body_start..],
    };
  }

  let body = &mut buf[body_start..body_start + body_len as usize];
  let (options_len, has_payload) = {
    let probe = OptionList::from_serialized(body, body_len as usize);
    match probe.validate_until_payload_marker(body_len as usize) {
      | Ok(v) => v,
      | Err(_) => return TcpParseOutcome::Malformed(TcpFrameError::MalformedOptions),
    }
  };

  let (opts_slice, after_opts) = body.split_at_mut(options_len);
  let options = OptionList::from_serialized(opts_slice, options_len);
  let payload = if has_payload { &after_opts[1..] } else { &[] };

  TcpParseOutcome::Complete {
    message: Message { code, token, options, payload },
    consumed: body_start + body_len as usize,
  }
}

fn extended_len_bytes(body_len: u32) -> (u8, usize) {
  match body_len {
    | n if n >= EXT_LEN_BASE_65805 => (15, 4),
    | n if n >= EXT_LEN_BASE_269 => (14, 2),
    | n if n >= EXT_LEN_BASE_13 => (13, 1),
    | _ => (body_len as u8, 0),
  }
}

/// Serialize a message using TCP framing, returning the number of bytes
/// written.
pub fn serialize(dst: &mut [u8], message: &Message<'_>) -> Result<usize, TcpFrameError> {
  let body_len = (message.options.len_bytes()
                   + if message.payload.is_empty() { 0 } else { 1 + message.payload.len() })
    as u32;
  let (len_nibble, ext_bytes) = extended_len_bytes(body_len);

  let mut a = Appender::new(dst);
  let head = (len_nibble << 4) | message.token.len();
  a.append_u8(head).map_err(|_| TcpFrameError::DestinationTooSmall)?;

  match ext_bytes {
    | 1 => a.append_u8((body_len - EXT_LEN_BASE_13) as u8)
            .map_err(|_| TcpFrameError::DestinationTooSmall)?,
    | 2 => a.append(&((body_len - EXT_LEN_BASE_269) as u16).to_be_bytes())
            .map_err(|_| TcpFrameError::DestinationTooSmall)?,
    | 4 => a.append(&(body_len - EXT_LEN_BASE_65805).to_be_bytes())
            .map_err(|_| TcpFrameError::DestinationTooSmall)?,
    | _ => {},
  }

  a.append_u8(message.code.to_byte()).map_err(|_| TcpFrameError::DestinationTooSmall)?;
  a.append(message.token.as_bytes()).map_err(|_| TcpFrameError::DestinationTooSmall)?;
  a.append(message.options.as_bytes()).map_err(|_| TcpFrameError::DestinationTooSmall)?;

  if !message.payload.is_empty() {
    a.append_u8(0xFF).map_err(|_| TcpFrameError::DestinationTooSmall)?;
    a.append(message.payload).map_err(|_| TcpFrameError::DestinationTooSmall)?;
  }

  Ok(a.position())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_message<'a>(options: OptionList<'a>) -> Message<'a> {
    Message { code: Code::new(0, 1).unwrap(), token: Token::new(&[1, 2, 3]).unwrap(), options,
              payload: b"payload" }
  }

  #[test]
  fn serialize_then_parse_roundtrips() {
    let mut opts_buf = [0u8; 16];
    let mut options = OptionList::borrowed(&mut opts_buf);
    options.insert(11, b"a").unwrap();
    let message = sample_message(options);

    let mut dst = [0u8; 64];
    let n = serialize(&mut dst, &message).unwrap();

    match parse(&mut dst[..n]) {
      | TcpParseOutcome::Complete { message: parsed, consumed } => {
        assert_eq!(consumed, n);
        assert_eq!(parsed.token.as_bytes(), &[1, 2, 3]);
        assert_eq!(parsed.payload, b"payload");
      },
      | _ => panic!("expected Complete"),
    }
  }

  #[test]
  fn incomplete_header_reports_incomplete() {
    let mut buf = [0xD0u8]; // len nibble 13 needs one more ext-length byte
    assert!(matches!(parse(&mut buf), TcpParseOutcome::Incomplete));
  }

  #[test]
  fn body_longer_than_buffer_reports_payload_partial() {
    let message = Message { code: Code::new(0, 2).unwrap(), token: Token::EMPTY,
                             options: OptionList::owned(), payload: &[7u8; 100] };
    let mut dst = [0u8; 200];
    let n = serialize(&mut dst, &message).unwrap();

    match parse(&mut dst[..n - 30]) {
      | TcpParseOutcome::PayloadPartial { total_len, .. } => assert_eq!(total_len, 101),
      | _ => panic!("expected PayloadPartial"),
    }
  }

  #[test]
  fn extended_length_round_trips_above_269() {
    let message = Message { code: Code::new(0, 1).unwrap(), token: Token::EMPTY,
                             options: OptionList::owned(), payload: &[9u8; 400] };
    let mut dst = vec![0u8; 500];
    let n = serialize(&mut dst, &message).unwrap();
    match parse(&mut dst[..n]) {
      | TcpParseOutcome::Complete { message: parsed, .. } => assert_eq!(parsed.payload.len(), 400),
      | _ => panic!("expected Complete"),
    }
  }

  #[test]
  fn reserved_token_length_rejected() {
    let mut buf = [0x0F, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    assert!(matches!(parse(&mut buf), TcpParseOutcome::Malformed(TcpFrameError::ReservedTokenLength)));
  }
}
