//! Streaming decoder for SenML packs encoded in CBOR (RFC8428 §6, "SenML
//! CBOR Data Format"). Records are resolved one at a time — the basename
//! (`bn`) accumulates across the pack and gets concatenated onto every
//! record's own name — so a caller processing a long pack never needs the
//! whole thing in memory as a parsed structure, only the basename and
//! whichever record it's currently looking at.
//!
//! Only the restricted label set `{bn, n, v, vs, vb, vd}` is accepted;
//! every other SenML label (Base-Time, Time, Unit, Sum, ...) is a `FORMAT`
//! error here rather than being silently skipped, and numeric values are
//! not resolved to a concrete Rust type until the caller disambiguates
//! which of `INT`/`UINT`/`DOUBLE` it wants (see [`NumericLiteral`]).

use coap_msg::cursor::Extractor;

/// SenML-CBOR integer map keys this decoder recognizes, accepted or not
/// (RFC8428 Table 4). Only the six in [`label::ACCEPTED`] are legal here;
/// every other key, known or not, is a `FORMAT` error.
mod label {
  pub const BASE_NAME: i64 = -2;
  pub const NAME: i64 = 0;
  pub const VALUE: i64 = 2;
  pub const STRING_VALUE: i64 = 3;
  pub const BOOL_VALUE: i64 = 4;
  pub const DATA_VALUE: i64 = 8;
}

/// Decoding failures. CBOR's structure is rigid enough that almost every
/// failure mode is "this byte (or this label) wasn't what the grammar
/// required here".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CborError {
  Eof,
  UnsupportedMajorType(u8),
  UnsupportedAdditionalInfo(u8),
  NotUtf8,
  IndefiniteChunkWrongType,
  MapKeyNotInteger,
  ExpectedArray,
  ExpectedMap,
  /// A map key outside `{-2, 0, 2, 3, 4, 8}` — includes recognized-but-
  /// disallowed labels like Base-Time, Time, and Unit.
  UnrecognizedLabel(i64),
  /// `bn`/`n` didn't concatenate into a legal `/a/b/c/d` path.
  InvalidPath,
  /// More than one of `v`/`vs`/`vb`/`vd` appeared in the same record.
  MultipleValueLabels,
  /// `bn` or `n` appeared twice in the same record.
  DuplicateLabel,
  /// A record had no value label at all.
  MissingValue,
  /// A numeric value was asked to disambiguate to a type its literal form
  /// can't support (e.g. `UINT` requested for a negative integer).
  TypeMismatch,
}

/// A data-model path of 1-4 decimal segments, each in `[0, 65535]`,
/// assembled from a SenML record's concatenated `bn` + `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
  segments: Vec<u16>,
}

impl Path {
  pub fn segments(&self) -> &[u16] {
    &self.segments
  }

  fn parse(raw: &str) -> Result<Path, CborError> {
    let rest = raw.strip_prefix('/').ok_or(CborError::InvalidPath)?;
    if rest.is_empty() {
      return Err(CborError::InvalidPath);
    }

    let mut segments = Vec::new();
    for part in rest.split('/') {
      if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CborError::InvalidPath);
      }
      let id: u32 = part.parse().map_err(|_| CborError::InvalidPath)?;
      if id >= 65536 {
        return Err(CborError::InvalidPath);
      }
      segments.push(id as u16);
    }

    if segments.len() > 4 {
      return Err(CborError::InvalidPath);
    }
    Ok(Path { segments })
  }
}

/// A bitmask of the numeric types a [`NumericLiteral`] can legally
/// disambiguate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMask(u8);

impl TypeMask {
  pub const DOUBLE: TypeMask = TypeMask(1 << 2);
  pub const INT: TypeMask = TypeMask(1 << 0);
  pub const UINT: TypeMask = TypeMask(1 << 1);

  pub fn contains(self, desired: DesiredType) -> bool {
    let bit = match desired {
      | DesiredType::Int => Self::INT.0,
      | DesiredType::UInt => Self::UINT.0,
      | DesiredType::Double => Self::DOUBLE.0,
    };
    self.0 & bit != 0
  }
}

impl std::ops::BitOr for TypeMask {
  type Output = TypeMask;

  fn bitor(self, rhs: TypeMask) -> TypeMask {
    TypeMask(self.0 | rhs.0)
  }
}

/// The type a caller wants a [`NumericLiteral`] resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredType {
  Int,
  UInt,
  Double,
}

/// A numeric SenML value (the `v` label) in its as-decoded CBOR form,
/// not yet committed to an `i64`/`u64`/`f64` Rust type.
///
/// The decoder never picks a type on its own — see
/// [`Self::acceptable_types`] and [`Self::confirm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericLiteral {
  /// CBOR major type 0: a non-negative integer.
  UInt(u64),
  /// CBOR major type 1: `-1 - n` for the stored `n`.
  NegInt(u64),
  /// CBOR major type 7: a half/single/double-precision float.
  Float(f64),
}

/// A [`NumericLiteral`] resolved to a concrete type via
/// [`NumericLiteral::confirm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfirmedValue {
  Int(i64),
  UInt(u64),
  Double(f64),
}

impl NumericLiteral {
  /// Which types this literal could legally be confirmed as, for a caller
  /// deciding how to respond to a `WANT_TYPE_DISAMBIGUATION` status.
  pub fn acceptable_types(self) -> TypeMask {
    match self {
      | NumericLiteral::UInt(u) => {
        let mut mask = TypeMask::DOUBLE | TypeMask::UINT;
        if u <= i64::MAX as u64 {
          mask = mask | TypeMask::INT;
        }
        mask
      },
      | NumericLiteral::NegInt(u) => {
        let mut mask = TypeMask::DOUBLE;
        if (-1i128 - u as i128) >= i64::MIN as i128 {
          mask = mask | TypeMask::INT;
        }
        mask
      },
      | NumericLiteral::Float(f) => {
        let mut mask = TypeMask::DOUBLE;
        if f == f.trunc() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
          mask = mask | TypeMask::INT;
        }
        mask
      },
    }
  }

  /// Resolve this literal to `desired`, applying the conversion rules:
  /// `INT` accepts any integer (of either sign) or trunc-exact float that
  /// fits in `i64`; `UINT` accepts only a non-negative integer literal;
  /// `DOUBLE` accepts anything, silently losing precision for magnitudes
  /// above 2^53.
  pub fn confirm(self, desired: DesiredType) -> Result<ConfirmedValue, CborError> {
    match (self, desired) {
      | (NumericLiteral::UInt(u), DesiredType::Int) if u <= i64::MAX as u64 => {
        Ok(ConfirmedValue::Int(u as i64))
      },
      | (NumericLiteral::NegInt(u), DesiredType::Int) => {
        i64::try_from(-1i128 - u as i128).map(ConfirmedValue::Int)
            .map_err(|_| CborError::TypeMismatch)
      },
      | (NumericLiteral::Float(f), DesiredType::Int)
        if f == f.trunc() && f >= i64::MIN as f64 && f <= i64::MAX as f64 =>
      {
        Ok(ConfirmedValue::Int(f as i64))
      },

      | (NumericLiteral::UInt(u), DesiredType::UInt) => Ok(ConfirmedValue::UInt(u)),

      | (NumericLiteral::UInt(u), DesiredType::Double) => Ok(ConfirmedValue::Double(u as f64)),
      | (NumericLiteral::NegInt(u), DesiredType::Double) => {
        Ok(ConfirmedValue::Double(-1.0 - u as f64))
      },
      | (NumericLiteral::Float(f), DesiredType::Double) => Ok(ConfirmedValue::Double(f)),

      | _ => Err(CborError::TypeMismatch),
    }
  }
}

/// The resolved value of one SenML record, disambiguated by which of
/// `v`/`vs`/`vb`/`vd` was present. Numeric values still need
/// [`NumericLiteral::confirm`] before use.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
  Numeric(NumericLiteral),
  Text(String),
  Bool(bool),
  Bytes(Vec<u8>),
}

/// One fully resolved SenML measurement: a path (basename concatenated
/// with this record's own name) and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  pub path: Path,
  pub value: RecordValue,
}

#[derive(Debug, Clone, Default)]
struct BaseState {
  name: String,
}

/// Whether a CBOR array/map header declared a fixed length or is
/// indefinite-length (terminated by a `0xFF` break byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
  Definite(u64),
  Indefinite,
}

fn read_header(ex: &mut Extractor<'_>) -> Result<(u8, u8), CborError> {
  let b = ex.take_u8().map_err(|_| CborError::Eof)?;
  Ok((b >> 5, b & 0x1F))
}

fn read_uint_arg(info: u8, ex: &mut Extractor<'_>) -> Result<u64, CborError> {
  match info {
    | 0..=23 => Ok(info as u64),
    | 24 => Ok(ex.take_u8().map_err(|_| CborError::Eof)? as u64),
    | 25 => {
      let b = ex.take(2).map_err(|_| CborError::Eof)?;
      Ok(u16::from_be_bytes([b[0], b[1]]) as u64)
    },
    | 26 => {
      let b = ex.take(4).map_err(|_| CborError::Eof)?;
      Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
    },
    | 27 => {
      let b = ex.take(8).map_err(|_| CborError::Eof)?;
      Ok(u64::from_be_bytes(b.try_into().unwrap()))
    },
    | other => Err(CborError::UnsupportedAdditionalInfo(other)),
  }
}

fn read_length(info: u8, ex: &mut Extractor<'_>) -> Result<Length, CborError> {
  if info == 31 {
    Ok(Length::Indefinite)
  } else {
    Ok(Length::Definite(read_uint_arg(info, ex)?))
  }
}

fn half_to_f64(bits: u16) -> f64 {
  let sign = (bits >> 15) & 1;
  let exp = (bits >> 10) & 0x1F;
  let frac = bits & 0x3FF;
  let value = if exp == 0 {
    (frac as f64) * 2f64.powi(-24)
  } else if exp == 0x1F {
    if frac == 0 { f64::INFINITY } else { f64::NAN }
  } else {
    (1.0 + frac as f64 / 1024.0) * 2f64.powi(exp as i32 - 15)
  };
  if sign == 1 { -value } else { value }
}

/// Parse one CBOR integer (major type 0 or 1) into an `i64`, used for map
/// keys (SenML labels are always small integers).
fn read_int(ex: &mut Extractor<'_>) -> Result<i64, CborError> {
  let (major, info) = read_header(ex)?;
  let magnitude = read_uint_arg(info, ex)? as i64;
  match major {
    | 0 => Ok(magnitude),
    | 1 => Ok(-1 - magnitude),
    | other => Err(CborError::UnsupportedMajorType(other)),
  }
}

/// Parse a CBOR numeric value (integer or float) without committing to a
/// Rust numeric type — see [`NumericLiteral`].
fn read_numeric_literal(ex: &mut Extractor<'_>) -> Result<NumericLiteral, CborError> {
  let (major, info) = read_header(ex)?;
  match major {
    | 0 => Ok(NumericLiteral::UInt(read_uint_arg(info, ex)?)),
    | 1 => Ok(NumericLiteral::NegInt(read_uint_arg(info, ex)?)),
    | 7 => match info {
      | 25 => {
        let b = ex.take(2).map_err(|_| CborError::Eof)?;
        Ok(NumericLiteral::Float(half_to_f64(u16::from_be_bytes([b[0], b[1]]))))
      },
      | 26 => {
        let b = ex.take(4).map_err(|_| CborError::Eof)?;
        Ok(NumericLiteral::Float(f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64))
      },
      | 27 => {
        let b = ex.take(8).map_err(|_| CborError::Eof)?;
        Ok(NumericLiteral::Float(f64::from_be_bytes(b.try_into().unwrap())))
      },
      | other => Err(CborError::UnsupportedAdditionalInfo(other)),
    },
    | other => Err(CborError::UnsupportedMajorType(other)),
  }
}

fn read_bool(ex: &mut Extractor<'_>) -> Result<bool, CborError> {
  let (major, info) = read_header(ex)?;
  match (major, info) {
    | (7, 20) => Ok(false),
    | (7, 21) => Ok(true),
    | (m, _) => Err(CborError::UnsupportedMajorType(m)),
  }
}

/// Read a text or byte string (major 2 or 3), handling the indefinite-length
/// chunked form by concatenating same-major-type chunks until the break
/// byte.
fn read_string_bytes(ex: &mut Extractor<'_>, expect_major: u8) -> Result<Vec<u8>, CborError> {
  let (major, info) = read_header(ex)?;
  if major != expect_major {
    return Err(CborError::UnsupportedMajorType(major));
  }

  match read_length(info, ex)? {
    | Length::Definite(n) => Ok(ex.take(n as usize).map_err(|_| CborError::Eof)?.to_vec()),
    | Length::Indefinite => {
      let mut out = Vec::new();
      loop {
        if ex.peek(1).map_err(|_| CborError::Eof)?[0] == 0xFF {
          ex.take_u8().ok();
          break;
        }
        let (chunk_major, chunk_info) = read_header(ex)?;
        if chunk_major != expect_major {
          return Err(CborError::IndefiniteChunkWrongType);
        }
        let Length::Definite(n) = read_length(chunk_info, ex)? else {
          return Err(CborError::IndefiniteChunkWrongType); // chunks must be definite-length
        };
        out.extend_from_slice(ex.take(n as usize).map_err(|_| CborError::Eof)?);
      }
      Ok(out)
    },
  }
}

fn read_text(ex: &mut Extractor<'_>) -> Result<String, CborError> {
  String::from_utf8(read_string_bytes(ex, 3)?).map_err(|_| CborError::NotUtf8)
}

fn read_bytes(ex: &mut Extractor<'_>) -> Result<Vec<u8>, CborError> {
  read_string_bytes(ex, 2)
}

/// A streaming decoder over a complete CBOR-encoded SenML pack buffer,
/// yielding one resolved [`Record`] at a time via [`Self::next_record`].
#[derive(Debug)]
pub struct Decoder<'a> {
  ex: Extractor<'a>,
  remaining: Length,
  seen: u64,
  base: BaseState,
}

impl<'a> Decoder<'a> {
  /// Start decoding a pack: `buf` must begin with the top-level CBOR
  /// array.
  pub fn new(buf: &'a [u8]) -> Result<Self, CborError> {
    let mut ex = Extractor::new(buf);
    let (major, info) = read_header(&mut ex)?;
    if major != 4 {
      return Err(CborError::ExpectedArray);
    }
    let remaining = read_length(info, &mut ex)?;
    Ok(Self { ex, remaining, seen: 0, base: BaseState::default() })
  }

  fn array_exhausted(&mut self) -> Result<bool, CborError> {
    match self.remaining {
      | Length::Definite(n) => Ok(self.seen >= n),
      | Length::Indefinite => {
        if self.ex.peek(1).map_err(|_| CborError::Eof)?[0] == 0xFF {
          self.ex.take_u8().ok();
          Ok(true)
        } else {
          Ok(false)
        }
      },
    }
  }

  /// Decode the next record, resolving the path against the basename
  /// accumulated so far. Returns `Ok(None)` once the pack is exhausted.
  pub fn next_record(&mut self) -> Result<Option<Record>, CborError> {
    if self.ex.is_exhausted() || self.array_exhausted()? {
      return Ok(None);
    }
    self.seen += 1;

    let (major, info) = read_header(&mut self.ex)?;
    if major != 5 {
      return Err(CborError::ExpectedMap);
    }
    let map_len = read_length(info, &mut self.ex)?;

    let mut name_suffix: Option<String> = None;
    let mut saw_base_name = false;
    let mut value: Option<RecordValue> = None;

    let mut entries_seen = 0u64;
    loop {
      match map_len {
        | Length::Definite(n) if entries_seen >= n => break,
        | Length::Indefinite => {
          if self.ex.peek(1).map_err(|_| CborError::Eof)?[0] == 0xFF {
            self.ex.take_u8().ok();
            break;
          }
        },
        | _ => {},
      }
      entries_seen += 1;

      let key = read_int(&mut self.ex).map_err(|_| CborError::MapKeyNotInteger)?;
      match key {
        | label::BASE_NAME => {
          if saw_base_name {
            return Err(CborError::DuplicateLabel);
          }
          saw_base_name = true;
          self.base.name = read_text(&mut self.ex)?;
        },
        | label::NAME => {
          if name_suffix.is_some() {
            return Err(CborError::DuplicateLabel);
          }
          name_suffix = Some(read_text(&mut self.ex)?);
        },
        | label::VALUE => {
          if value.is_some() {
            return Err(CborError::MultipleValueLabels);
          }
          value = Some(RecordValue::Numeric(read_numeric_literal(&mut self.ex)?));
        },
        | label::STRING_VALUE => {
          if value.is_some() {
            return Err(CborError::MultipleValueLabels);
          }
          value = Some(RecordValue::Text(read_text(&mut self.ex)?));
        },
        | label::BOOL_VALUE => {
          if value.is_some() {
            return Err(CborError::MultipleValueLabels);
          }
          value = Some(RecordValue::Bool(read_bool(&mut self.ex)?));
        },
        | label::DATA_VALUE => {
          if value.is_some() {
            return Err(CborError::MultipleValueLabels);
          }
          value = Some(RecordValue::Bytes(read_bytes(&mut self.ex)?));
        },
        | other => return Err(CborError::UnrecognizedLabel(other)),
      }
    }

    let raw_path = format!("{}{}", self.base.name, name_suffix.unwrap_or_default());
    let path = Path::parse(&raw_path)?;
    let value = value.ok_or(CborError::MissingValue)?;

    Ok(Some(Record { path, value }))
  }
}
