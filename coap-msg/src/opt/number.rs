//! Option number constants and their RFC7252 classification
//! (critical/elective, repeatable/non-repeatable).

/// A 16-bit CoAP option number.
pub type OptNumber = u16;

/// Whether an elective option can be safely ignored by a peer that doesn't
/// understand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
  /// Odd option number: a peer that doesn't understand it must reject the
  /// message.
  Critical,
  /// Even option number: a peer may ignore it.
  Elective,
}

/// Whether an option number may legally appear more than once in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeatable {
  /// May appear any number of times.
  Repeatable,
  /// Must appear at most once.
  NonRepeatable,
}

/// The critical/elective-ness of an option number is purely arithmetic.
pub fn criticality(number: OptNumber) -> Criticality {
  if number & 1 == 1 {
    Criticality::Critical
  } else {
    Criticality::Elective
  }
}

/// Repeatability is not derivable from the number and is looked up from the
/// fixed table in RFC7252 §5.10 (plus RFC7959 Block1/Block2 and RFC8613
/// OSCORE). Options outside the known table default to [`Repeatable`], since
/// the core doesn't need to reject unknown repeated elective options.
pub fn repeatable(number: OptNumber) -> Repeatable {
  match number {
    | HOST | IF_NONE_MATCH | PORT | OSCORE | ACCEPT | BLOCK1 | BLOCK2 | PROXY_URI
    | PROXY_SCHEME => Repeatable::NonRepeatable,
    | _ => Repeatable::Repeatable,
  }
}

macro_rules! opt_numbers {
  ($($(#[$m:meta])* $name:ident = $n:literal;)*) => {
    $($(#[$m])* pub const $name: OptNumber = $n;)*
  };
}

opt_numbers! {
  /// Uri-Host
  HOST = 3;
  /// If-Match
  IF_MATCH = 1;
  /// Etag
  ETAG = 4;
  /// If-None-Match
  IF_NONE_MATCH = 5;
  /// Observe (RFC7641)
  OBSERVE = 6;
  /// Uri-Port
  PORT = 7;
  /// Location-Path
  LOCATION_PATH = 8;
  /// OSCORE (RFC8613)
  OSCORE = 9;
  /// Uri-Path
  PATH = 11;
  /// Content-Format
  CONTENT_FORMAT = 12;
  /// Max-Age
  MAX_AGE = 14;
  /// Uri-Query
  QUERY = 15;
  /// Accept
  ACCEPT = 17;
  /// Location-Query
  LOCATION_QUERY = 20;
  /// Block2 (RFC7959)
  BLOCK2 = 23;
  /// Block1 (RFC7959)
  BLOCK1 = 27;
  /// Size2 (RFC7959)
  SIZE2 = 28;
  /// Proxy-Uri
  PROXY_URI = 35;
  /// Proxy-Scheme
  PROXY_SCHEME = 39;
  /// Size1 (RFC7959)
  SIZE1 = 60;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn critical_is_odd() {
    assert_eq!(criticality(IF_MATCH), Criticality::Critical);
    assert_eq!(criticality(HOST), Criticality::Critical);
    assert_eq!(criticality(ETAG), Criticality::Elective);
    assert_eq!(criticality(SIZE1), Criticality::Elective);
  }

  #[test]
  fn non_repeatable_table_matches_spec() {
    for n in [HOST, IF_NONE_MATCH, PORT, OSCORE, ACCEPT, BLOCK1, BLOCK2, PROXY_URI, PROXY_SCHEME] {
      assert_eq!(repeatable(n), Repeatable::NonRepeatable, "{n} should be non-repeatable");
    }

    for n in [IF_MATCH, ETAG, PATH, QUERY, LOCATION_PATH, LOCATION_QUERY] {
      assert_eq!(repeatable(n), Repeatable::Repeatable, "{n} should be repeatable");
    }
  }
}
