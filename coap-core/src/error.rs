//! Error reporting in the shape the rest of this crate propagates: a
//! machine-matchable [`Code`] plus a `when`/`what` pair describing where in
//! the pipeline it happened and why, useful for log lines and for deciding
//! whether a failure is retryable.

use core::fmt;

/// A coarse error classification, stable across releases so callers can
/// match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
  /// A peer sent a non-signaling message before completing the CSM
  /// handshake.
  TcpCsmNotReceived,
  /// The TCP connection closed (cleanly or otherwise) mid-exchange.
  TcpConnClosed,
  /// A message's framing didn't parse.
  MalformedMessage,
  /// A message's option section didn't parse or violated an invariant.
  MalformedOptions,
  /// A partial message was received and no more bytes are coming.
  TruncatedMessageReceived,
  /// A message (or a configured limit on it) exceeded `Config`'s bounds.
  MessageTooBig,
  /// The exchange was canceled, by the application or by a timeout.
  ExchangeCanceled,
  /// A retry budget or deadline elapsed with no response.
  Timeout,
  /// An internal invariant was violated; this indicates a bug here, not
  /// bad input.
  AssertFailed,
}

/// Where in request processing an error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  ParsingMessage,
  SendingMessage,
  AwaitingResponse,
  ReassemblingBlocks,
  PerformingHandshake,
  DispatchingRequest,
  DecodingPayload,
}

/// A `when`/`what`/[`Code`] triple: what was being attempted, what broke,
/// and the stable classification of why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
  pub when: When,
  pub what: &'static str,
  pub code: Code,
}

impl Error {
  pub fn new(when: When, what: &'static str, code: Code) -> Self {
    Self { when, what, code }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?} while {:?}: {}", self.code, self.when, self.what)
  }
}

impl std::error::Error for Error {}
