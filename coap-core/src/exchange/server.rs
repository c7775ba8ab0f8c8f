//! Server-side exchange state machine: from the first request block
//! through dispatch and however many response blocks the client pulls.

use coap_msg::Code;

/// States a server-side exchange passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
  /// Still receiving Block1 continuations of the request body.
  AwaitingMoreBlocks,
  /// The full request has arrived and is queued for the data-model
  /// dispatcher.
  Dispatching,
  /// A response is ready and (for Block2) being pulled in chunks by the
  /// client.
  SendingResponse { code: Code },
  /// The exchange completed normally.
  Done,
  /// Canceled (by the application, or because the client never resumed
  /// pulling a blockwise response before its entry timed out).
  Canceled,
}

impl ServerState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, ServerState::Done | ServerState::Canceled)
  }
}
