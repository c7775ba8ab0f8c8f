//! Client-side exchange state machine: the lifecycle of one outstanding
//! request, from first send through however many retransmissions,
//! blockwise continuations, and the terminal response or failure.

use coap_msg::Code;

/// States a client-initiated exchange passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
  /// The request has been handed to the socket but not yet confirmed sent
  /// (non-blocking I/O may need another poll).
  Requesting,
  /// Sent; waiting for an ack (CON) or the response itself (NON, or TCP).
  AwaitingResponse { retransmits: u8 },
  /// A Block1 continuation is in flight: the server asked for (or we're
  /// sending) another chunk of the request body.
  ContinuingBlock1 { next_seq_num: u32 },
  /// A Block2 continuation is in flight: we're pulling more of a blockwise
  /// response body.
  ContinuingBlock2 { next_seq_num: u32 },
  /// The exchange finished with a final response code.
  Done { code: Code },
  /// The application or a timeout canceled the exchange before completion.
  Canceled,
  /// The retry budget was exhausted with no response.
  TimedOut,
}

impl ClientState {
  /// Whether this state is terminal (no more transitions expected).
  pub fn is_terminal(&self) -> bool {
    matches!(self, ClientState::Done { .. } | ClientState::Canceled | ClientState::TimedOut)
  }

  /// Advance from `AwaitingResponse` on a retransmission timeout, failing
  /// once `max_retransmit` has been reached.
  pub fn on_retransmit_timeout(&mut self, max_retransmit: u8) {
    if let ClientState::AwaitingResponse { retransmits } = self {
      if *retransmits >= max_retransmit {
        *self = ClientState::TimedOut;
      } else {
        *retransmits += 1;
      }
    }
  }
}
