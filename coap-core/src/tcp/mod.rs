//! CoAP-over-TCP connection lifecycle (RFC8323): the CSM handshake every
//! connection starts with, and the Ping/Pong/Release/Abort signaling
//! messages exchanged afterward.

pub mod csm;

use std::time::{Duration, Instant};

use coap_msg::Code;

pub use csm::PeerCapabilities;

use crate::exchange::ExchangeTable;

/// Signaling codes (RFC8323 §11.3), class `7`.
pub mod signal_code {
  use coap_msg::Code;

  pub const CSM: Code = Code { class: 7, detail: 1 };
  pub const PING: Code = Code { class: 7, detail: 2 };
  pub const PONG: Code = Code { class: 7, detail: 3 };
  pub const RELEASE: Code = Code { class: 7, detail: 4 };
  pub const ABORT: Code = Code { class: 7, detail: 5 };
}

/// A new connection's progress toward completing the mandatory CSM
/// handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
  /// Connected, waiting for the peer's CSM. Any non-signaling message
  /// received in this state is a protocol violation (RFC8323 §5.3.1: "the
  /// first message sent … MUST be a CSM message").
  AwaitingPeerCsm { deadline: Instant },
  /// Handshake complete; normal traffic may flow.
  Established { peer: PeerCapabilities },
  /// Local Release sent, or peer's Release received: draining in-flight
  /// exchanges before closing.
  Releasing,
  /// Aborted, locally or by the peer, with a human-readable reason. Terminal:
  /// no further I/O happens on this connection except draining already-
  /// buffered bytes.
  Aborted { reason: &'static str },
}

/// What the caller must actually do in response to `on_message` or
/// `on_csm_timeout`, beyond updating the connection's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Nothing further required.
  None,
  /// Send a Pong, echoing the Custody option if the Ping carried one.
  SendPong { echo_custody: bool },
  /// Drain buffered input, then close the transport.
  DrainAndClose,
  /// Emit an Abort signaling message with this reason, and fail every
  /// exchange outstanding on this connection with `EXCHANGE_CANCELED` (see
  /// [`fail_all_pending`]).
  AbortAndFailPending { reason: &'static str },
}

impl ConnectionState {
  pub fn awaiting_csm(now: Instant, timeout: Duration) -> Self {
    ConnectionState::AwaitingPeerCsm { deadline: now + timeout }
  }

  /// Handle an incoming message's code, given the options of its CSM
  /// payload if it is one, and whether a Ping carried the Custody option.
  /// Returns the next state and the I/O the caller must perform.
  pub fn on_message(&self, code: Code, has_custody: bool, peer: Option<PeerCapabilities>)
                     -> (ConnectionState, Action) {
    match self {
      | ConnectionState::AwaitingPeerCsm { .. } => {
        if code == signal_code::CSM {
          (ConnectionState::Established { peer: peer.unwrap_or_default() }, Action::None)
        } else {
          let reason = "peer sent a non-signaling message before completing CSM";
          (ConnectionState::Aborted { reason: "CSM_NOT_RECEIVED" },
           Action::AbortAndFailPending { reason })
        }
      },
      | ConnectionState::Established { peer } => {
        if code == signal_code::PING {
          (ConnectionState::Established { peer: *peer }, Action::SendPong { echo_custody: has_custody })
        } else if code == signal_code::RELEASE {
          (ConnectionState::Releasing, Action::DrainAndClose)
        } else if code == signal_code::ABORT {
          (ConnectionState::Aborted { reason: "peer sent Abort" }, Action::None)
        } else {
          (ConnectionState::Established { peer: *peer }, Action::None)
        }
      },
      | ConnectionState::Releasing => (ConnectionState::Releasing, Action::None),
      | ConnectionState::Aborted { reason } => (ConnectionState::Aborted { reason }, Action::None),
    }
  }

  /// Whether the handshake deadline has passed without a CSM arriving.
  pub fn csm_timed_out(&self, now: Instant) -> bool {
    matches!(self, ConnectionState::AwaitingPeerCsm { deadline } if now >= *deadline)
  }

  /// If the CSM handshake deadline has passed, the abort transition and
  /// the action the caller must perform (emit Abort, fail all pending
  /// exchanges). `None` if the deadline hasn't passed yet, or this
  /// connection isn't waiting on a CSM at all.
  pub fn on_csm_timeout(&self, now: Instant) -> Option<(ConnectionState, Action)> {
    if !self.csm_timed_out(now) {
      return None;
    }
    Some((ConnectionState::Aborted { reason: "CSM_NOT_RECEIVED" },
          Action::AbortAndFailPending { reason: "CSM handshake deadline expired" }))
  }
}

/// Fail every exchange outstanding on this connection with
/// `EXCHANGE_CANCELED`, as `Action::AbortAndFailPending` requires. Reuses
/// [`ExchangeTable::cancel`], which is already synchronous and idempotent,
/// so this is safe to call even if some exchanges have already completed.
pub fn fail_all_pending(table: &mut ExchangeTable) {
  let ids: Vec<_> = table.all_ids().collect();
  for id in ids {
    table.cancel(id);
  }
}

#[cfg(test)]
mod tests {
  use std::net::SocketAddr;

  use coap_msg::message::Token;
  use coap_msg::opt::OptionList;

  use super::*;
  use crate::exchange::{DeliveryEvent, Reason};

  fn addr() -> SocketAddr {
    "127.0.0.1:5683".parse().unwrap()
  }

  #[test]
  fn csm_before_deadline_establishes_connection() {
    let now = Instant::now();
    let state = ConnectionState::awaiting_csm(now, Duration::from_secs(10));
    let (next, action) = state.on_message(signal_code::CSM, false, Some(PeerCapabilities::DEFAULT));
    assert!(matches!(next, ConnectionState::Established { .. }));
    assert_eq!(action, Action::None);
  }

  #[test]
  fn non_signaling_before_csm_aborts_and_signals_fail_pending() {
    let now = Instant::now();
    let state = ConnectionState::awaiting_csm(now, Duration::from_secs(10));
    let (next, action) = state.on_message(Code::new(0, 1).unwrap(), false, None);
    assert!(matches!(next, ConnectionState::Aborted { reason: "CSM_NOT_RECEIVED" }));
    assert!(matches!(action, Action::AbortAndFailPending { .. }));
  }

  #[test]
  fn csm_deadline_expiry_aborts_and_signals_fail_pending() {
    let now = Instant::now();
    let state = ConnectionState::awaiting_csm(now, Duration::from_millis(1));
    assert!(state.on_csm_timeout(now).is_none());

    let later = now + Duration::from_millis(10);
    let (next, action) = state.on_csm_timeout(later).unwrap();
    assert!(matches!(next, ConnectionState::Aborted { reason: "CSM_NOT_RECEIVED" }));
    assert!(matches!(action, Action::AbortAndFailPending { .. }));
  }

  #[test]
  fn ping_is_answered_with_pong_and_echoes_custody() {
    let established = ConnectionState::Established { peer: PeerCapabilities::DEFAULT };
    let (next, action) = established.on_message(signal_code::PING, true, None);
    assert!(matches!(next, ConnectionState::Established { .. }));
    assert_eq!(action, Action::SendPong { echo_custody: true });

    let (_, action) = established.on_message(signal_code::PING, false, None);
    assert_eq!(action, Action::SendPong { echo_custody: false });
  }

  #[test]
  fn release_drains_and_closes() {
    let established = ConnectionState::Established { peer: PeerCapabilities::DEFAULT };
    let (next, action) = established.on_message(signal_code::RELEASE, false, None);
    assert!(matches!(next, ConnectionState::Releasing));
    assert_eq!(action, Action::DrainAndClose);
  }

  #[test]
  fn abort_from_established_is_terminal_with_no_further_io() {
    let established = ConnectionState::Established { peer: PeerCapabilities::DEFAULT };
    let (next, action) = established.on_message(signal_code::ABORT, false, None);
    assert!(matches!(next, ConnectionState::Aborted { .. }));
    assert_eq!(action, Action::None);
  }

  #[test]
  fn fail_all_pending_fires_terminal_callback_on_every_exchange() {
    let mut table = ExchangeTable::new();
    let now = Instant::now();
    let fired = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

    for i in 0..3u8 {
      let token = Token::new(&[i]).unwrap();
      let fired = fired.clone();
      let cb = Box::new(move |event: DeliveryEvent<'_>| {
        if let DeliveryEvent::Terminal(reason, _) = event {
          fired.borrow_mut().push(reason);
        }
      });
      table.send_async_request(addr(), token, &OptionList::owned(), now, cb);
    }

    fail_all_pending(&mut table);

    assert!(table.is_empty());
    assert_eq!(fired.borrow().len(), 3);
    assert!(fired.borrow().iter().all(|r| *r == Reason::Cancel));
  }
}
