//! Thin wrappers around the `log` facade so call sites read as intent
//! ("a retransmission happened") rather than bare `log::debug!` calls, and
//! so the rest of the crate has one place to change log targets from.

/// Emitted once per exchange, on creation and terminal state transitions.
macro_rules! log_exchange {
  ($($arg:tt)*) => {
    log::debug!(target: "coap_core::exchange", $($arg)*)
  };
}

/// Emitted for blockwise fragmentation/reassembly progress.
macro_rules! log_block {
  ($($arg:tt)*) => {
    log::trace!(target: "coap_core::block", $($arg)*)
  };
}

/// Emitted for TCP connection lifecycle and CSM handshake events.
macro_rules! log_tcp {
  ($($arg:tt)*) => {
    log::debug!(target: "coap_core::tcp", $($arg)*)
  };
}

pub(crate) use {log_block, log_exchange, log_tcp};
