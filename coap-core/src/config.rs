//! Tunable limits and retry behavior, grouped the way callers construct a
//! runtime context: one `Config` passed in once, not scattered constants.

use std::time::Duration;

/// CoAP's default confirmable-message retry behavior (RFC7252 §4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryStrategy {
  /// Initial timeout before the first retransmission.
  pub ack_timeout: Duration,
  /// Multiplier applied to the timeout after each retransmission.
  pub ack_random_factor: f32,
  /// Maximum number of retransmissions before giving up.
  pub max_retransmit: u8,
}

impl RetryStrategy {
  /// RFC7252's suggested defaults: 2s initial timeout, 1.5x factor, 4
  /// retransmissions.
  pub const DEFAULT: Self =
    Self { ack_timeout: Duration::from_secs(2), ack_random_factor: 1.5, max_retransmit: 4 };

  /// The timeout before retransmission attempt `attempt` (0-indexed).
  pub fn timeout_for_attempt(&self, attempt: u8) -> Duration {
    let factor = self.ack_random_factor.powi(attempt as i32);
    self.ack_timeout.mul_f32(factor)
  }
}

/// Runtime limits and timing knobs shared by the exchange table, blockwise
/// transfer, and TCP handshake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
  /// Retransmission strategy for confirmable UDP messages.
  pub retry: RetryStrategy,
  /// Largest message (framing + options + payload) this node will accept.
  pub max_message_size: usize,
  /// `Max-Message-Size` advertised in our own CSM (RFC8323 §5.3.1).
  pub tcp_max_message_size: u32,
  /// How long to wait for the peer's CSM before giving up on a new TCP
  /// connection.
  pub csm_timeout: Duration,
  /// Preferred block size (szx) used when initiating blockwise transfer.
  pub preferred_block_szx: u8,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      retry: RetryStrategy::DEFAULT,
      max_message_size: 1152, // RFC7252 §4.6: 1024 payload + ~128 header/options headroom
      tcp_max_message_size: 1024 * 1024,
      csm_timeout: Duration::from_secs(10),
      preferred_block_szx: 6, // 1024-byte blocks
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retry_timeout_grows_with_attempt() {
    let r = RetryStrategy::DEFAULT;
    assert!(r.timeout_for_attempt(1) > r.timeout_for_attempt(0));
    assert!(r.timeout_for_attempt(2) > r.timeout_for_attempt(1));
  }

  #[test]
  fn default_config_is_interoperable() {
    let c = Config::default();
    assert!(c.max_message_size >= 1152);
    assert_eq!(c.retry.max_retransmit, 4);
  }
}
