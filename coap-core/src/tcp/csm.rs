//! Capability negotiation (CSM) exchanged as the first message on every
//! new CoAP-over-TCP connection (RFC8323 §5.3).

use coap_msg::opt::OptionList;

/// CSM option numbers (RFC8323 §5.3.1).
pub const OPT_MAX_MESSAGE_SIZE: u32 = 2;
pub const OPT_BLOCK_WISE_TRANSFER: u32 = 4;

/// Ping/Pong option numbers (RFC8323 §5.3.2/§5.3.3).
pub const OPT_CUSTODY: u32 = 2;

/// Release option numbers (RFC8323 §5.3.4).
pub const OPT_ALTERNATIVE_ADDRESS: u32 = 2;
pub const OPT_HOLD_OFF: u32 = 4;

/// Abort option numbers (RFC8323 §5.3.5).
pub const OPT_BAD_CSM_OPTION: u32 = 2;

/// A peer's advertised capabilities, parsed out of its CSM message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCapabilities {
  /// `Max-Message-Size`; defaults to 1152 (RFC8323 §5.3.1) when absent.
  pub max_message_size: u32,
  /// Whether the peer set the (empty-valued) `Block-Wise-Transfer` option,
  /// meaning it also supports BERT blocks.
  pub supports_block_wise: bool,
}

impl PeerCapabilities {
  pub const DEFAULT: Self = Self { max_message_size: 1152, supports_block_wise: false };

  /// Parse capabilities out of a received CSM message's options.
  pub fn from_options(options: &OptionList<'_>) -> Self {
    let max_message_size = options.find_first(OPT_MAX_MESSAGE_SIZE)
                                   .and_then(|v| coap_msg::opt::header::u32_value(v).ok())
                                   .unwrap_or(Self::DEFAULT.max_message_size);
    let supports_block_wise = options.find_first(OPT_BLOCK_WISE_TRANSFER).is_some();
    Self { max_message_size, supports_block_wise }
  }
}

impl Default for PeerCapabilities {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn absent_options_fall_back_to_defaults() {
    let caps = PeerCapabilities::from_options(&OptionList::owned());
    assert_eq!(caps, PeerCapabilities::DEFAULT);
  }

  #[test]
  fn parses_advertised_capabilities() {
    let mut opts = OptionList::owned();
    opts.insert(OPT_MAX_MESSAGE_SIZE, &65536u32.to_be_bytes()).unwrap();
    opts.insert(OPT_BLOCK_WISE_TRANSFER, &[]).unwrap();
    let caps = PeerCapabilities::from_options(&opts);
    assert_eq!(caps.max_message_size, 65536);
    assert!(caps.supports_block_wise);
  }
}
