//! `coap-core` is the stateful half of a Rust CoAP implementation: given
//! the wire codec in `coap-msg`, it drives exchanges, retransmission,
//! blockwise reassembly, the CoAP-over-TCP connection lifecycle, and
//! dispatch into an LwM2M-style data model.
//!
//! It doesn't assume an async runtime. Sockets are polled through the
//! non-blocking [`socket::Socket`] trait, and time only ever advances when
//! the caller asks [`scheduler::Scheduler`] what's next — the same
//! single-threaded, cooperatively-scheduled shape the wire codec is built
//! around.

#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(unreachable_pub)]

pub(crate) mod logging;

/// Error types shared across the crate.
pub mod error;

/// Retransmission timing and other tunables.
pub mod config;

/// A seedable RNG abstraction, used for CoAP message IDs and tokens.
pub mod rng;

/// A timer wheel for scheduling retransmissions and timeouts.
pub mod scheduler;

/// Non-blocking socket abstractions over UDP and TCP.
pub mod socket;

/// Request/response exchange tracking and correlation.
pub mod exchange;

/// Splitting and reassembling blockwise (RFC7959) transfers.
pub mod block_transfer;

/// CoAP-over-TCP (RFC8323) connection setup and signaling.
pub mod tcp;

/// A streaming SenML-CBOR (RFC8428) decoder.
pub mod senml_cbor;

/// LwM2M-style object/instance/resource dispatch.
pub mod dm;

pub use error::{Code as ErrorCode, Error, When};
