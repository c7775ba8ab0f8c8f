//! Exchange lifecycle: correlating a request with its response (and, for
//! blockwise transfers, correlating later block requests with the transfer
//! they continue) across however many individual UDP datagrams or TCP
//! messages that takes.
//!
//! An exchange is keyed first by token (RFC7252 §5.3.1: unique per
//! outstanding request to a given peer) and, for blockwise continuation
//! matching, by a hash of its "request key" options — the critical options
//! other than Block1/Block2, plus Content-Format — so a follow-up GET for
//! block 2 of a resource can be recognized as continuing the same logical
//! request even though it carries a fresh token.
//!
//! Every exchange owns a delivery callback, supplied by the caller to
//! [`ExchangeTable::send_async_request`] (client) or
//! [`ExchangeTable::accept_async_request`] (server). It is invoked zero or
//! more times with [`DeliveryEvent::PartialContent`] as blockwise chunks
//! arrive, followed by exactly one [`DeliveryEvent::Terminal`] — the
//! exchange is torn down the moment that terminal call is made.

pub mod client;
pub mod server;

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use blake2::{Blake2s256, Digest};
use coap_msg::message::Token;
use coap_msg::opt::{is_request_key_option, OptionList};

pub use client::ClientState;
pub use server::ServerState;

/// A blake2s-256 hash of a request's "request key" options, used to match
/// later blockwise continuation requests to the transfer they belong to
/// without re-comparing raw option bytes on every lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKeyHash([u8; 32]);

impl RequestKeyHash {
  pub fn compute(options: &OptionList<'_>) -> Self {
    let mut hasher = Blake2s256::new();
    for (number, value) in options.iter() {
      if is_request_key_option(number) {
        hasher.update(number.to_be_bytes());
        hasher.update((value.len() as u32).to_be_bytes());
        hasher.update(value);
      }
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Self(out)
  }
}

/// Which side of the exchange this node is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  Client,
  Server,
}

/// Why a terminal delivery callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
  /// The exchange completed and a full response/request body is available.
  Ok,
  /// The exchange failed (malformed peer data, protocol error, ...).
  Fail,
  /// The application canceled the exchange. Client-side terminal reason.
  Cancel,
  /// A retry budget or exchange deadline elapsed with no activity.
  /// Modeled as a cancellation: delivered the same as `Cancel`/`Cleanup`.
  Timeout,
  /// The application canceled the exchange, or the client never resumed
  /// pulling a blockwise response. Server-side terminal reason.
  Cleanup,
}

/// One notification handed to an exchange's delivery callback.
///
/// Callbacks for a given exchange are invoked in the order
/// `PartialContent*, Terminal`, with exactly one `Terminal` ever fired.
#[derive(Debug, Clone, Copy)]
pub enum DeliveryEvent<'a> {
  /// A blockwise chunk of the request or response body arrived (or was
  /// sent); more are expected.
  PartialContent(&'a [u8]),
  /// The exchange reached a terminal state. `body` is the final chunk for
  /// `Reason::Ok`, empty for every other reason.
  Terminal(Reason, &'a [u8]),
}

/// A client or server exchange's delivery callback.
pub type DeliveryCallback = Box<dyn FnMut(DeliveryEvent<'_>)>;

/// The state common to both client- and server-side exchanges, a
/// role-specific state machine, and the delivery callback supplied when
/// the exchange was opened.
pub struct Exchange {
  pub token: Token,
  pub peer: SocketAddr,
  pub key_hash: RequestKeyHash,
  pub created_at: Instant,
  pub last_activity: Instant,
  pub role: Role,
  pub client_state: Option<ClientState>,
  pub server_state: Option<ServerState>,
  delivery: DeliveryCallback,
  terminal_fired: bool,
}

impl fmt::Debug for Exchange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Exchange")
     .field("token", &self.token)
     .field("peer", &self.peer)
     .field("key_hash", &self.key_hash)
     .field("role", &self.role)
     .field("client_state", &self.client_state)
     .field("server_state", &self.server_state)
     .field("terminal_fired", &self.terminal_fired)
     .finish_non_exhaustive()
  }
}

impl Exchange {
  pub fn new_client(token: Token, peer: SocketAddr, key_hash: RequestKeyHash, now: Instant,
                     delivery: DeliveryCallback)
                     -> Self {
    Self { token, peer, key_hash, created_at: now, last_activity: now, role: Role::Client,
           client_state: Some(ClientState::Requesting), server_state: None, delivery,
           terminal_fired: false }
  }

  pub fn new_server(token: Token, peer: SocketAddr, key_hash: RequestKeyHash, now: Instant,
                     delivery: DeliveryCallback)
                     -> Self {
    Self { token, peer, key_hash, created_at: now, last_activity: now, role: Role::Server,
           client_state: None, server_state: Some(ServerState::AwaitingMoreBlocks), delivery,
           terminal_fired: false }
  }

  pub fn touch(&mut self, now: Instant) {
    self.last_activity = now;
  }

  pub fn is_terminal_fired(&self) -> bool {
    self.terminal_fired
  }

  /// Invoke the delivery callback with a non-terminal chunk.
  fn fire_partial_content(&mut self, chunk: &[u8]) {
    debug_assert!(!self.terminal_fired,
                  "partial content delivered to an exchange after its terminal callback");
    (self.delivery)(DeliveryEvent::PartialContent(chunk));
  }

  /// Invoke the delivery callback with the terminal event. Idempotent: a
  /// second call is a no-op, so a caller racing a cancellation against a
  /// completing response doesn't need to coordinate.
  fn fire_terminal(&mut self, reason: Reason, body: &[u8]) {
    if self.terminal_fired {
      return;
    }
    self.terminal_fired = true;
    (self.delivery)(DeliveryEvent::Terminal(reason, body));
  }
}

/// A handle identifying one exchange, unique within a context for as long
/// as the exchange is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId {
  peer: SocketAddr,
  token: Token,
}

impl ExchangeId {
  pub fn new(peer: SocketAddr, token: Token) -> Self {
    Self { peer, token }
  }

  pub fn peer(&self) -> SocketAddr {
    self.peer
  }

  pub fn token(&self) -> Token {
    self.token
  }
}

/// All exchanges this node currently has outstanding, indexed by
/// `(peer, token)`.
///
/// Cancellation requested from inside a delivery callback is deferred:
/// [`Self::cancel_deferred`] only enqueues the id, and the driving loop calls
/// [`Self::flush_cancellations`] once the callback returns. This avoids a
/// callback mutating the very table being iterated to invoke it. A direct,
/// synchronous [`Self::cancel`] is available for callers outside that
/// reentrancy hazard (e.g. an application canceling an exchange from its
/// own main loop, or a CSM timeout failing every pending exchange).
#[derive(Default)]
pub struct ExchangeTable {
  exchanges: HashMap<ExchangeId, Exchange>,
  pending_cancellations: Vec<(ExchangeId, Reason)>,
}

impl fmt::Debug for ExchangeTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExchangeTable")
     .field("len", &self.exchanges.len())
     .field("pending_cancellations", &self.pending_cancellations.len())
     .finish()
  }
}

impl ExchangeTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Open a client-side exchange for a request about to be sent
  /// (`queued`, per the client state machine). `request_options` is hashed
  /// into the exchange's request key for later blockwise-continuation
  /// matching.
  pub fn send_async_request(&mut self, peer: SocketAddr, token: Token,
                             request_options: &OptionList<'_>, now: Instant,
                             delivery: DeliveryCallback)
                             -> ExchangeId {
    let id = ExchangeId::new(peer, token);
    let key_hash = RequestKeyHash::compute(request_options);
    self.exchanges.insert(id, Exchange::new_client(token, peer, key_hash, now, delivery));
    id
  }

  /// Open a server-side exchange for a request that just arrived
  /// (`awaiting_first_chunk`, per the server state machine).
  pub fn accept_async_request(&mut self, peer: SocketAddr, token: Token,
                               request_options: &OptionList<'_>, now: Instant,
                               delivery: DeliveryCallback)
                               -> ExchangeId {
    let id = ExchangeId::new(peer, token);
    let key_hash = RequestKeyHash::compute(request_options);
    self.exchanges.insert(id, Exchange::new_server(token, peer, key_hash, now, delivery));
    id
  }

  pub fn get(&self, id: ExchangeId) -> Option<&Exchange> {
    self.exchanges.get(&id)
  }

  pub fn get_mut(&mut self, id: ExchangeId) -> Option<&mut Exchange> {
    self.exchanges.get_mut(&id)
  }

  /// Find an exchange from the same peer whose request-key hash matches —
  /// used to route a blockwise continuation request (which may carry a
  /// different token) to the transfer it's continuing.
  pub fn find_by_key(&self, peer: SocketAddr, key_hash: RequestKeyHash)
                      -> Option<(ExchangeId, &Exchange)> {
    self.exchanges.iter().find(|(id, e)| id.peer == peer && e.key_hash == key_hash)
                  .map(|(id, e)| (*id, e))
  }

  /// Deliver one more chunk of a streaming payload to `id`'s callback.
  pub fn deliver_partial_content(&mut self, id: ExchangeId, chunk: &[u8], now: Instant) {
    if let Some(ex) = self.exchanges.get_mut(&id) {
      ex.touch(now);
      ex.fire_partial_content(chunk);
    }
  }

  /// Deliver the terminal event for `id` and remove the exchange — an
  /// exchange's lifetime ends the moment its terminal callback fires.
  pub fn deliver_terminal(&mut self, id: ExchangeId, reason: Reason, body: &[u8]) {
    if let Some(mut ex) = self.exchanges.remove(&id) {
      ex.fire_terminal(reason, body);
    }
  }

  /// `exchange_cancel`: idempotent and synchronous. Fires the terminal
  /// callback with `Cancel` (client exchanges) or `Cleanup` (server
  /// exchanges) before returning. A second call for the same id is a
  /// no-op, since the first call already removed the exchange.
  pub fn cancel(&mut self, id: ExchangeId) {
    if let Some(mut ex) = self.exchanges.remove(&id) {
      let reason = match ex.role {
        | Role::Client => Reason::Cancel,
        | Role::Server => Reason::Cleanup,
      };
      ex.fire_terminal(reason, &[]);
    }
  }

  /// Queue `id` for cancellation once the current callback returns. Use
  /// this instead of [`Self::cancel`] when canceling from inside an
  /// exchange's own delivery callback.
  pub fn cancel_deferred(&mut self, id: ExchangeId, reason: Reason) {
    self.pending_cancellations.push((id, reason));
  }

  /// Apply any cancellations queued by [`Self::cancel_deferred`]. Call
  /// this after any application callback that might have called it.
  pub fn flush_cancellations(&mut self) {
    for (id, reason) in self.pending_cancellations.drain(..) {
      if let Some(mut ex) = self.exchanges.remove(&id) {
        ex.fire_terminal(reason, &[]);
      }
    }
  }

  pub fn remove(&mut self, id: ExchangeId) -> Option<Exchange> {
    self.exchanges.remove(&id)
  }

  pub fn len(&self) -> usize {
    self.exchanges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.exchanges.is_empty()
  }

  /// Exchanges that haven't seen activity since `deadline`.
  pub fn expired(&self, deadline: Instant) -> impl Iterator<Item = ExchangeId> + '_ {
    self.exchanges.iter().filter(move |(_, e)| e.last_activity <= deadline).map(|(id, _)| *id)
  }

  /// Every outstanding exchange's id, regardless of activity — used to fail
  /// a connection's whole exchange set at once (e.g. on CSM timeout).
  pub fn all_ids(&self) -> impl Iterator<Item = ExchangeId> + '_ {
    self.exchanges.keys().copied()
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use super::*;

  fn addr() -> SocketAddr {
    "127.0.0.1:5683".parse().unwrap()
  }

  fn recording_callback() -> (DeliveryCallback, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let recorded = log.clone();
    let cb = Box::new(move |event: DeliveryEvent<'_>| {
      let entry = match event {
        | DeliveryEvent::PartialContent(chunk) => format!("partial:{}", chunk.len()),
        | DeliveryEvent::Terminal(reason, body) => format!("terminal:{:?}:{}", reason, body.len()),
      };
      recorded.borrow_mut().push(entry);
    });
    (cb, log)
  }

  #[test]
  fn request_key_hash_ignores_block_options() {
    let mut a = OptionList::owned();
    a.insert(11, b"sensors").unwrap(); // Uri-Path, critical
    a.insert(coap_msg::opt::number::BLOCK2 as u32, &[0x02]).unwrap();

    let mut b = OptionList::owned();
    b.insert(11, b"sensors").unwrap();
    b.insert(coap_msg::opt::number::BLOCK2 as u32, &[0x12]).unwrap(); // different block

    assert_eq!(RequestKeyHash::compute(&a), RequestKeyHash::compute(&b));
  }

  #[test]
  fn request_key_hash_distinguishes_different_paths() {
    let mut a = OptionList::owned();
    a.insert(11, b"sensors").unwrap();
    let mut b = OptionList::owned();
    b.insert(11, b"actuators").unwrap();
    assert_ne!(RequestKeyHash::compute(&a), RequestKeyHash::compute(&b));
  }

  #[test]
  fn send_async_request_delivers_partial_then_terminal_in_order() {
    let mut table = ExchangeTable::new();
    let now = Instant::now();
    let token = Token::new(&[1]).unwrap();
    let (cb, log) = recording_callback();

    let id = table.send_async_request(addr(), token, &OptionList::owned(), now, cb);
    table.deliver_partial_content(id, &[0u8; 4], now);
    table.deliver_partial_content(id, &[0u8; 4], now);
    table.deliver_terminal(id, Reason::Ok, &[0u8; 10]);

    assert_eq!(*log.borrow(),
               vec!["partial:4".to_string(), "partial:4".to_string(), "terminal:Ok:10".to_string()]);
    assert!(table.get(id).is_none(), "exchange is torn down once its terminal fires");
  }

  #[test]
  fn cancel_is_synchronous_and_idempotent() {
    let mut table = ExchangeTable::new();
    let now = Instant::now();
    let token = Token::new(&[2]).unwrap();
    let (cb, log) = recording_callback();

    let id = table.send_async_request(addr(), token, &OptionList::owned(), now, cb);
    table.cancel(id);
    assert_eq!(*log.borrow(), vec!["terminal:Cancel:0".to_string()]);

    // second cancel is a no-op: no second terminal callback
    table.cancel(id);
    assert_eq!(*log.borrow(), vec!["terminal:Cancel:0".to_string()]);
  }

  #[test]
  fn server_cancellation_reason_is_cleanup() {
    let mut table = ExchangeTable::new();
    let now = Instant::now();
    let token = Token::new(&[3]).unwrap();
    let (cb, log) = recording_callback();

    let id = table.accept_async_request(addr(), token, &OptionList::owned(), now, cb);
    table.cancel(id);
    assert_eq!(*log.borrow(), vec!["terminal:Cleanup:0".to_string()]);
  }

  #[test]
  fn deferred_cancellation_does_not_fire_until_flushed() {
    let mut table = ExchangeTable::new();
    let now = Instant::now();
    let token = Token::new(&[4]).unwrap();
    let (cb, log) = recording_callback();

    let id = table.send_async_request(addr(), token, &OptionList::owned(), now, cb);
    table.cancel_deferred(id, Reason::Cancel);
    assert!(log.borrow().is_empty());
    assert!(table.get(id).is_some());

    table.flush_cancellations();
    assert_eq!(*log.borrow(), vec!["terminal:Cancel:0".to_string()]);
    assert!(table.get(id).is_none());
  }

  #[test]
  fn find_by_key_locates_continuation_with_different_token() {
    let mut table = ExchangeTable::new();
    let now = Instant::now();
    let mut opts = OptionList::owned();
    opts.insert(11, b"sensors").unwrap();
    let key = RequestKeyHash::compute(&opts);

    let token = Token::new(&[9]).unwrap();
    let (cb, _log) = recording_callback();
    table.send_async_request(addr(), token, &opts, now, cb);

    let (found_id, found) = table.find_by_key(addr(), key).unwrap();
    assert_eq!(found.token, token);
    assert_eq!(found_id.token(), token);
  }
}
