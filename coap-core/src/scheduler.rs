//! A minimal single-threaded timer wheel. There's no async runtime here:
//! callers run a loop that reads the socket with [`Self::time_to_next`] as
//! the poll timeout, then calls [`Self::poll_expired`] to find out what
//! fired. Retransmission deadlines, the CSM handshake timeout, and
//! exchange-wide timeouts are all just timers here.

use std::time::{Duration, Instant};

/// A handle to a scheduled timer, returned by [`Scheduler::schedule_at`]
/// and usable with [`Scheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry {
  id: TimerId,
  deadline: Instant,
}

/// An ordered set of pending deadlines.
#[derive(Debug, Default)]
pub struct Scheduler {
  next_id: u64,
  entries: Vec<Entry>,
}

impl Scheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Schedule a timer to fire at `deadline`.
  pub fn schedule_at(&mut self, deadline: Instant) -> TimerId {
    let id = TimerId(self.next_id);
    self.next_id += 1;
    let pos = self.entries.partition_point(|e| e.deadline <= deadline);
    self.entries.insert(pos, Entry { id, deadline });
    id
  }

  /// Schedule a timer to fire `delay` from `now`.
  pub fn schedule_in(&mut self, now: Instant, delay: Duration) -> TimerId {
    self.schedule_at(now + delay)
  }

  /// Cancel a pending timer. Returns `false` if it already fired or never
  /// existed.
  pub fn cancel(&mut self, id: TimerId) -> bool {
    if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
      self.entries.remove(pos);
      true
    } else {
      false
    }
  }

  /// How long until the next timer fires, for use as an I/O poll timeout.
  /// `None` means no timers are pending.
  pub fn time_to_next(&self, now: Instant) -> Option<Duration> {
    self.entries.first().map(|e| e.deadline.saturating_duration_since(now))
  }

  /// Remove and return every timer whose deadline has passed.
  pub fn poll_expired(&mut self, now: Instant) -> Vec<TimerId> {
    let split = self.entries.partition_point(|e| e.deadline <= now);
    self.entries.drain(..split).map(|e| e.id).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fires_only_once_past_deadline() {
    let mut s = Scheduler::new();
    let now = Instant::now();
    let id = s.schedule_in(now, Duration::from_millis(10));

    assert!(s.poll_expired(now).is_empty());
    let later = now + Duration::from_millis(20);
    assert_eq!(s.poll_expired(later), vec![id]);
    assert!(s.poll_expired(later).is_empty());
  }

  #[test]
  fn cancel_prevents_firing() {
    let mut s = Scheduler::new();
    let now = Instant::now();
    let id = s.schedule_in(now, Duration::from_millis(1));
    assert!(s.cancel(id));
    assert!(s.poll_expired(now + Duration::from_secs(1)).is_empty());
  }

  #[test]
  fn time_to_next_reflects_earliest_deadline() {
    let mut s = Scheduler::new();
    let now = Instant::now();
    s.schedule_in(now, Duration::from_millis(50));
    s.schedule_in(now, Duration::from_millis(10));
    assert_eq!(s.time_to_next(now), Some(Duration::from_millis(10)));
  }
}
