use std::collections::HashMap;
use std::time::{Duration, Instant};

use runtime::RawFd;

/// How long a pending entry may sit unanswered before the sweep reclaims it.
pub const ENTRY_TTL: Duration = Duration::from_secs(60);

/// A `0100` forwarded to an issuer, waiting for the matching response.
#[derive(Debug, Clone)]
pub struct PendingEntry {
	pub acquirer_fd: RawFd,
	pub connection_id: String,
	pub created_at: Instant,
}

/// `STAN → PendingEntry`, keyed by the request's field 11.
///
/// Insertion on an already-occupied STAN overwrites the prior entry rather
/// than rejecting the new one: STAN reuse inside the pending window is
/// treated as a client bug, not something this layer defends against.
#[derive(Default)]
pub struct CorrelationTable {
	entries: HashMap<String, PendingEntry>,
}

impl CorrelationTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, stan: String, entry: PendingEntry) {
		self.entries.insert(stan, entry);
	}

	/// Removes and returns the entry for `stan`, if any. Used when an issuer
	/// response with a matching STAN arrives.
	pub fn take(&mut self, stan: &str) -> Option<PendingEntry> {
		self.entries.remove(stan)
	}

	/// Drops every entry waiting on `fd`, called when that acquirer socket
	/// closes.
	pub fn purge_socket(&mut self, fd: RawFd) {
		self.entries.retain(|_, entry| entry.acquirer_fd != fd);
	}

	/// Drops every entry older than [`ENTRY_TTL`] as of `now`. Intended to be
	/// called on a periodic tick (every 30s) rather than per-message.
	pub fn sweep(&mut self, now: Instant) {
		self.entries.retain(|_, entry| now.duration_since(entry.created_at) < ENTRY_TTL);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(fd: RawFd) -> PendingEntry {
		PendingEntry { acquirer_fd: fd, connection_id: "127.0.0.1:1".into(), created_at: Instant::now() }
	}

	#[test]
	fn insert_then_take_round_trips() {
		let mut table = CorrelationTable::new();
		table.insert("094906".into(), entry(3));

		let taken = table.take("094906").unwrap();
		assert_eq!(taken.acquirer_fd, 3);
		assert!(table.is_empty());
	}

	#[test]
	fn taking_an_unknown_stan_is_a_miss() {
		let mut table = CorrelationTable::new();
		assert!(table.take("000000").is_none());
	}

	#[test]
	fn inserting_over_an_existing_stan_overwrites_it() {
		let mut table = CorrelationTable::new();
		table.insert("094906".into(), entry(1));
		table.insert("094906".into(), entry(2));

		assert_eq!(table.len(), 1);
		assert_eq!(table.take("094906").unwrap().acquirer_fd, 2);
	}

	#[test]
	fn purging_a_socket_drops_only_its_own_entries() {
		let mut table = CorrelationTable::new();
		table.insert("111111".into(), entry(1));
		table.insert("222222".into(), entry(2));

		table.purge_socket(1);

		assert!(table.take("111111").is_none());
		assert!(table.take("222222").is_some());
	}

	#[test]
	fn sweep_drops_only_entries_past_the_ttl() {
		let mut table = CorrelationTable::new();
		let old = PendingEntry { created_at: Instant::now() - Duration::from_secs(61), ..entry(1) };
		table.entries.insert("111111".into(), old);
		table.insert("222222".into(), entry(2));

		table.sweep(Instant::now());

		assert!(table.take("111111").is_none());
		assert!(table.take("222222").is_some());
	}
}
