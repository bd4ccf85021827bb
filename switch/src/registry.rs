use std::net::IpAddr;

use runtime::RawFd;

use crate::config::Config;
use crate::framer::Framer;

/// What a connected peer turned out to be, decided once at accept time and
/// never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Acquirer,
	Issuer,
	Unknown,
}

/// Strips the IPv4-in-IPv6 mapping prefix a dual-stack listener can hand
/// back for an IPv4 peer, so classification always compares against a bare
/// IPv4 or IPv6 address.
fn unmap(addr: IpAddr) -> IpAddr {
	match addr {
		IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
		v4 => v4,
	}
}

fn is_loopback(addr: IpAddr) -> bool {
	addr.is_loopback()
}

/// A single accepted connection: its socket, peer identity, classification,
/// incoming reassembly state, and outbound write queue.
///
/// The write queue mirrors the teacher runtime's `Entry::queue`/`flush_write`
/// split: a write that would block is queued rather than retried inline, and
/// drained the next time the reactor reports the socket writable.
pub struct Connection {
	pub stream: std::net::TcpStream,
	pub connection_id: String,
	pub peer_addr: IpAddr,
	pub role: Role,
	pub framer: Framer,
	pub outbound: std::collections::VecDeque<Vec<u8>>,
}

impl Connection {
	pub fn new(stream: std::net::TcpStream, peer_addr: std::net::SocketAddr, role: Role) -> Self {
		Self {
			stream,
			connection_id: peer_addr.to_string(),
			peer_addr: unmap(peer_addr.ip()),
			role,
			framer: Framer::new(),
			outbound: std::collections::VecDeque::new(),
		}
	}
}

/// An insertion-ordered `connectionId → fd` association. A plain `Vec` is
/// used rather than a hash map so that "the first currently registered
/// issuer" is a well-defined, deterministic choice rather than whatever
/// order a hasher happens to produce.
#[derive(Default)]
struct RoleMap {
	entries: Vec<(String, RawFd)>,
}

impl RoleMap {
	fn insert(&mut self, connection_id: String, fd: RawFd) {
		self.entries.push((connection_id, fd));
	}

	fn remove(&mut self, fd: RawFd) {
		self.entries.retain(|(_, f)| *f != fd);
	}

	fn first(&self) -> Option<RawFd> {
		self.entries.first().map(|(_, fd)| *fd)
	}

	fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Tracks which live connections are acquirers and which are issuers.
#[derive(Default)]
pub struct Registry {
	acquirers: RoleMap,
	issuers: RoleMap,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Assigns a role to a newly accepted peer, in priority order: loopback,
	/// then the configured acquirer set, then the configured issuer set,
	/// then first-connected-wins.
	pub fn classify(&self, peer: IpAddr, config: &Config) -> Role {
		let peer = unmap(peer);

		if is_loopback(peer) {
			return Role::Acquirer;
		}

		if config.acquirers.contains(&peer) {
			return Role::Acquirer;
		}

		if config.issuers.contains(&peer) {
			return Role::Issuer;
		}

		if self.acquirers.is_empty() {
			Role::Acquirer
		} else if self.issuers.is_empty() {
			Role::Issuer
		} else {
			Role::Unknown
		}
	}

	pub fn register(&mut self, role: Role, connection_id: String, fd: RawFd) {
		match role {
			Role::Acquirer => self.acquirers.insert(connection_id, fd),
			Role::Issuer => self.issuers.insert(connection_id, fd),
			Role::Unknown => {}
		}
	}

	pub fn remove(&mut self, fd: RawFd) {
		self.acquirers.remove(fd);
		self.issuers.remove(fd);
	}

	/// The first currently registered issuer, if any.
	pub fn first_issuer(&self) -> Option<RawFd> {
		self.issuers.first()
	}

	/// The first currently registered acquirer, if any (used by the
	/// operator injection path).
	pub fn first_acquirer(&self) -> Option<RawFd> {
		self.acquirers.first()
	}
}
