use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::time::Instant;

use iso8583::{EncoderMode, Message};
use runtime::RawFd;

use crate::config::Config;
use crate::correlation::{CorrelationTable, PendingEntry};
use crate::framer;
use crate::netmgmt;
use crate::registry::{Connection, Registry, Role};

const MISSING_STAN: &str = "000000";
const RESPONSE_CODE_OK: &str = "00";
const RESPONSE_CODE_MISSING_STAN: &str = "96";
const RESPONSE_CODE_NO_ISSUER: &str = "91";

/// Owns every piece of live switch state: the connection table, the role
/// registry, and the STAN correlation table. A single owner rather than a
/// process-wide singleton; the event loop in `main` holds the one `Switch`
/// and drives it.
pub struct Switch {
	config: Config,
	connections: HashMap<RawFd, Connection>,
	registry: Registry,
	correlation: CorrelationTable,
}

impl Switch {
	pub fn new(config: Config) -> Self {
		Self { config, connections: HashMap::new(), registry: Registry::new(), correlation: CorrelationTable::new() }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn connections(&self) -> impl Iterator<Item = (&RawFd, &Connection)> {
		self.connections.iter()
	}

	pub fn connection_mut(&mut self, fd: RawFd) -> Option<&mut Connection> {
		self.connections.get_mut(&fd)
	}

	/// Classifies and registers a freshly accepted socket, returning its fd.
	pub fn accept(&mut self, stream: TcpStream, peer: SocketAddr, fd: RawFd) {
		let role = self.registry.classify(peer.ip(), &self.config);
		let connection = Connection::new(stream, peer, role);

		if role == Role::Unknown {
			log::warn!("connection from {peer} did not match any configured role; messages from it will be dropped");
		} else {
			log::info!("connection from {peer} classified as {role:?}");
		}

		self.registry.register(role, connection.connection_id.clone(), fd);
		self.connections.insert(fd, connection);
	}

	/// Tears down a closed connection: purges its correlation entries,
	/// removes it from the role registry, and drops its state. Per the
	/// switch invariant, the purge happens before any further dispatch runs.
	pub fn remove(&mut self, fd: RawFd) {
		self.correlation.purge_socket(fd);
		self.registry.remove(fd);
		self.connections.remove(&fd);
	}

	pub fn sweep_correlation(&mut self, now: Instant) {
		self.correlation.sweep(now);
	}

	/// Dispatches one complete, still-framed message received on `fd`.
	/// `frame` is the exact payload bytes delivered by the framer, needed
	/// verbatim when forwarding, since re-encoding would not be a bit-exact
	/// copy.
	pub fn on_frame(&mut self, fd: RawFd, frame: &[u8]) {
		let role = match self.connections.get(&fd) {
			Some(c) => c.role,
			None => return,
		};

		let message = match Message::decode(frame, EncoderMode::default()) {
			Ok(message) => message,
			Err(err) => {
				log::warn!("dropping unparseable frame from fd {fd}: {err}");
				return;
			}
		};

		match role {
			Role::Acquirer => self.handle_acquirer(fd, frame, message),
			Role::Issuer => self.handle_issuer(fd, frame, message),
			Role::Unknown => log::warn!("dropping message with mti {} from unclassified fd {fd}", message.mti),
		}
	}

	fn handle_acquirer(&mut self, fd: RawFd, frame: &[u8], message: Message) {
		if message.mti.starts_with("08") {
			let reply = netmgmt::build_reply(&message);
			self.respond(fd, &reply);
			return;
		}

		if message.mti != "0100" {
			log::warn!("dropping unsupported acquirer mti {}", message.mti);
			return;
		}

		let Some(stan) = message.field_text(11).map(str::to_owned) else {
			log::warn!("0100 from fd {fd} is missing field 11 (STAN)");
			let reply = Message::new("0110").with_text(11, MISSING_STAN).with_text(39, RESPONSE_CODE_MISSING_STAN);
			self.respond(fd, &reply);
			return;
		};

		let Some(issuer_fd) = self.registry.first_issuer() else {
			log::warn!("no issuer connected to forward STAN {stan}");
			let reply = Message::new("0110").with_text(11, stan).with_text(39, RESPONSE_CODE_NO_ISSUER);
			self.respond(fd, &reply);
			return;
		};

		let connection_id = self.connections.get(&fd).map(|c| c.connection_id.clone()).unwrap_or_default();

		self.correlation.insert(stan, PendingEntry { acquirer_fd: fd, connection_id, created_at: Instant::now() });
		self.forward_raw(issuer_fd, frame);
	}

	fn handle_issuer(&mut self, fd: RawFd, frame: &[u8], message: Message) {
		if message.mti.starts_with("08") {
			let reply = netmgmt::build_reply(&message);
			self.respond(fd, &reply);
			return;
		}

		if !matches!(message.mti.as_str(), "0110" | "0210" | "0410") {
			log::warn!("dropping unsupported issuer mti {}", message.mti);
			return;
		}

		let Some(stan) = message.field_text(11) else {
			log::warn!("issuer response from fd {fd} is missing field 11 (STAN), dropping");
			return;
		};

		let Some(pending) = self.correlation.take(stan) else {
			log::warn!("no pending entry for STAN {stan}, dropping orphan issuer response");
			return;
		};

		self.forward_raw(pending.acquirer_fd, frame);
	}

	/// Writes the original frame bytes, re-wrapped in a length prefix,
	/// verbatim to the named connection's outbound queue.
	fn forward_raw(&mut self, fd: RawFd, frame: &[u8]) {
		self.queue_write(fd, frame.to_vec());
	}

	/// Encodes and queues a locally built response (a network-management
	/// reply or a synthetic `0110`). A failure here is a catalog bug in this
	/// switch's own code, not a peer error, so it is logged loudly rather
	/// than silently dropped.
	fn respond(&mut self, fd: RawFd, message: &Message) {
		match message.encode(EncoderMode::default()) {
			Ok(bytes) => self.queue_write(fd, bytes),
			Err(err) => log::error!("failed to encode local response with mti {}: {err}", message.mti),
		}
	}

	fn queue_write(&mut self, fd: RawFd, payload: Vec<u8>) {
		match self.connections.get_mut(&fd) {
			Some(connection) => connection.outbound.push_back(framer::frame(&payload)),
			None => log::warn!("dropping write to fd {fd}: connection no longer exists"),
		}
	}

	/// Synthesizes a sample `0100` request and feeds it into the dispatcher
	/// exactly as if the first registered acquirer had submitted it, for the
	/// operator injection path: it is forwarded to an issuer and recorded in
	/// the correlation table under its own STAN, so a later issuer response
	/// still finds its way back to that acquirer.
	pub fn inject_sample(&mut self) {
		let Some(fd) = self.registry.first_acquirer() else {
			log::warn!("injection trigger fired but no acquirer is connected");
			return;
		};

		let sample = &self.config.sample;
		let message = Message::new("0100")
			.with_text(2, sample.pan.clone())
			.with_text(3, "000000")
			.with_text(4, sample.amount.clone())
			.with_text(11, sample.rrn.clone())
			.with_text(37, sample.rrn.clone())
			.with_text(103, sample.account.clone());

		let Ok(frame) = message.encode(EncoderMode::default()) else {
			log::error!("failed to encode injected sample 0100 message");
			return;
		};

		log::info!("injecting sample 0100 as if submitted by acquirer fd {fd}");
		self.handle_acquirer(fd, &frame, message);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::{Ipv4Addr, SocketAddrV4};

	fn config() -> Config {
		Config {
			host: "0.0.0.0".into(),
			port: 0,
			acquirers: vec![],
			issuers: vec![],
			log_level: log::LevelFilter::Info,
			inject_trigger_path: "./inject.trigger".into(),
			sample: crate::config::SampleFields::default(),
		}
	}

	fn loopback(port: u16) -> SocketAddr {
		SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
	}

	fn connect(switch: &mut Switch, fd: RawFd, port: u16) {
		// Registry classification only consults the peer address and current
		// registry state, so a placeholder stream is enough for dispatcher
		// routing tests that never touch the socket itself.
		let listener = std::net::TcpListener::bind(loopback(0)).unwrap();
		let addr = listener.local_addr().unwrap();
		let stream = std::net::TcpStream::connect(addr).unwrap();
		switch.accept(stream, loopback(port), fd);
	}

	/// Connects `fd` and forces its role, bypassing classification: every
	/// loopback peer classifies as an acquirer, so tests that need an issuer
	/// connection set the role directly instead.
	fn connect_as(switch: &mut Switch, fd: RawFd, port: u16, role: Role) {
		connect(switch, fd, port);
		switch.connections.get_mut(&fd).unwrap().role = role;
		switch.registry.register(role, format!("127.0.0.1:{port}"), fd);
	}

	#[test]
	fn missing_stan_on_0100_yields_synthetic_0110_with_96() {
		let mut switch = Switch::new(config());
		connect(&mut switch, 1, 1001);

		let request = Message::new("0100").with_text(3, "000000");
		let frame = request.encode(EncoderMode::default()).unwrap();
		switch.on_frame(1, &frame);

		let outbound = &switch.connections.get(&1).unwrap().outbound;
		assert_eq!(outbound.len(), 1);

		let framed = outbound.front().unwrap();
		let payload = &framed[2..];
		let reply = Message::decode(payload, EncoderMode::default()).unwrap();
		assert_eq!(reply.mti, "0110");
		assert_eq!(reply.field_text(39), Some("96"));
		assert_eq!(reply.field_text(11), Some("000000"));
	}

	#[test]
	fn no_issuer_connected_yields_synthetic_0110_with_91() {
		let mut switch = Switch::new(config());
		connect(&mut switch, 1, 1001);

		let request = Message::new("0100").with_text(3, "000000").with_text(11, "094906");
		let frame = request.encode(EncoderMode::default()).unwrap();
		switch.on_frame(1, &frame);

		let framed = switch.connections.get(&1).unwrap().outbound.front().unwrap().clone();
		let reply = Message::decode(&framed[2..], EncoderMode::default()).unwrap();
		assert_eq!(reply.field_text(39), Some("91"));
		assert_eq!(reply.field_text(11), Some("094906"));
		assert!(switch.correlation.is_empty());
	}

	#[test]
	fn happy_path_forwards_verbatim_and_routes_the_response_back() {
		let mut switch = Switch::new(config());
		connect(&mut switch, 1, 1001);
		connect_as(&mut switch, 2, 1002, Role::Issuer);

		let request = Message::new("0100").with_text(3, "000000").with_text(11, "094906").with_text(2, "0000950000000000");
		let frame = request.encode(EncoderMode::default()).unwrap();
		switch.on_frame(1, &frame);

		assert!(switch.connections.get(&1).unwrap().outbound.is_empty());
		let forwarded = switch.connections.get(&2).unwrap().outbound.front().unwrap().clone();
		assert_eq!(&forwarded[2..], frame.as_slice());

		let response = Message::new("0110").with_text(11, "094906").with_text(39, "00");
		let response_frame = response.encode(EncoderMode::default()).unwrap();
		switch.on_frame(2, &response_frame);

		let back = switch.connections.get(&1).unwrap().outbound.front().unwrap().clone();
		assert_eq!(&back[2..], response_frame.as_slice());
		assert!(switch.correlation.is_empty());
	}

	#[test]
	fn orphan_issuer_response_is_dropped_without_panicking() {
		let mut switch = Switch::new(config());
		connect_as(&mut switch, 2, 1002, Role::Issuer);

		let response = Message::new("0110").with_text(11, "123456").with_text(39, "00");
		let frame = response.encode(EncoderMode::default()).unwrap();
		switch.on_frame(2, &frame);

		assert!(switch.connections.get(&2).unwrap().outbound.is_empty());
	}

	#[test]
	fn heartbeat_from_acquirer_is_answered_locally() {
		let mut switch = Switch::new(config());
		connect(&mut switch, 1, 1001);

		let request = Message::new("0800").with_text(70, "301");
		let frame = request.encode(EncoderMode::default()).unwrap();
		switch.on_frame(1, &frame);

		let framed = switch.connections.get(&1).unwrap().outbound.front().unwrap().clone();
		let reply = Message::decode(&framed[2..], EncoderMode::default()).unwrap();
		assert_eq!(reply.mti, "0810");
		assert_eq!(reply.field_text(39), Some("00"));
	}

	#[test]
	fn injected_sample_is_forwarded_to_an_issuer_and_correlates() {
		let mut switch = Switch::new(config());
		connect(&mut switch, 1, 1001);
		connect_as(&mut switch, 2, 1002, Role::Issuer);

		switch.inject_sample();

		assert!(switch.connections.get(&1).unwrap().outbound.is_empty());
		let forwarded = switch.connections.get(&2).unwrap().outbound.front().unwrap().clone();
		let forwarded_msg = Message::decode(&forwarded[2..], EncoderMode::default()).unwrap();
		assert_eq!(forwarded_msg.mti, "0100");
		assert_eq!(switch.correlation.len(), 1);

		let stan = forwarded_msg.field_text(11).unwrap().to_owned();
		let response = Message::new("0110").with_text(11, stan).with_text(39, "00");
		let response_frame = response.encode(EncoderMode::default()).unwrap();
		switch.on_frame(2, &response_frame);

		let back = switch.connections.get(&1).unwrap().outbound.front().unwrap().clone();
		assert_eq!(&back[2..], response_frame.as_slice());
		assert!(switch.correlation.is_empty());
	}

	#[test]
	fn injecting_with_no_acquirer_connected_logs_and_does_nothing() {
		let mut switch = Switch::new(config());
		connect_as(&mut switch, 2, 1002, Role::Issuer);

		switch.inject_sample();

		assert!(switch.connections.get(&2).unwrap().outbound.is_empty());
		assert!(switch.correlation.is_empty());
	}
}
