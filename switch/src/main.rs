use std::io::{ErrorKind, Read, Write};
use std::net::TcpListener;
use std::time::{Duration, Instant};

use runtime::{raw_fd, Interest, Poller, RawFd};
use switch::{Config, Switch};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const INJECT_CHECK_INTERVAL: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 4096;

fn main() {
	let config = Config::from_env();
	runtime::logger::init(config.log_level);

	if runtime::install_shutdown_handler().is_err() {
		log::warn!("continuing without a Ctrl+C handler installed");
	}

	let bind_addr = (config.host.as_str(), config.port);
	let listener = TcpListener::bind(bind_addr).unwrap_or_else(|err| {
		log::error!("failed to bind {}:{}: {err}", config.host, config.port);
		std::process::exit(1);
	});
	listener.set_nonblocking(true).expect("non-blocking mode is always supported on a fresh socket");

	log::info!("npsb switch listening on {}:{}", config.host, config.port);

	let inject_trigger_path = config.inject_trigger_path.clone();
	let mut switch = Switch::new(config);

	let mut poller = Poller::new();
	let listener_fd = raw_fd(&listener);
	poller.register(&listener, Interest::Read);

	let mut last_sweep = Instant::now();
	let mut last_inject_check = Instant::now();

	while !runtime::shutdown_requested() {
		let readiness = match poller.poll(Some(POLL_TIMEOUT)) {
			Ok(readiness) => readiness,
			Err(err) => {
				log::error!("poll failed: {err}");
				break;
			}
		};

		for ready in readiness {
			if ready.fd == listener_fd {
				accept_pending(&listener, &mut switch, &mut poller);
				continue;
			}

			if ready.errored {
				close_connection(&mut switch, &mut poller, ready.fd);
				continue;
			}

			if ready.readable && !service_readable(&mut switch, ready.fd) {
				close_connection(&mut switch, &mut poller, ready.fd);
				continue;
			}

			if ready.writable {
				flush_outbound(&mut switch, ready.fd);
			}
		}

		let now = Instant::now();

		if now.duration_since(last_sweep) >= SWEEP_INTERVAL {
			switch.sweep_correlation(now);
			last_sweep = now;
		}

		if now.duration_since(last_inject_check) >= INJECT_CHECK_INTERVAL {
			if switch::inject::check_and_consume(&inject_trigger_path) {
				switch.inject_sample();
			}
			last_inject_check = now;
		}

		reconcile_interests(&mut switch, &mut poller);
	}

	log::info!("shutdown requested, closing listener and live connections");
}

/// Accepts every currently pending connection; the listener is
/// non-blocking, so this drains the backlog rather than stopping after one.
fn accept_pending(listener: &TcpListener, switch: &mut Switch, poller: &mut Poller) {
	loop {
		match listener.accept() {
			Ok((stream, peer)) => {
				if let Err(err) = stream.set_nonblocking(true) {
					log::warn!("failed to set accepted socket non-blocking, dropping connection: {err}");
					continue;
				}

				let fd = raw_fd(&stream);
				poller.register(&stream, Interest::Read);
				switch.accept(stream, peer, fd);
			}
			Err(err) if err.kind() == ErrorKind::WouldBlock => break,
			Err(err) => {
				log::warn!("accept failed: {err}");
				break;
			}
		}
	}
}

/// Reads whatever is available on `fd`, feeds it through that connection's
/// framer, and dispatches every complete frame it yields. Returns `false` if
/// the socket should be torn down (peer closed, or a read error occurred).
fn service_readable(switch: &mut Switch, fd: RawFd) -> bool {
	let mut chunk = [0u8; READ_CHUNK];
	let mut frames = Vec::new();

	{
		let Some(connection) = switch.connection_mut(fd) else {
			return false;
		};

		loop {
			match connection.stream.read(&mut chunk) {
				Ok(0) => return false,
				Ok(n) => {
					connection.framer.feed(&chunk[..n]);
				}
				Err(err) if err.kind() == ErrorKind::WouldBlock => break,
				Err(err) => {
					log::warn!("read failed on fd {fd}: {err}");
					return false;
				}
			}
		}

		frames.extend(connection.framer.drain_frames());
	}

	for frame in frames {
		switch.on_frame(fd, &frame);
	}

	true
}

/// Writes as much of the outbound queue as the socket currently accepts.
fn flush_outbound(switch: &mut Switch, fd: RawFd) {
	let Some(connection) = switch.connection_mut(fd) else {
		return;
	};

	while let Some(framed) = connection.outbound.front() {
		match connection.stream.write(framed) {
			Ok(written) if written == framed.len() => {
				connection.outbound.pop_front();
			}
			Ok(written) => {
				let remaining = framed[written..].to_vec();
				connection.outbound.pop_front();
				connection.outbound.push_front(remaining);
				break;
			}
			Err(err) if err.kind() == ErrorKind::WouldBlock => break,
			Err(err) => {
				log::warn!("write failed on fd {fd}, dropping queued frame: {err}");
				connection.outbound.pop_front();
				break;
			}
		}
	}
}

fn close_connection(switch: &mut Switch, poller: &mut Poller, fd: RawFd) {
	log::info!("closing connection on fd {fd}");
	poller.deregister_fd(fd);
	switch.remove(fd);
}

/// Re-registers each live connection for write readiness only when it has
/// something queued, so the reactor isn't woken by POLLOUT every tick.
fn reconcile_interests(switch: &mut Switch, poller: &mut Poller) {
	for (_, connection) in switch.connections() {
		let interest = if connection.outbound.is_empty() { Interest::Read } else { Interest::ReadWrite };
		poller.reregister(&connection.stream, interest);
	}
}
