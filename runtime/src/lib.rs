use core::time::Duration;
use std::io;

mod rt;
pub mod logger;

pub use rt::{install_shutdown_handler, shutdown_requested};

#[cfg(target_family = "unix")]
mod sys {
	pub use std::os::fd::{AsRawFd, RawFd};

	pub use libc::{poll, pollfd as Poll, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT};

	pub fn as_raw<T: AsRawFd>(t: &T) -> RawFd {
		t.as_raw_fd()
	}
}

#[cfg(target_family = "windows")]
mod sys {
	pub use std::os::windows::io::AsRawSocket as AsRawFd;

	pub use windows_sys::Win32::Networking::WinSock::{
		WSAPoll as poll, POLLERR, POLLHUP, POLLNVAL, POLLRDNORM as POLLIN, POLLWRNORM as POLLOUT, SOCKET as RawFd, WSAPOLLFD as Poll,
	};

	pub fn as_raw<T: AsRawFd>(t: &T) -> RawFd {
		t.as_raw_socket() as _
	}
}

pub use sys::{AsRawFd, RawFd};
use sys::*;

/// The raw descriptor backing `t`, on whichever platform this was built for.
pub fn raw_fd<T: AsRawFd>(t: &T) -> RawFd {
	as_raw(t)
}

fn as_timeout(t: Option<Duration>) -> i32 {
	t.and_then(|d| d.as_millis().try_into().ok()).unwrap_or(-1)
}

/// What the caller wants to be told about when a descriptor becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
	Read,
	Write,
	ReadWrite,
}

impl Interest {
	fn mask(self) -> i16 {
		match self {
			Interest::Read => POLLIN,
			Interest::Write => POLLOUT,
			Interest::ReadWrite => POLLIN | POLLOUT,
		}
	}
}

/// One descriptor's readiness after a `poll` call.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
	pub fd: RawFd,
	pub readable: bool,
	pub writable: bool,
	/// The peer reset/hung up, or the descriptor is otherwise unusable.
	/// Callers should close the corresponding connection rather than retry.
	pub errored: bool,
}

/// A thin wrapper around the platform's level-triggered `poll`/`WSAPoll`
/// syscall.
///
/// This owns no application state of its own: callers register raw
/// descriptors directly and read the returned readiness list themselves.
/// There is exactly one owner of connection state in this switch (the
/// dispatcher), so there is no need for the per-descriptor callback
/// indirection a multi-actor reactor would want.
#[derive(Default)]
pub struct Poller {
	fds: Vec<Poll>,
}

impl Poller {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register<T: AsRawFd>(&mut self, socket: &T, interest: Interest) {
		self.fds.push(Poll { fd: as_raw(socket), events: interest.mask(), revents: 0 });
	}

	pub fn reregister<T: AsRawFd>(&mut self, socket: &T, interest: Interest) {
		let fd = as_raw(socket);

		if let Some(entry) = self.fds.iter_mut().find(|p| p.fd == fd) {
			entry.events = interest.mask();
		}
	}

	pub fn deregister<T: AsRawFd>(&mut self, socket: &T) {
		self.deregister_fd(as_raw(socket));
	}

	/// Deregisters by raw descriptor directly, for callers that already know
	/// the fd but no longer hold (or want to keep alive) the socket value.
	pub fn deregister_fd(&mut self, fd: RawFd) {
		if let Some(idx) = self.fds.iter().position(|p| p.fd == fd) {
			self.fds.swap_remove(idx);
		}
	}

	/// Whether any descriptor is still registered. An empty `Poller` would
	/// block forever on some platforms, so callers should stop looping
	/// instead of polling it.
	pub fn is_empty(&self) -> bool {
		self.fds.is_empty()
	}

	/// Blocks for up to `timeout` for at least one registered descriptor to
	/// become ready, then returns every descriptor that is.
	pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Readiness>> {
		let ret = unsafe { poll(self.fds.as_mut_ptr(), self.fds.len().try_into().expect("fewer than u32::MAX fds"), as_timeout(timeout)) };

		if ret < 0 {
			return Err(io::Error::last_os_error());
		}

		let mut ready = Vec::new();

		for entry in &mut self.fds {
			if entry.revents == 0 {
				continue;
			}

			ready.push(Readiness {
				fd: entry.fd,
				readable: entry.revents & POLLIN != 0,
				writable: entry.revents & POLLOUT != 0,
				errored: entry.revents & (POLLERR | POLLHUP | POLLNVAL) != 0,
			});

			entry.revents = 0;
		}

		Ok(ready)
	}
}
