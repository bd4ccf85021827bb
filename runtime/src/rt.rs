use std::sync::atomic::{AtomicBool, Ordering};

use utils::error::Result;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Installs a Ctrl+C handler that flips a process-wide shutdown flag.
///
/// The caller's own loop is responsible for checking `shutdown_requested()`
/// once per iteration and unwinding its connections, since only it knows
/// which sockets are live and in what order they should be closed.
pub fn install_shutdown_handler() -> Result {
	ctrlc::set_handler(|| SHUTDOWN.store(true, Ordering::Relaxed)).map_err(|err| log::error!("Error occurred while setting Ctrl+C handler: {err}"))
}

pub fn shutdown_requested() -> bool {
	SHUTDOWN.load(Ordering::Relaxed)
}
