use std::fs;
use std::path::Path;

/// Checks for the operator injection trigger file and consumes it if
/// present.
///
/// The trigger is a plain empty file at a configured path; its mere
/// existence is the signal. Removing it after reading means a single touch
/// produces exactly one injected message, not one per poll tick.
pub fn check_and_consume(path: &Path) -> bool {
	if !path.exists() {
		return false;
	}

	if let Err(err) = fs::remove_file(path) {
		log::warn!("injection trigger at {} detected but could not be removed: {err}", path.display());
	}

	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn absent_trigger_file_does_nothing() {
		let path = std::env::temp_dir().join("npsb-inject-test-absent.trigger");
		let _ = fs::remove_file(&path);

		assert!(!check_and_consume(&path));
	}

	#[test]
	fn present_trigger_file_fires_once_and_is_removed() {
		let path = std::env::temp_dir().join("npsb-inject-test-present.trigger");
		let mut file = fs::File::create(&path).unwrap();
		file.write_all(b"").unwrap();
		drop(file);

		assert!(check_and_consume(&path));
		assert!(!path.exists());
		assert!(!check_and_consume(&path));
	}
}
