use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// The fixed sample fields used by the operator injection path.
#[derive(Debug, Clone)]
pub struct SampleFields {
	pub pan: String,
	pub amount: String,
	pub rrn: String,
	pub account: String,
}

impl Default for SampleFields {
	fn default() -> Self {
		Self {
			pan: "0000950000000000".into(),
			amount: "000015600000".into(),
			rrn: "200107000608".into(),
			account: "2001070006085".into(),
		}
	}
}

/// Process-wide configuration, loaded once at startup from the environment
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
	pub host: String,
	pub port: u16,
	pub acquirers: Vec<IpAddr>,
	pub issuers: Vec<IpAddr>,
	pub log_level: log::LevelFilter,
	pub inject_trigger_path: PathBuf,
	pub sample: SampleFields,
}

fn parse_addr_list(var: &str) -> Vec<IpAddr> {
	env::var(var)
		.unwrap_or_default()
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| s.parse().unwrap_or_else(|_| panic!("{var} contains an invalid IP address: {s:?}")))
		.collect()
}

impl Config {
	/// Loads configuration from the environment. Panics on a malformed
	/// `PORT` or address list entry: this is a startup-time failure,
	/// surfaced before any socket is opened, never a runtime one.
	pub fn from_env() -> Self {
		let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

		let port = env::var("PORT")
			.expect("PORT must be set")
			.parse()
			.expect("PORT must be a valid u16");

		let acquirers = parse_addr_list("ACQUIRERS");
		let issuers = parse_addr_list("ISSUERS");

		let log_level = env::var("NPSB_LOG")
			.ok()
			.and_then(|s| s.parse().ok())
			.unwrap_or(log::LevelFilter::Info);

		let inject_trigger_path = env::var("NPSB_INJECT_TRIGGER").unwrap_or_else(|_| "./inject.trigger".into()).into();

		let sample = SampleFields {
			pan: env::var("NPSB_SAMPLE_PAN").unwrap_or_else(|_| SampleFields::default().pan),
			amount: env::var("NPSB_SAMPLE_AMOUNT").unwrap_or_else(|_| SampleFields::default().amount),
			rrn: env::var("NPSB_SAMPLE_RRN").unwrap_or_else(|_| SampleFields::default().rrn),
			account: env::var("NPSB_SAMPLE_ACCOUNT").unwrap_or_else(|_| SampleFields::default().account),
		};

		Self { host, port, acquirers, issuers, log_level, inject_trigger_path, sample }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_address_list_parses_to_empty_vec() {
		assert_eq!(parse_addr_list("NPSB_TEST_UNSET_VAR_XYZ"), Vec::<IpAddr>::new());
	}
}
