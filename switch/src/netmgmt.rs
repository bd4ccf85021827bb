use chrono::Utc;
use iso8583::Message;

/// Network-management info codes that the responder accepts without
/// complaint; anything else is reported back as a system error.
const KNOWN_INFO_CODES: [&str; 4] = ["001", "002", "301", "162"];

/// Increments the second-to-last digit of a 4-digit MTI, wrapping `9` to
/// `0`. `0800 → 0810`, `0820 → 0830`.
fn bump_mti(mti: &str) -> String {
	let mut digits: Vec<u8> = mti.bytes().collect();
	let idx = digits.len() - 2;
	digits[idx] = b'0' + (digits[idx] - b'0' + 1) % 10;
	String::from_utf8(digits).expect("MTI digits are always ASCII")
}

fn now_mmddhhmmss() -> String {
	Utc::now().format("%m%d%H%M%S").to_string()
}

/// Builds the local `08x0` reply for a network-management request.
/// Stateless: every input it needs comes from `request` itself.
pub fn build_reply(request: &Message) -> Message {
	let field7 = request.field_text(7).map(str::to_owned).unwrap_or_else(now_mmddhhmmss);
	let field11 = request.field_text(11).map(str::to_owned).unwrap_or_else(|| "000000".into());

	let field70 = request.field_text(70).map(|s| s.trim().to_owned());
	let is_known = match field70.as_deref() {
		None => true,
		Some(code) => KNOWN_INFO_CODES.contains(&code),
	};
	let field39 = if is_known { "00" } else { "96" };

	Message::new(bump_mti(&request.mti))
		.with_text(7, field7)
		.with_text(11, field11)
		.with_text(70, field70.unwrap_or_else(|| "000".into()))
		.with_text(39, field39)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bump_mti_increments_the_second_to_last_digit() {
		assert_eq!(bump_mti("0800"), "0810");
		assert_eq!(bump_mti("0820"), "0830");
	}

	#[test]
	fn heartbeat_with_known_info_code_is_accepted() {
		let request = Message::new("0800").with_text(7, "0727120000").with_text(11, "000001").with_text(70, "301");
		let reply = build_reply(&request);

		assert_eq!(reply.mti, "0810");
		assert_eq!(reply.field_text(39), Some("00"));
		assert_eq!(reply.field_text(70), Some("301"));
		assert_eq!(reply.field_text(7), Some("0727120000"));
		assert_eq!(reply.field_text(11), Some("000001"));
	}

	#[test]
	fn heartbeat_with_unsupported_info_code_is_rejected() {
		let request = Message::new("0800").with_text(70, "777");
		let reply = build_reply(&request);

		assert_eq!(reply.field_text(39), Some("96"));
		assert_eq!(reply.field_text(70), Some("777"));
	}

	#[test]
	fn missing_field_70_defaults_to_000_and_is_accepted() {
		let request = Message::new("0820");
		let reply = build_reply(&request);

		assert_eq!(reply.mti, "0830");
		assert_eq!(reply.field_text(70), Some("000"));
		assert_eq!(reply.field_text(39), Some("00"));
		assert_eq!(reply.field_text(11), Some("000000"));
	}
}
