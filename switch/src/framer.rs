/// Reassembles `uint16_be length | payload` frames out of a TCP byte stream.
///
/// The framer only knows about byte boundaries; it has no opinion on what is
/// inside a frame. A frame with `length == 0` is discarded silently, since
/// NPSB peers use it as a no-op keepalive at the transport level.
#[derive(Debug, Default)]
pub struct Framer {
	buf: Vec<u8>,
}

impl Framer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends freshly-read bytes to the reassembly buffer.
	pub fn feed(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}

	/// Pulls out every complete frame currently buffered, in arrival order.
	/// Bytes belonging to a still-incomplete frame are left in the buffer
	/// for the next `feed`.
	pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
		let mut frames = Vec::new();
		let mut consumed = 0;

		loop {
			let remaining = &self.buf[consumed..];

			if remaining.len() < 2 {
				break;
			}

			let len = u16::from_be_bytes([remaining[0], remaining[1]]) as usize;

			if remaining.len() < 2 + len {
				break;
			}

			consumed += 2 + len;

			if len > 0 {
				frames.push(remaining[2..2 + len].to_vec());
			}
		}

		self.buf.drain(..consumed);
		frames
	}
}

/// Prefixes `payload` with its `uint16_be` length, ready to write to a
/// socket. Panics if `payload` exceeds what a `u16` length can express,
/// since every message this switch emits is well under that limit.
pub fn frame(payload: &[u8]) -> Vec<u8> {
	let len: u16 = payload.len().try_into().expect("a single ISO 8583 message always fits in a u16-length frame");

	let mut out = Vec::with_capacity(2 + payload.len());
	out.extend_from_slice(&len.to_be_bytes());
	out.extend_from_slice(payload);
	out
}
