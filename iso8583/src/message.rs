use std::collections::BTreeMap;

use crate::catalog;
use crate::error::CodecError;
use crate::field::{self, EncoderMode, FieldValue, Reader};

/// A fully decoded (or about-to-be-encoded) ISO 8583 message: an MTI plus a
/// sparse set of numbered fields. Field 1 is never a key, its presence is
/// implied by whether a secondary bitmap was needed.
///
/// Fields are kept in a `BTreeMap` specifically so that serialization order
/// (ascending by field number) falls out of iteration order for free.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
	pub mti: String,
	pub fields: BTreeMap<u8, FieldValue>,
}

impl Message {
	pub fn new(mti: impl Into<String>) -> Self {
		Self { mti: mti.into(), fields: BTreeMap::new() }
	}

	pub fn with_text(mut self, field: u8, value: impl Into<String>) -> Self {
		self.fields.insert(field, FieldValue::Text(value.into()));
		self
	}

	pub fn with_binary(mut self, field: u8, value: Vec<u8>) -> Self {
		self.fields.insert(field, FieldValue::Binary(value));
		self
	}

	pub fn field_text(&self, field: u8) -> Option<&str> {
		self.fields.get(&field).and_then(FieldValue::as_text)
	}

	fn validate_mti(&self) -> Result<(), CodecError> {
		if self.mti.len() == 4 && self.mti.bytes().all(|b| b.is_ascii_digit()) {
			Ok(())
		} else {
			Err(CodecError::BadMti)
		}
	}

	/// Builds the primary (and, if needed, secondary) bitmap for the
	/// currently-present field set.
	fn build_bitmap(&self) -> Vec<u8> {
		let has_secondary = self.fields.keys().any(|&f| f > 64);
		let mut bitmap = vec![0u8; if has_secondary { 16 } else { 8 }];

		if has_secondary {
			bitmap[0] |= 0x80;
		}

		for &field in self.fields.keys() {
			let bit = field - 1;
			bitmap[(bit / 8) as usize] |= 1 << (7 - (bit % 8));
		}

		bitmap
	}

	/// Serializes this message: `mti | bitmap | fields...`.
	pub fn encode(&self, mode: EncoderMode) -> Result<Vec<u8>, CodecError> {
		self.validate_mti()?;

		let mut out = Vec::new();
		out.extend_from_slice(self.mti.as_bytes());
		out.extend(self.build_bitmap());

		for (&number, value) in &self.fields {
			let def = catalog::lookup(number)?;
			out.extend(field::encode(def, value, mode)?);
		}

		Ok(out)
	}

	/// Parses a complete message (already delivered whole by the framer).
	pub fn decode(bytes: &[u8], mode: EncoderMode) -> Result<Self, CodecError> {
		let mut reader = Reader::new(bytes);

		let mti_bytes = reader.take(4)?;
		let mti = std::str::from_utf8(mti_bytes).map_err(|_| CodecError::BadMti)?.to_owned();

		let primary = reader.take(8)?;
		let mut bits = primary.to_vec();

		if primary[0] & 0x80 != 0 {
			bits.extend(reader.take(8)?);
		}

		let mut fields = BTreeMap::new();

		// Bit 0 of byte 0 marks the secondary bitmap itself, not field 1;
		// walk bits 2..N, i.e. skip index 0.
		for bit in 1..bits.len() * 8 {
			let byte = bits[bit / 8];
			if byte & (1 << (7 - (bit % 8))) == 0 {
				continue;
			}

			let number = u8::try_from(bit + 1).map_err(|_| CodecError::UnknownField { field: 0 })?;
			let def = catalog::lookup(number)?;
			let value = field::decode(def, mode, &mut reader)?;
			fields.insert(number, value);
		}

		if reader.remaining() != 0 {
			return Err(CodecError::TrailingBytes(reader.remaining()));
		}

		let msg = Self { mti, fields };
		msg.validate_mti()?;
		Ok(msg)
	}
}
