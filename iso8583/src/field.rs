use crate::bcd;
use crate::catalog::{DataClass, Encoding, FieldDefinition, Format};
use crate::error::CodecError;

/// The decoded or to-be-encoded value of one field.
///
/// `N`, `AN`, and `ANS` fields are all represented as `Text`; only the
/// catalog's `DataClass` distinguishes padding and validation rules between
/// them. `B` fields carry opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
	Text(String),
	Binary(Vec<u8>),
}

impl FieldValue {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			FieldValue::Text(s) => Some(s),
			FieldValue::Binary(_) => None,
		}
	}
}

/// How variable-length prefixes are carried, independent of any one field's
/// own data encoding. The switch's default is `Bcd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthEncoding {
	Ascii,
	Bcd,
}

/// Process-wide encoder configuration. Only the length-prefix encoding is
/// configurable; each field's own data encoding always comes from the
/// catalog.
#[derive(Debug, Clone, Copy)]
pub struct EncoderMode {
	pub length_encoding: LengthEncoding,
}

impl Default for EncoderMode {
	fn default() -> Self {
		Self { length_encoding: LengthEncoding::Bcd }
	}
}

fn validate_numeric(s: &str) -> Result<(), CodecError> {
	if s.bytes().all(|b| b.is_ascii_digit()) {
		Ok(())
	} else {
		Err(CodecError::NonNumeric { value: s.to_owned() })
	}
}

fn left_pad_or_truncate(s: &str, len: usize) -> String {
	if s.len() >= len {
		s[s.len() - len..].to_owned()
	} else {
		let mut out = "0".repeat(len - s.len());
		out.push_str(s);
		out
	}
}

fn right_pad_or_truncate(s: &str, len: usize) -> String {
	if s.len() >= len {
		s[..len].to_owned()
	} else {
		let mut out = s.to_owned();
		out.push_str(&" ".repeat(len - s.len()));
		out
	}
}

fn encode_data(def: &FieldDefinition, text: &str, bytes_out: &mut Vec<u8>) -> Result<(), CodecError> {
	match def.encoding {
		Encoding::Ascii => bytes_out.extend_from_slice(text.as_bytes()),
		Encoding::Bcd => bytes_out.extend(bcd::encode(text)?),
		Encoding::Binary => unreachable!("text field never declares a binary encoding"),
	}

	Ok(())
}

/// Encodes one `(definition, value)` pair, including any LLVAR/LLLVAR prefix.
pub fn encode(def: &FieldDefinition, value: &FieldValue, mode: EncoderMode) -> Result<Vec<u8>, CodecError> {
	match def.format {
		Format::Fixed => encode_fixed(def, value),
		Format::Llvar | Format::Lllvar => encode_variable(def, value, mode),
	}
}

fn encode_fixed(def: &FieldDefinition, value: &FieldValue) -> Result<Vec<u8>, CodecError> {
	match def.class {
		DataClass::Numeric => {
			let FieldValue::Text(s) = value else { return Err(CodecError::NonNumeric { value: String::new() }) };
			validate_numeric(s)?;
			let padded = left_pad_or_truncate(s, def.max_length);
			let mut out = Vec::new();
			encode_data(def, &padded, &mut out)?;
			Ok(out)
		}
		DataClass::Alphanumeric | DataClass::AlphanumericSymbols => {
			let FieldValue::Text(s) = value else { return Err(CodecError::InvalidText) };
			let padded = right_pad_or_truncate(s, def.max_length);
			let mut out = Vec::new();
			encode_data(def, &padded, &mut out)?;
			Ok(out)
		}
		DataClass::Binary => {
			let FieldValue::Binary(b) = value else { return Err(CodecError::InvalidText) };
			if b.len() != def.max_length {
				return Err(CodecError::WrongBinaryLength { expected: def.max_length, got: b.len() });
			}
			Ok(b.clone())
		}
	}
}

fn natural_length(def: &FieldDefinition, value: &FieldValue) -> Result<usize, CodecError> {
	match value {
		FieldValue::Text(s) => Ok(s.chars().count()),
		FieldValue::Binary(b) => {
			if def.class != DataClass::Binary {
				return Err(CodecError::InvalidText);
			}
			Ok(b.len())
		}
	}
}

fn encode_length_prefix(len: usize, format: Format, mode: EncoderMode) -> Vec<u8> {
	let digits = match format {
		Format::Llvar => 2,
		Format::Lllvar => 3,
		Format::Fixed => unreachable!("fixed fields have no length prefix"),
	};

	let text = format!("{len:0width$}", width = digits);

	match mode.length_encoding {
		LengthEncoding::Ascii => text.into_bytes(),
		LengthEncoding::Bcd => bcd::encode(&text).expect("length prefix is always all-digit"),
	}
}

fn encode_variable(def: &FieldDefinition, value: &FieldValue, mode: EncoderMode) -> Result<Vec<u8>, CodecError> {
	let len = natural_length(def, value)?;

	if len > def.max_length {
		return Err(CodecError::LengthOverflow { len, max: def.max_length });
	}

	if def.class == DataClass::Numeric {
		if let FieldValue::Text(s) = value {
			validate_numeric(s)?;
		}
	}

	let mut out = encode_length_prefix(len, def.format, mode);

	match value {
		FieldValue::Text(s) => encode_data(def, s, &mut out)?,
		FieldValue::Binary(b) => out.extend_from_slice(b),
	}

	Ok(out)
}

/// A forward-only cursor over an in-memory buffer, used while decoding a
/// single message.
pub struct Reader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	pub fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
		if self.pos + n > self.buf.len() {
			return Err(CodecError::Truncated { expected: n, got: self.buf.len() - self.pos });
		}

		let slice = &self.buf[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	pub fn remaining(&self) -> usize {
		self.buf.len() - self.pos
	}
}

fn fixed_byte_len(def: &FieldDefinition) -> usize {
	match def.encoding {
		Encoding::Bcd => def.max_length.div_ceil(2),
		Encoding::Ascii | Encoding::Binary => def.max_length,
	}
}

fn decode_data(def: &FieldDefinition, bytes: &[u8], digit_len: usize) -> Result<FieldValue, CodecError> {
	match def.encoding {
		Encoding::Bcd => Ok(FieldValue::Text(bcd::decode(bytes, digit_len)?)),
		Encoding::Ascii => {
			let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidText)?;
			Ok(FieldValue::Text(s.to_owned()))
		}
		Encoding::Binary => Ok(FieldValue::Binary(bytes.to_vec())),
	}
}

fn decode_fixed(def: &FieldDefinition, reader: &mut Reader) -> Result<FieldValue, CodecError> {
	let bytes = reader.take(fixed_byte_len(def))?;
	decode_data(def, bytes, def.max_length)
}

fn decode_length_prefix(format: Format, mode: EncoderMode, reader: &mut Reader) -> Result<usize, CodecError> {
	let digits = match format {
		Format::Llvar => 2,
		Format::Lllvar => 3,
		Format::Fixed => unreachable!("fixed fields have no length prefix"),
	};

	let text = match mode.length_encoding {
		LengthEncoding::Ascii => {
			let bytes = reader.take(digits)?;
			std::str::from_utf8(bytes).map_err(|_| CodecError::UnparseableLength)?.to_owned()
		}
		LengthEncoding::Bcd => {
			let bytes = reader.take(digits.div_ceil(2))?;
			bcd::decode(bytes, digits).map_err(|_| CodecError::UnparseableLength)?
		}
	};

	text.parse::<usize>().map_err(|_| CodecError::UnparseableLength)
}

fn decode_variable(def: &FieldDefinition, mode: EncoderMode, reader: &mut Reader) -> Result<FieldValue, CodecError> {
	let len = decode_length_prefix(def.format, mode, reader)?;

	if len > def.max_length {
		return Err(CodecError::LengthOverflow { len, max: def.max_length });
	}

	let byte_len = match def.encoding {
		Encoding::Bcd => len.div_ceil(2),
		Encoding::Ascii | Encoding::Binary => len,
	};

	let bytes = reader.take(byte_len)?;
	decode_data(def, bytes, len)
}

/// Decodes one field from `reader`, including consuming any length prefix.
pub fn decode(def: &FieldDefinition, mode: EncoderMode, reader: &mut Reader) -> Result<FieldValue, CodecError> {
	match def.format {
		Format::Fixed => decode_fixed(def, reader),
		Format::Llvar | Format::Lllvar => decode_variable(def, mode, reader),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog;

	#[test]
	fn fixed_numeric_bcd_roundtrips() {
		let def = catalog::lookup(11).unwrap();
		let value = FieldValue::Text("94906".into());

		let encoded = encode(def, &value, EncoderMode::default()).unwrap();
		assert_eq!(encoded.len(), 3);

		let mut reader = Reader::new(&encoded);
		let decoded = decode(def, EncoderMode::default(), &mut reader).unwrap();
		assert_eq!(decoded, FieldValue::Text("094906".into()));
	}

	#[test]
	fn fixed_alphanumeric_pads_with_space() {
		let def = catalog::lookup(39).unwrap();
		let value = FieldValue::Text("0".into());

		let encoded = encode(def, &value, EncoderMode::default()).unwrap();
		assert_eq!(encoded, b"0 ");
	}

	#[test]
	fn fixed_alphanumeric_truncates_from_right() {
		let def = catalog::lookup(39).unwrap();
		let value = FieldValue::Text("ABC".into());

		let encoded = encode(def, &value, EncoderMode::default()).unwrap();
		assert_eq!(encoded, b"AB");
	}

	#[test]
	fn fixed_binary_requires_exact_length() {
		let def = catalog::lookup(128).unwrap();
		let value = FieldValue::Binary(vec![0u8; 15]);

		assert!(matches!(encode(def, &value, EncoderMode::default()), Err(CodecError::WrongBinaryLength { .. })));
	}

	#[test]
	fn llvar_bcd_length_prefix_roundtrips() {
		let def = catalog::lookup(2).unwrap();
		let value = FieldValue::Text("0000950000000000".into());

		let encoded = encode(def, &value, EncoderMode::default()).unwrap();
		// 1 byte BCD length prefix + ceil(16/2) = 8 bytes of packed PAN.
		assert_eq!(encoded.len(), 1 + 8);
		assert_eq!(encoded[0], 0x16);

		let mut reader = Reader::new(&encoded);
		let decoded = decode(def, EncoderMode::default(), &mut reader).unwrap();
		assert_eq!(decoded, FieldValue::Text("0000950000000000".into()));
	}

	#[test]
	fn llvar_ascii_length_prefix_of_99() {
		let def = catalog::lookup(103).unwrap();
		let value = FieldValue::Text("x".repeat(99));

		let encoded = encode(def, &value, EncoderMode { length_encoding: LengthEncoding::Ascii }).unwrap();
		assert_eq!(&encoded[..2], b"99");
	}

	#[test]
	fn lllvar_of_999_bcd_prefix() {
		let def = catalog::lookup(125).unwrap();
		let value = FieldValue::Text("x".repeat(999));

		let encoded = encode(def, &value, EncoderMode::default()).unwrap();
		assert_eq!(&encoded[..2], &[0x09, 0x99]);
	}

	#[test]
	fn variable_field_overflow_is_rejected() {
		let def = catalog::lookup(2).unwrap();
		let value = FieldValue::Text("1".repeat(20));

		assert!(matches!(encode(def, &value, EncoderMode::default()), Err(CodecError::LengthOverflow { .. })));
	}
}
