/// Everything that can go wrong while encoding or decoding a single field or
/// message. Distinct from the connection-level `utils::error::Result`: the
/// dispatcher needs to tell these kinds apart (a catalog miss is the caller's
/// bug; a truncated buffer is a malformed frame) where the socket layer only
/// ever needs "log it and move on".
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
	#[error("field {field} is not in the catalog")]
	UnknownField { field: u8 },

	#[error("value '{value}' contains a non-numeric character")]
	NonNumeric { value: String },

	#[error("value of length {len} exceeds the field's maximum of {max}")]
	LengthOverflow { len: usize, max: usize },

	#[error("expected {expected} bytes/characters, got {got}")]
	Truncated { expected: usize, got: usize },

	#[error("length prefix could not be parsed")]
	UnparseableLength,

	#[error("binary field expected exactly {expected} bytes, got {got}")]
	WrongBinaryLength { expected: usize, got: usize },

	#[error("BCD nibble {nibble:#x} is not a valid decimal digit")]
	BadNibble { nibble: u8 },

	#[error("field 1 may not be used as a data field")]
	ReservedField,

	#[error("{0} trailing bytes remained after decoding all bitmap fields")]
	TrailingBytes(usize),

	#[error("MTI must be 4 ASCII digits")]
	BadMti,

	#[error("field value is not valid ASCII text")]
	InvalidText,
}
