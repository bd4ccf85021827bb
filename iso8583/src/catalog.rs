use crate::error::CodecError;

/// How a field's length is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	/// The length is implied by the catalog; no prefix is sent.
	Fixed,
	/// A 2-digit length prefix precedes the value.
	Llvar,
	/// A 3-digit length prefix precedes the value.
	Lllvar,
}

/// How a field's bytes are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
	/// Packed decimal, two digits per byte.
	Bcd,
	/// One byte per character.
	Ascii,
	/// Opaque bytes, copied verbatim.
	Binary,
}

/// Governs padding direction/character and what characters are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataClass {
	/// Digits only.
	Numeric,
	/// Letters and digits.
	Alphanumeric,
	/// Letters, digits, and symbols.
	AlphanumericSymbols,
	/// Opaque bytes.
	Binary,
}

/// A single catalog entry: everything needed to encode or decode one field
/// number, independent of any particular message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
	pub number: u8,
	pub format: Format,
	pub encoding: Encoding,
	/// Digit count for numeric/variable text fields, byte count for binary.
	pub max_length: usize,
	pub class: DataClass,
}

macro_rules! catalog {
	( $( $number:literal => $format:ident, $encoding:ident, $max:literal, $class:ident; )* ) => {
		const ENTRIES: &[FieldDefinition] = &[
			$(
				FieldDefinition {
					number: $number,
					format: Format::$format,
					encoding: Encoding::$encoding,
					max_length: $max,
					class: DataClass::$class,
				},
			)*
		];
	};
}

use DataClass::{Alphanumeric as AN, AlphanumericSymbols as ANS, Binary as B, Numeric as N};
use Encoding::{Ascii, Bcd, Binary};
use Format::{Fixed, Llvar, Lllvar};

catalog! {
	2   => Llvar,  Bcd,    19,  N;
	3   => Fixed,  Bcd,    6,   N;
	4   => Fixed,  Bcd,    12,  N;
	5   => Fixed,  Bcd,    12,  N;
	6   => Fixed,  Bcd,    12,  N;
	7   => Fixed,  Bcd,    10,  N;
	10  => Fixed,  Bcd,    8,   N;
	11  => Fixed,  Bcd,    6,   N;
	12  => Fixed,  Bcd,    6,   N;
	13  => Fixed,  Bcd,    4,   N;
	18  => Fixed,  Bcd,    4,   N;
	19  => Fixed,  Bcd,    3,   N;
	22  => Fixed,  Bcd,    3,   N;
	25  => Fixed,  Bcd,    2,   N;
	32  => Llvar,  Bcd,    11,  N;
	35  => Llvar,  Ascii,  37,  AN;
	37  => Fixed,  Ascii,  12,  AN;
	38  => Fixed,  Ascii,  6,   AN;
	39  => Fixed,  Ascii,  2,   AN;
	41  => Fixed,  Ascii,  8,   ANS;
	42  => Fixed,  Ascii,  15,  ANS;
	43  => Fixed,  Ascii,  40,  ANS;
	46  => Lllvar, Ascii,  999, ANS;
	47  => Lllvar, Ascii,  999, ANS;
	48  => Lllvar, Ascii,  999, ANS;
	49  => Fixed,  Bcd,    3,   N;
	50  => Fixed,  Ascii,  3,   AN;
	51  => Fixed,  Ascii,  3,   AN;
	52  => Fixed,  Binary, 16,  B;
	53  => Fixed,  Binary, 16,  B;
	54  => Lllvar, Ascii,  120, ANS;
	70  => Fixed,  Bcd,    3,   N;
	103 => Llvar,  Ascii,  104, ANS;
	112 => Lllvar, Ascii,  999, AN;
	125 => Lllvar, Ascii,  999, ANS;
	128 => Fixed,  Binary, 16,  B;
}

/// Looks up a field definition by its 1-based field number.
///
/// Field 1 is reserved for the secondary bitmap and is never a valid lookup
/// key even though bit 0 of the primary bitmap signals its presence.
pub fn lookup(field: u8) -> Result<&'static FieldDefinition, CodecError> {
	if field == 1 {
		return Err(CodecError::ReservedField);
	}

	ENTRIES.iter().find(|d| d.number == field).ok_or(CodecError::UnknownField { field })
}
