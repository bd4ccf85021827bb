//! The ISO 8583:1993 wire codec for the NPSB field catalog: BCD packing,
//! the field catalog, per-field encode/decode, and whole-message framing.
//!
//! This crate has no knowledge of sockets or connections; it only turns
//! messages into bytes and back.

pub mod bcd;
pub mod catalog;
pub mod error;
pub mod field;
pub mod message;

pub use catalog::FieldDefinition;
pub use error::CodecError;
pub use field::{EncoderMode, FieldValue, LengthEncoding};
pub use message::Message;
