//! Binary encoding of the compiled index: varints, RLE rows and the
//! container layout tying them together.

pub mod container;
pub mod rle;
pub mod varint;

pub use container::{read_u32, write_container, Container, Header, HEADER_SIZE, MAGIC};
pub use rle::{code_at, decode_row, encode_row, recode_row, Runs};
pub use varint::{read_varint, write_varint, MAX_VARINT_LEN};
