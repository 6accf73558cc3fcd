//! Bit packing primitives for the ghostsnap replication codec.
//!
//! This crate provides [`BitWriter`] and [`BitReader`] for bit-level encoding
//! and decoding, including the bucketed "packed" integer encoding used for
//! delta-coded fields.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about records, fields, or ticks.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bit(true);
//! writer.write_bits(42, 7).unwrap();
//! writer.write_packed_i64(-3).unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert!(reader.read_bit().unwrap());
//! assert_eq!(reader.read_bits(7).unwrap(), 42);
//! assert_eq!(reader.read_packed_i64().unwrap(), -3);
//! ```

mod error;
mod packed;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use packed::{packed_len_bits, zigzag_decode, zigzag_encode};
pub use reader::BitReader;
pub use writer::BitWriter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roundtrip() {
        let writer = BitWriter::new();
        let bytes = writer.finish();
        assert!(bytes.is_empty());

        let reader = BitReader::new(&bytes);
        assert!(reader.is_empty());
    }

    #[test]
    fn mixed_roundtrip() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bits(0b1010, 4).unwrap();
        writer.write_packed_u64(300).unwrap();
        writer.write_bit(false);
        writer.align_to_word();
        writer.write_u32_aligned(0xDEAD_BEEF).unwrap();
        writer.write_packed_i64(-70_000).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
        assert_eq!(reader.read_packed_u64().unwrap(), 300);
        assert!(!reader.read_bit().unwrap());
        reader.align_to_word().unwrap();
        assert_eq!(reader.read_u32_aligned().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_packed_i64().unwrap(), -70_000);
    }

    #[test]
    fn packed_length_matches_written_bits() {
        for value in [0u64, 15, 16, 255, 256, 65_535, 65_536, u64::MAX] {
            let mut writer = BitWriter::new();
            writer.write_packed_u64(value).unwrap();
            assert_eq!(writer.bits_written(), packed_len_bits(value), "{value}");
        }
    }
}
