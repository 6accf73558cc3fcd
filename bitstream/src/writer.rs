//! Bit-level writer for encoding packed binary data.

use crate::error::{BitError, BitResult};
use crate::packed::{bucket_for, zigzag_encode, BUCKET_BITS, LAST_BUCKET};

/// A bit-level writer for encoding packed binary data.
///
/// Bits are written most-significant first. Writes accumulate in an internal
/// buffer; call [`finish`](Self::finish) to get the final bytes.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    /// Completed bytes.
    bytes: Vec<u8>,
    /// Byte currently being filled.
    current_byte: u8,
    /// Number of bits written to `current_byte` (0-7).
    bit_count: u8,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits_written() == 0
    }

    /// Clears the writer, keeping its allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.current_byte = 0;
        self.bit_count = 0;
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, value: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(value);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// Writes the low `bits` bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 64`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits == 0 {
            return Ok(());
        }
        if bits < 64 && value >= (1u64 << bits) {
            return Err(BitError::ValueOutOfRange { value, bits });
        }
        for i in (0..bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        while self.bit_count != 0 {
            self.write_bit(false);
        }
    }

    /// Pads with zero bytes until the byte length is a multiple of 4.
    pub fn align_to_word(&mut self) {
        self.align_to_byte();
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
    }

    /// Writes a byte-aligned `u8`.
    pub fn write_u8_aligned(&mut self, value: u8) -> BitResult<()> {
        self.ensure_aligned()?;
        self.bytes.push(value);
        Ok(())
    }

    /// Writes a byte-aligned `u16` (little-endian).
    pub fn write_u16_aligned(&mut self, value: u16) -> BitResult<()> {
        self.ensure_aligned()?;
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a byte-aligned `u32` (little-endian).
    pub fn write_u32_aligned(&mut self, value: u32) -> BitResult<()> {
        self.ensure_aligned()?;
        self.bytes.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a byte-aligned varint `u32`.
    pub fn write_varu32(&mut self, mut value: u32) -> BitResult<()> {
        self.ensure_aligned()?;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.bytes.push(byte);
            if value == 0 {
                return Ok(());
            }
        }
    }

    /// Writes a byte-aligned zigzag varint `i32`.
    pub fn write_vars32(&mut self, value: i32) -> BitResult<()> {
        let encoded = ((value << 1) ^ (value >> 31)) as u32;
        self.write_varu32(encoded)
    }

    /// Writes an unsigned integer using the bucketed packed encoding.
    pub fn write_packed_u64(&mut self, value: u64) -> BitResult<()> {
        let bucket = bucket_for(value);
        for _ in 0..bucket {
            self.write_bit(true);
        }
        if bucket < LAST_BUCKET {
            self.write_bit(false);
        }
        self.write_bits(value, BUCKET_BITS[bucket])
    }

    /// Writes a signed integer using zigzag + the bucketed packed encoding.
    pub fn write_packed_i64(&mut self, value: i64) -> BitResult<()> {
        self.write_packed_u64(zigzag_encode(value))
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// If the last byte is incomplete, it is padded with zeros on the right.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.flush_partial();
        self.bytes
    }

    /// Finishes writing and appends to the provided buffer.
    pub fn finish_into(mut self, buf: &mut Vec<u8>) {
        self.flush_partial();
        buf.append(&mut self.bytes);
    }

    fn flush_partial(&mut self) {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    fn ensure_aligned(&self) -> BitResult<()> {
        if self.bit_count != 0 {
            return Err(BitError::MisalignedAccess {
                bit_position: self.bits_written(),
            });
        }
        Ok(())
    }
}
