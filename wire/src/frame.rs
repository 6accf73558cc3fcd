//! Section body framing.
//!
//! Every frame part starts on a 4-byte boundary so regions of several records
//! can be laid out back to back without a per-record stride.

use crate::error::{DecodeError, WireResult};

/// Number of 32-bit words needed to hold `bits` change-mask bits.
#[must_use]
pub const fn mask_word_count(bits: usize) -> usize {
    bits.div_ceil(32)
}

/// Rounds `len` up to the next multiple of 4.
#[must_use]
pub const fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Body of a `Fields` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsFrame<'a> {
    pub mask: Vec<u32>,
    pub payload: &'a [u8],
}

/// Body of a `Buffer` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFrame<'a> {
    pub buffer_index: u32,
    pub element_count: u32,
    /// `element_count * words_per_element` words, element-major.
    pub element_masks: Vec<u32>,
    pub payload: &'a [u8],
}

/// Body of a `Command` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    pub tick: u32,
    pub payload: &'a [u8],
}

/// Appends a `Fields` body: mask words followed by the padded payload.
pub fn write_fields_frame(mask: &[u32], payload: &[u8], out: &mut Vec<u8>) {
    write_words(mask, out);
    write_padded(payload, out);
}

/// Appends a `Buffer` body.
pub fn write_buffer_frame(
    buffer_index: u32,
    element_count: u32,
    element_masks: &[u32],
    payload: &[u8],
    out: &mut Vec<u8>,
) {
    out.extend_from_slice(&buffer_index.to_le_bytes());
    out.extend_from_slice(&element_count.to_le_bytes());
    write_words(element_masks, out);
    write_padded(payload, out);
}

/// Appends a `Command` body.
pub fn write_command_frame(tick: u32, payload: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&tick.to_le_bytes());
    write_padded(payload, out);
}

/// Parses a `Fields` body carrying `mask_words` mask words.
pub fn read_fields_frame(body: &[u8], mask_words: usize) -> WireResult<FieldsFrame<'_>> {
    let mut cursor = FrameCursor::new(body)?;
    let mask = cursor.words(mask_words)?;
    Ok(FieldsFrame {
        mask,
        payload: cursor.rest(),
    })
}

/// Parses a `Buffer` body whose elements carry `words_per_element` mask words.
pub fn read_buffer_frame(body: &[u8], words_per_element: usize) -> WireResult<BufferFrame<'_>> {
    let mut cursor = FrameCursor::new(body)?;
    let buffer_index = cursor.u32()?;
    let element_count = cursor.u32()?;
    let total_words = (element_count as usize)
        .checked_mul(words_per_element)
        .ok_or(DecodeError::FrameTruncated {
            needed: usize::MAX,
            available: body.len(),
        })?;
    let element_masks = cursor.words(total_words)?;
    Ok(BufferFrame {
        buffer_index,
        element_count,
        element_masks,
        payload: cursor.rest(),
    })
}

/// Parses a `Command` body.
pub fn read_command_frame(body: &[u8]) -> WireResult<CommandFrame<'_>> {
    let mut cursor = FrameCursor::new(body)?;
    let tick = cursor.u32()?;
    Ok(CommandFrame {
        tick,
        payload: cursor.rest(),
    })
}

fn write_words(words: &[u32], out: &mut Vec<u8>) {
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

fn write_padded(payload: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(payload);
    out.resize(out.len() + (align4(payload.len()) - payload.len()), 0);
}

struct FrameCursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FrameCursor<'a> {
    fn new(buf: &'a [u8]) -> WireResult<Self> {
        if buf.len() % 4 != 0 {
            return Err(DecodeError::MisalignedFrame { len: buf.len() });
        }
        Ok(Self { buf, offset: 0 })
    }

    fn u32(&mut self) -> WireResult<u32> {
        let end = self.offset + 4;
        if end > self.buf.len() {
            return Err(DecodeError::FrameTruncated {
                needed: end,
                available: self.buf.len(),
            });
        }
        let b = &self.buf[self.offset..end];
        self.offset = end;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn words(&mut self, count: usize) -> WireResult<Vec<u32>> {
        let needed = count
            .checked_mul(4)
            .and_then(|bytes| bytes.checked_add(self.offset))
            .unwrap_or(usize::MAX);
        if needed > self.buf.len() {
            return Err(DecodeError::FrameTruncated {
                needed,
                available: self.buf.len(),
            });
        }
        (0..count).map(|_| self.u32()).collect()
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }
}
