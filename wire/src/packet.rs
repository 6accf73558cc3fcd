//! Packet decoding and section framing.

use crate::error::{DecodeError, EncodeError, LimitKind, SectionFramingError, WireResult};
use crate::header::{PacketFlags, PacketHeader, HEADER_SIZE, MAGIC, VERSION};
use crate::limits::Limits;

/// Section tags for version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
#[repr(u8)]
pub enum SectionTag {
    /// Change mask and fixed-field payload of one record.
    Fields = 1,
    /// One variable-length buffer field.
    Buffer = 2,
    /// One command entry.
    Command = 3,
}

impl SectionTag {
    /// Parses a section tag from a raw byte.
    pub const fn parse(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(Self::Fields),
            2 => Ok(Self::Buffer),
            3 => Ok(Self::Command),
            _ => Err(DecodeError::UnknownSectionTag { tag }),
        }
    }
}

/// A section within a wire packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireSection<'a> {
    pub tag: SectionTag,
    pub body: &'a [u8],
}

/// A decoded wire packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePacket<'a> {
    pub header: PacketHeader,
    pub sections: Vec<WireSection<'a>>,
}

/// Decodes a wire packet into header + section slices.
pub fn decode_packet<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<WirePacket<'a>> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::PacketTooSmall {
            actual: buf.len(),
            required: HEADER_SIZE,
        });
    }
    if buf.len() > limits.max_packet_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::PacketBytes,
            limit: limits.max_packet_bytes,
            actual: buf.len(),
        });
    }

    let magic = le_u32(buf, 0);
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic { found: magic });
    }

    let version = le_u16(buf, 4);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }

    let flags_raw = le_u16(buf, 6);
    let flags = PacketFlags::from_raw(flags_raw);
    if !flags.is_valid() {
        return Err(DecodeError::InvalidFlags { flags: flags_raw });
    }

    let descriptor_hash = le_u64(buf, 8);
    let tick = le_u32(buf, 16);
    let baseline_tick = le_u32(buf, 20);
    let payload_len = le_u32(buf, 24);

    let baseline_ok = if flags.is_delta_snapshot() {
        baseline_tick != 0
    } else {
        baseline_tick == 0
    };
    if !baseline_ok {
        return Err(DecodeError::InvalidBaselineTick {
            baseline_tick,
            flags: flags_raw,
        });
    }

    let actual_payload_len = buf.len() - HEADER_SIZE;
    if payload_len as usize != actual_payload_len {
        return Err(DecodeError::PayloadLengthMismatch {
            header_len: payload_len,
            actual_len: actual_payload_len,
        });
    }

    let header = PacketHeader {
        version,
        flags,
        descriptor_hash,
        tick,
        baseline_tick,
        payload_len,
    };

    let sections = decode_sections(&buf[HEADER_SIZE..], limits)?;
    Ok(WirePacket { header, sections })
}

/// Decodes sections from a payload buffer (no packet header).
pub fn decode_sections<'a>(payload: &'a [u8], limits: &Limits) -> WireResult<Vec<WireSection<'a>>> {
    let mut offset = 0usize;
    let mut sections = Vec::new();

    while offset < payload.len() {
        if sections.len() >= limits.max_sections {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionCount,
                limit: limits.max_sections,
                actual: sections.len() + 1,
            });
        }

        let tag = payload[offset];
        offset += 1;
        let (len, new_offset) = read_varu32(payload, offset)?;
        offset = new_offset;
        let len = len as usize;

        if len > limits.max_section_len {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionLength,
                limit: limits.max_section_len,
                actual: len,
            });
        }
        if offset + len > payload.len() {
            return Err(DecodeError::SectionFraming(
                SectionFramingError::Truncated {
                    needed: offset + len,
                    available: payload.len(),
                },
            ));
        }

        let tag = SectionTag::parse(tag)?;
        let body = &payload[offset..offset + len];
        sections.push(WireSection { tag, body });
        offset += len;
    }

    Ok(sections)
}

/// Encodes a packet header into the provided output buffer.
pub fn encode_header(header: &PacketHeader, out: &mut [u8]) -> Result<usize, EncodeError> {
    if out.len() < HEADER_SIZE {
        return Err(EncodeError::BufferTooSmall {
            needed: HEADER_SIZE,
            available: out.len(),
        });
    }

    out[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    out[4..6].copy_from_slice(&header.version.to_le_bytes());
    out[6..8].copy_from_slice(&header.flags.raw().to_le_bytes());
    out[8..16].copy_from_slice(&header.descriptor_hash.to_le_bytes());
    out[16..20].copy_from_slice(&header.tick.to_le_bytes());
    out[20..24].copy_from_slice(&header.baseline_tick.to_le_bytes());
    out[24..28].copy_from_slice(&header.payload_len.to_le_bytes());

    Ok(HEADER_SIZE)
}

/// Encodes a single section into the provided output buffer.
pub fn encode_section(tag: SectionTag, body: &[u8], out: &mut [u8]) -> Result<usize, EncodeError> {
    let len_u32 = u32::try_from(body.len())
        .map_err(|_| EncodeError::LengthOverflow { length: body.len() })?;
    let len_bytes = varu32_len(len_u32);
    let needed = 1 + len_bytes + body.len();
    if out.len() < needed {
        return Err(EncodeError::BufferTooSmall {
            needed,
            available: out.len(),
        });
    }

    out[0] = tag as u8;
    let mut offset = 1;
    offset += write_varu32(len_u32, &mut out[offset..]);
    out[offset..offset + body.len()].copy_from_slice(body);
    Ok(needed)
}

/// Appends a single section to a growable buffer.
pub fn append_section(tag: SectionTag, body: &[u8], out: &mut Vec<u8>) -> Result<usize, EncodeError> {
    let len_u32 = u32::try_from(body.len())
        .map_err(|_| EncodeError::LengthOverflow { length: body.len() })?;
    let start = out.len();
    out.resize(start + 1 + varu32_len(len_u32) + body.len(), 0);
    encode_section(tag, body, &mut out[start..])
}

/// Assembles a complete packet (header + pre-encoded sections) onto `out`.
///
/// `out` is only extended once the payload length is known to fit.
pub fn append_packet(
    mut header: PacketHeader,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<usize, EncodeError> {
    header.payload_len = u32::try_from(payload.len()).map_err(|_| EncodeError::LengthOverflow {
        length: payload.len(),
    })?;
    let start = out.len();
    out.resize(start + HEADER_SIZE, 0);
    encode_header(&header, &mut out[start..])?;
    out.extend_from_slice(payload);
    Ok(HEADER_SIZE + payload.len())
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    u64::from(le_u32(buf, at)) | (u64::from(le_u32(buf, at + 4)) << 32)
}

fn read_varu32(buf: &[u8], mut offset: usize) -> Result<(u32, usize), DecodeError> {
    let mut value = 0u32;
    let mut shift = 0u32;
    for _ in 0..5 {
        if offset >= buf.len() {
            return Err(DecodeError::SectionFraming(
                SectionFramingError::Truncated {
                    needed: offset + 1,
                    available: buf.len(),
                },
            ));
        }
        let byte = buf[offset];
        offset += 1;
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, offset));
        }
        shift += 7;
    }
    Err(DecodeError::SectionFraming(
        SectionFramingError::InvalidVarint,
    ))
}

fn write_varu32(mut value: u32, out: &mut [u8]) -> usize {
    let mut offset = 0;
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out[offset] = byte;
        offset += 1;
        if value == 0 {
            break;
        }
    }
    offset
}

const fn varu32_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}
