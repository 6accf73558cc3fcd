//! Snapshot packet encoding/decoding.
//!
//! A snapshot packet is a full or delta header followed by exactly one
//! `Fields` section and one `Buffer` section per changed buffer field, in
//! ascending buffer order.

use schema::RecordPlan;
use wire::{
    append_packet, append_section, decode_packet, read_buffer_frame, read_fields_frame,
    write_buffer_frame, write_fields_frame, DecodeError, PacketHeader, SectionTag, WirePacket,
};

use crate::error::{CodecError, CodecResult, LimitKind, MaskReason};
use crate::limits::CodecLimits;
use crate::mask::ChangeMask;
use crate::reader::{check_mask_bits, validate_buffer_sections};
use crate::types::SnapshotTick;
use crate::writer::{BufferSnapshot, Snapshot};

/// Appends `snapshot` as a complete packet to `out`.
///
/// The snapshot is checked against `plan` and `limits` before anything is
/// written; `out` is left untouched on error.
pub fn encode_snapshot_packet(
    plan: &RecordPlan,
    snapshot: &Snapshot,
    limits: &CodecLimits,
    out: &mut Vec<u8>,
) -> CodecResult<usize> {
    check_mask_bits(plan.total_bits(), &snapshot.mask)?;
    validate_buffer_sections(plan, snapshot)?;
    check_payload_len(snapshot.payload.len(), limits)?;

    let header = match snapshot.baseline_tick {
        None => PacketHeader::full_snapshot(plan.hash(), snapshot.tick.raw(), 0),
        Some(baseline) if baseline.is_zero() => return Err(CodecError::ZeroBaselineTick),
        Some(baseline) => {
            PacketHeader::delta_snapshot(plan.hash(), snapshot.tick.raw(), baseline.raw(), 0)
        }
    };

    let mut payload = Vec::new();
    let mut body = Vec::new();
    write_fields_frame(snapshot.mask.words(), &snapshot.payload, &mut body);
    append_section(SectionTag::Fields, &body, &mut payload)?;

    for buffer in &snapshot.buffers {
        let element_plan = &plan.buffers()[buffer.index].element;
        check_element_count(buffer.element_count(), limits)?;
        check_payload_len(buffer.payload.len(), limits)?;

        let mut words = Vec::with_capacity(buffer.element_count() * element_plan.mask_words());
        for mask in &buffer.element_masks {
            check_mask_bits(element_plan.total_bits(), mask)?;
            words.extend_from_slice(mask.words());
        }

        body.clear();
        write_buffer_frame(
            buffer.index as u32,
            buffer.element_count() as u32,
            &words,
            &buffer.payload,
            &mut body,
        );
        append_section(SectionTag::Buffer, &body, &mut payload)?;
    }

    let len = append_packet(header, &payload, out)?;
    log::trace!(
        "encoded snapshot packet '{}' tick {}: {} buffers, {len} bytes",
        plan.name(),
        snapshot.tick.raw(),
        snapshot.buffers.len()
    );
    Ok(len)
}

/// Decodes a snapshot packet from raw bytes.
pub fn decode_snapshot_packet(
    plan: &RecordPlan,
    bytes: &[u8],
    wire_limits: &wire::Limits,
    limits: &CodecLimits,
) -> CodecResult<Snapshot> {
    let packet = decode_packet(bytes, wire_limits)?;
    decode_snapshot_from_packet(plan, &packet, limits)
}

/// Decodes a snapshot from a parsed wire packet.
pub fn decode_snapshot_from_packet(
    plan: &RecordPlan,
    packet: &WirePacket<'_>,
    limits: &CodecLimits,
) -> CodecResult<Snapshot> {
    let header = packet.header;
    let baseline_tick = if header.flags.is_full_snapshot() {
        None
    } else if header.flags.is_delta_snapshot() {
        Some(SnapshotTick::new(header.baseline_tick))
    } else {
        return Err(CodecError::Wire(DecodeError::InvalidFlags {
            flags: header.flags.raw(),
        }));
    };

    if header.descriptor_hash != plan.hash() {
        return Err(CodecError::DescriptorMismatch {
            expected: plan.hash(),
            found: header.descriptor_hash,
        });
    }

    let mut sections = packet.sections.iter();
    let fields = match sections.next() {
        Some(section) if section.tag == SectionTag::Fields => {
            read_fields_frame(section.body, plan.mask_words())?
        }
        Some(section) => {
            return Err(CodecError::UnexpectedSection {
                section: section.tag,
            })
        }
        None => {
            return Err(CodecError::MissingSection {
                section: SectionTag::Fields,
            })
        }
    };
    check_payload_len(fields.payload.len(), limits)?;
    let mask = ChangeMask::from_words(plan.total_bits(), fields.mask)?;

    let mut buffers = Vec::new();
    for section in sections {
        match section.tag {
            SectionTag::Buffer => buffers.push(decode_buffer_section(plan, section.body, limits)?),
            SectionTag::Fields => {
                return Err(CodecError::DuplicateSection {
                    section: section.tag,
                })
            }
            _ => {
                return Err(CodecError::UnexpectedSection {
                    section: section.tag,
                })
            }
        }
    }

    let snapshot = Snapshot {
        tick: SnapshotTick::new(header.tick),
        baseline_tick,
        mask,
        payload: fields.payload.to_vec(),
        buffers,
    };
    validate_buffer_sections(plan, &snapshot)?;
    Ok(snapshot)
}

fn decode_buffer_section(
    plan: &RecordPlan,
    body: &[u8],
    limits: &CodecLimits,
) -> CodecResult<BufferSnapshot> {
    let Some(index_bytes) = body.get(..4) else {
        return Err(DecodeError::FrameTruncated {
            needed: 4,
            available: body.len(),
        }
        .into());
    };
    let index = u32::from_le_bytes([index_bytes[0], index_bytes[1], index_bytes[2], index_bytes[3]])
        as usize;
    let element_plan = &plan
        .buffers()
        .get(index)
        .ok_or(CodecError::InvalidMask {
            reason: MaskReason::UnknownBuffer { index },
        })?
        .element;

    let words_per_element = element_plan.mask_words();
    let frame = read_buffer_frame(body, words_per_element)?;
    check_element_count(frame.element_count as usize, limits)?;
    check_payload_len(frame.payload.len(), limits)?;

    let element_masks = if words_per_element == 0 {
        vec![ChangeMask::new(0); frame.element_count as usize]
    } else {
        frame
            .element_masks
            .chunks_exact(words_per_element)
            .map(|words| ChangeMask::from_words(element_plan.total_bits(), words.to_vec()))
            .collect::<CodecResult<Vec<_>>>()?
    };

    Ok(BufferSnapshot {
        index,
        element_masks,
        payload: frame.payload.to_vec(),
    })
}

fn check_payload_len(len: usize, limits: &CodecLimits) -> CodecResult<()> {
    if len > limits.max_payload_bytes {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::PayloadBytes,
            limit: limits.max_payload_bytes,
            actual: len,
        });
    }
    Ok(())
}

fn check_element_count(count: usize, limits: &CodecLimits) -> CodecResult<()> {
    if count > limits.max_buffer_elements {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::BufferElements,
            limit: limits.max_buffer_elements,
            actual: count,
        });
    }
    Ok(())
}
