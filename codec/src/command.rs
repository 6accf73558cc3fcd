//! Command packets.
//!
//! A command packet carries the newest command plus up to `redundancy - 1`
//! older ones so a single lost packet does not lose input. Commands have no
//! change mask: the newest is written raw and every older one is packed
//! against it.

use bitstream::{BitReader, BitWriter};
use schema::RecordPlan;
use wire::{
    append_packet, append_section, decode_packet, read_command_frame, write_command_frame,
    DecodeError, Limits as WireLimits, PacketHeader, SectionTag,
};

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::field::{read_packed, read_raw, write_packed, write_raw, FieldValue};
use crate::limits::CodecLimits;
use crate::reader::expect_padding;
use crate::record::Record;
use crate::ring::TickRing;
use crate::types::SnapshotTick;

/// Number of commands sent per packet unless the caller asks otherwise.
pub const DEFAULT_COMMAND_REDUNDANCY: usize = 4;

/// Appends a command packet for `tick` to `out`.
///
/// Older commands are included while they are present in `ring` at
/// consecutive earlier ticks. `out` is left untouched on error.
pub fn encode_command_packet(
    plan: &RecordPlan,
    ring: &TickRing<Record>,
    tick: SnapshotTick,
    redundancy: usize,
    limits: &CodecLimits,
    out: &mut Vec<u8>,
) -> CodecResult<usize> {
    check_plan(plan)?;
    let redundancy = redundancy.max(1);
    if redundancy > limits.max_commands_per_packet {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::CommandsPerPacket,
            limit: limits.max_commands_per_packet,
            actual: redundancy,
        });
    }

    let newest = ring
        .get_exact(tick)
        .ok_or(CodecError::CommandNotFound { tick: tick.raw() })?;

    let mut payload = Vec::new();
    let mut body = Vec::new();
    let mut written = 0;

    for step in 0..redundancy as u32 {
        let Some(command_tick) = tick.checked_sub(step) else {
            break;
        };
        let Some(command) = ring.get_exact(command_tick) else {
            break;
        };

        let bytes = encode_command(plan, command, (step > 0).then_some(newest))?;
        check_payload(bytes.len(), limits)?;

        body.clear();
        write_command_frame(command_tick.raw(), &bytes, &mut body);
        append_section(SectionTag::Command, &body, &mut payload)?;
        written += 1;
    }

    let header = PacketHeader::command(plan.hash(), tick.raw(), 0);
    let len = append_packet(header, &payload, out)?;
    log::trace!(
        "wrote command packet '{}' tick {}: {written} commands, {len} bytes",
        plan.name(),
        tick.raw()
    );
    Ok(len)
}

/// Decodes a command packet and stores every carried command in `ring`.
///
/// Nothing is stored unless the whole packet decodes. Returns the number of
/// commands stored.
pub fn decode_command_packet(
    plan: &RecordPlan,
    bytes: &[u8],
    wire_limits: &WireLimits,
    limits: &CodecLimits,
    ring: &mut TickRing<Record>,
) -> CodecResult<usize> {
    check_plan(plan)?;
    let packet = decode_packet(bytes, wire_limits)?;
    let header = packet.header;
    if !header.flags.is_command() {
        return Err(DecodeError::InvalidFlags {
            flags: header.flags.raw(),
        }
        .into());
    }
    if header.descriptor_hash != plan.hash() {
        return Err(CodecError::DescriptorMismatch {
            expected: plan.hash(),
            found: header.descriptor_hash,
        });
    }
    if packet.sections.is_empty() {
        return Err(CodecError::MissingSection {
            section: SectionTag::Command,
        });
    }
    if packet.sections.len() > limits.max_commands_per_packet {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::CommandsPerPacket,
            limit: limits.max_commands_per_packet,
            actual: packet.sections.len(),
        });
    }

    let mut commands: Vec<(SnapshotTick, Record)> = Vec::with_capacity(packet.sections.len());
    for (i, section) in packet.sections.iter().enumerate() {
        if section.tag != SectionTag::Command {
            return Err(CodecError::UnexpectedSection {
                section: section.tag,
            });
        }
        let frame = read_command_frame(section.body)?;
        check_payload(frame.payload.len(), limits)?;
        // Section `i` carries the command for `header.tick - i`.
        let expected = SnapshotTick::new(header.tick).checked_sub(i as u32);
        if expected.map(SnapshotTick::raw) != Some(frame.tick) {
            return Err(CodecError::CommandTickMismatch {
                expected: header.tick.wrapping_sub(i as u32),
                found: frame.tick,
            });
        }

        let mut reader = BitReader::new(frame.payload);
        let fields = match commands.first() {
            None => decode_raw(plan, &mut reader)?,
            Some((_, newest)) => decode_against(plan, newest, &mut reader)?,
        };
        expect_padding(&mut reader)?;
        commands.push((
            SnapshotTick::new(frame.tick),
            Record {
                fields,
                buffers: Vec::new(),
            },
        ));
    }

    let count = commands.len();
    // Oldest first so the newest command wins a shared slot.
    for (tick, command) in commands.into_iter().rev() {
        ring.set(tick, command);
    }
    Ok(count)
}

/// A counter-based input event.
///
/// The sender increments the counter each time the event fires; the
/// receiver compares two sampled counters to learn whether and how often it
/// fired in between, even when individual commands were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputEvent {
    count: u32,
}

impl InputEvent {
    #[must_use]
    pub const fn from_count(count: u32) -> Self {
        Self { count }
    }

    /// Records one firing.
    pub fn set(&mut self) {
        self.count = self.count.wrapping_add(1);
    }

    #[must_use]
    pub const fn count(self) -> u32 {
        self.count
    }

    /// Returns `true` if the event fired after `previous` was sampled.
    #[must_use]
    pub const fn is_set_since(self, previous: Self) -> bool {
        self.count != previous.count
    }

    /// Number of firings after `previous` was sampled.
    #[must_use]
    pub const fn fired_since(self, previous: Self) -> u32 {
        self.count.wrapping_sub(previous.count)
    }
}

impl From<InputEvent> for FieldValue {
    fn from(event: InputEvent) -> Self {
        Self::UInt(u64::from(event.count))
    }
}

fn check_plan(plan: &RecordPlan) -> CodecResult<()> {
    if plan.buffers().is_empty() {
        Ok(())
    } else {
        Err(CodecError::BuffersNotSupported {
            record: plan.name().to_owned(),
        })
    }
}

fn check_payload(len: usize, limits: &CodecLimits) -> CodecResult<()> {
    if len > limits.max_payload_bytes {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::PayloadBytes,
            limit: limits.max_payload_bytes,
            actual: len,
        });
    }
    Ok(())
}

/// Writes every leaf: raw for the newest command, packed against it otherwise.
fn encode_command(
    plan: &RecordPlan,
    command: &Record,
    newest: Option<&Record>,
) -> CodecResult<Vec<u8>> {
    command.check_shape(plan)?;
    let mut writer = BitWriter::new();
    for (i, leaf) in plan.leaves().iter().enumerate() {
        match newest {
            None => write_raw(leaf, command.fields[i], &mut writer)?,
            Some(base) => write_packed(leaf, command.fields[i], base.fields[i], &mut writer)?,
        }
    }
    Ok(writer.finish())
}

fn decode_raw(plan: &RecordPlan, reader: &mut BitReader<'_>) -> CodecResult<Vec<FieldValue>> {
    plan.leaves()
        .iter()
        .map(|leaf| read_raw(leaf, reader))
        .collect()
}

fn decode_against(
    plan: &RecordPlan,
    newest: &Record,
    reader: &mut BitReader<'_>,
) -> CodecResult<Vec<FieldValue>> {
    plan.leaves()
        .iter()
        .zip(&newest.fields)
        .map(|(leaf, base)| read_packed(leaf, *base, reader))
        .collect()
}
