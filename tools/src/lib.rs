//! Introspection and debugging tools for the ghostsnap codec.
//!
//! This crate provides utilities for inspecting and understanding encoded packets:
//!
//! - Print the change-mask layout a descriptor resolves to
//! - Inspect packet headers and section sizes
//! - Decode snapshot and command packets into JSON
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Human-readable output** - Make it easy to understand what the codec is doing.

use std::fmt::Write as _;
use std::num::NonZeroUsize;

use anyhow::{bail, Context, Result};
use codec::{
    decode_command_packet, decode_snapshot_packet, read_snapshot, CodecLimits, FieldValue, Record,
    TickRing,
};
use schema::{RecordDescriptor, RecordPlan, TypeRegistry};
use serde::Serialize;
use serde_json::{json, Map, Value};
use wire::{
    decode_packet, read_buffer_frame, read_command_frame, read_fields_frame, PacketHeader,
    SectionTag,
};

/// Parses a record descriptor from JSON.
pub fn load_descriptor(json: &str) -> Result<RecordDescriptor> {
    serde_json::from_str(json).context("parse descriptor json")
}

/// Builds the plan for `descriptor` against the default type registry.
pub fn build_plan(descriptor: &RecordDescriptor) -> Result<RecordPlan> {
    RecordPlan::build(descriptor, &TypeRegistry::with_defaults())
        .with_context(|| format!("build plan for '{}'", descriptor.name))
}

/// Resolved layout of one record.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub name: String,
    pub hash: String,
    pub total_bits: usize,
    pub mask_words: usize,
    pub leaves: Vec<LeafRow>,
    pub buffers: Vec<BufferRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafRow {
    pub path: String,
    pub codec: String,
    pub bit: usize,
    pub smoothing: String,
    pub send: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferRow {
    pub path: String,
    pub bit: usize,
    pub element: LayoutReport,
}

#[must_use]
pub fn layout_report(plan: &RecordPlan) -> LayoutReport {
    LayoutReport {
        name: plan.name().to_owned(),
        hash: format!("0x{:016x}", plan.hash()),
        total_bits: plan.total_bits(),
        mask_words: plan.mask_words(),
        leaves: plan
            .leaves()
            .iter()
            .map(|leaf| LeafRow {
                path: leaf.path.clone(),
                codec: leaf.codec.to_string(),
                bit: leaf.bit,
                smoothing: format!("{:?}", leaf.smoothing).to_lowercase(),
                send: format!("{:?}", leaf.send).to_lowercase(),
            })
            .collect(),
        buffers: plan
            .buffers()
            .iter()
            .map(|buffer| BufferRow {
                path: buffer.path.clone(),
                bit: buffer.bit,
                element: layout_report(&buffer.element),
            })
            .collect(),
    }
}

/// Renders a layout as an indented table.
#[must_use]
pub fn format_layout(report: &LayoutReport) -> String {
    let mut out = String::new();
    write_layout(report, 0, &mut out);
    out
}

fn write_layout(report: &LayoutReport, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{pad}{} hash={} bits={} words={}",
        report.name, report.hash, report.total_bits, report.mask_words
    );
    for leaf in &report.leaves {
        let _ = writeln!(
            out,
            "{pad}  [{:>3}] {:<24} {:<10} {} {}",
            leaf.bit, leaf.path, leaf.codec, leaf.smoothing, leaf.send
        );
    }
    for buffer in &report.buffers {
        let _ = writeln!(out, "{pad}  [{:>3}] {} (buffer)", buffer.bit, buffer.path);
        write_layout(&buffer.element, depth + 2, out);
    }
}

/// Summary of one packet.
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub header: PacketHeader,
    pub sections: Vec<SectionSummary>,
}

#[derive(Debug, Clone)]
pub struct SectionSummary {
    pub tag: SectionTag,
    pub byte_len: usize,
    pub detail: Option<String>,
}

/// Parses packet framing; with a plan, also summarizes masks and counts.
pub fn inspect_packet(
    bytes: &[u8],
    plan: Option<&RecordPlan>,
    wire_limits: &wire::Limits,
) -> Result<InspectReport> {
    let packet = decode_packet(bytes, wire_limits).context("decode packet framing")?;
    let sections = packet
        .sections
        .iter()
        .map(|section| SectionSummary {
            tag: section.tag,
            byte_len: section.body.len(),
            detail: section_detail(section.tag, section.body, plan),
        })
        .collect();
    Ok(InspectReport {
        header: packet.header,
        sections,
    })
}

fn section_detail(tag: SectionTag, body: &[u8], plan: Option<&RecordPlan>) -> Option<String> {
    match tag {
        SectionTag::Fields => {
            let plan = plan?;
            let frame = read_fields_frame(body, plan.mask_words()).ok()?;
            let set: u32 = frame.mask.iter().map(|w| w.count_ones()).sum();
            Some(format!(
                "{set}/{} bits set, {} payload bytes",
                plan.total_bits(),
                frame.payload.len()
            ))
        }
        SectionTag::Buffer => {
            let index = u32::from_le_bytes(body.get(..4)?.try_into().ok()?) as usize;
            let words = plan
                .and_then(|plan| plan.buffers().get(index))
                .map_or(0, |buffer| buffer.element.mask_words());
            let frame = read_buffer_frame(body, words).ok()?;
            let name = plan
                .and_then(|plan| plan.buffers().get(index))
                .map_or_else(|| format!("buffer {index}"), |buffer| buffer.path.clone());
            Some(format!(
                "{name}: {} elements, {} payload bytes",
                frame.element_count,
                frame.payload.len()
            ))
        }
        SectionTag::Command => {
            let frame = read_command_frame(body).ok()?;
            Some(format!(
                "tick {}, {} payload bytes",
                frame.tick,
                frame.payload.len()
            ))
        }
        _ => None,
    }
}

#[must_use]
pub fn format_inspect(report: &InspectReport) -> String {
    let header = report.header;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "version: {} flags: 0x{:04x} descriptor_hash: 0x{:016x}",
        header.version,
        header.flags.raw(),
        header.descriptor_hash
    );
    let _ = writeln!(
        out,
        "tick: {} baseline_tick: {} payload_len: {} bytes",
        header.tick, header.baseline_tick, header.payload_len
    );
    let _ = writeln!(out, "sections:");
    for section in &report.sections {
        let detail = section.detail.as_deref().unwrap_or("detail n/a");
        let _ = writeln!(
            out,
            "  {:?}: {detail} ({} bytes)",
            section.tag, section.byte_len
        );
    }
    out
}

/// Decodes a snapshot or command packet into JSON.
///
/// A delta snapshot needs `baseline`: the bytes of the full snapshot packet
/// it was encoded against.
pub fn decode_packet_json(
    bytes: &[u8],
    plan: &RecordPlan,
    baseline: Option<&[u8]>,
    wire_limits: &wire::Limits,
    limits: &CodecLimits,
) -> Result<Value> {
    let header = decode_packet(bytes, wire_limits)
        .context("decode packet framing")?
        .header;

    if header.flags.is_command() {
        return decode_commands_json(bytes, plan, wire_limits, limits);
    }

    let snapshot =
        decode_snapshot_packet(plan, bytes, wire_limits, limits).context("decode snapshot")?;
    let base = match snapshot.baseline_tick {
        None => None,
        Some(tick) => {
            let Some(baseline) = baseline else {
                bail!("delta snapshot needs the baseline packet for tick {}", tick.raw());
            };
            let base_snapshot = decode_snapshot_packet(plan, baseline, wire_limits, limits)
                .context("decode baseline")?;
            if !base_snapshot.is_full() {
                bail!("baseline packet must be a full snapshot");
            }
            if base_snapshot.tick != tick {
                bail!(
                    "baseline packet is tick {}, delta expects tick {}",
                    base_snapshot.tick.raw(),
                    tick.raw()
                );
            }
            Some(read_snapshot(plan, &base_snapshot, None).context("read baseline")?)
        }
    };
    let record = read_snapshot(plan, &snapshot, base.as_ref()).context("read snapshot")?;
    log::debug!(
        "decoded '{}' tick {} with {} changed bits",
        plan.name(),
        snapshot.tick.raw(),
        snapshot.mask.count_ones()
    );

    Ok(json!({
        "kind": if snapshot.is_full() { "full" } else { "delta" },
        "tick": snapshot.tick.raw(),
        "baseline_tick": snapshot.baseline_tick.map(|tick| tick.raw()),
        "changed_bits": snapshot.mask.iter_set().collect::<Vec<_>>(),
        "record": record_json(plan, &record),
    }))
}

fn decode_commands_json(
    bytes: &[u8],
    plan: &RecordPlan,
    wire_limits: &wire::Limits,
    limits: &CodecLimits,
) -> Result<Value> {
    let capacity = NonZeroUsize::new(limits.max_commands_per_packet.max(1))
        .context("command ring capacity")?;
    let mut ring = TickRing::new(capacity);
    decode_command_packet(plan, bytes, wire_limits, limits, &mut ring)
        .context("decode command packet")?;

    let (newest, _) = ring.latest().context("command packet carried no commands")?;
    let mut commands = Vec::new();
    for step in 0..ring.capacity() as u32 {
        let Some(tick) = newest.checked_sub(step) else {
            break;
        };
        let Some(command) = ring.get_exact(tick) else {
            break;
        };
        commands.push(json!({
            "tick": tick.raw(),
            "command": record_json(plan, command),
        }));
    }
    Ok(json!({ "kind": "command", "tick": newest.raw(), "commands": commands }))
}

/// Renders a record as a JSON object keyed by leaf and buffer path.
#[must_use]
pub fn record_json(plan: &RecordPlan, record: &Record) -> Value {
    let mut object = Map::new();
    for (leaf, value) in plan.leaves().iter().zip(&record.fields) {
        object.insert(leaf.path.clone(), value_json(*value));
    }
    for (buffer, elements) in plan.buffers().iter().zip(&record.buffers) {
        let items = elements
            .iter()
            .map(|element| record_json(&buffer.element, element))
            .collect();
        object.insert(buffer.path.clone(), Value::Array(items));
    }
    Value::Object(object)
}

fn value_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Bool(v) => json!(v),
        FieldValue::Int(v) => json!(v),
        FieldValue::UInt(v) => json!(v),
        FieldValue::Float(v) => json!(v),
        FieldValue::Enum(v) => json!(v),
    }
}
