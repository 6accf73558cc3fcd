//! Snapshot writer.
//!
//! Computes the change mask of a record against an optional baseline and
//! writes the payload of every set bit in declaration order.

use bitstream::BitWriter;
use schema::{RecordPlan, SendPolicy};

use crate::error::CodecResult;
use crate::field::{quantize, write_packed_quantized, write_raw_quantized};
use crate::mask::ChangeMask;
use crate::record::Record;
use crate::scratch::CodecScratch;
use crate::types::SnapshotTick;

/// One serialized record at a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tick: SnapshotTick,
    /// `None` for a full-state snapshot.
    pub baseline_tick: Option<SnapshotTick>,
    pub mask: ChangeMask,
    /// Bit-packed payload of the fixed fields whose bit is set.
    pub payload: Vec<u8>,
    /// Changed buffer fields, ascending by plan buffer index.
    pub buffers: Vec<BufferSnapshot>,
}

impl Snapshot {
    /// Returns `true` if this snapshot carries full state.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.baseline_tick.is_none()
    }

    /// Returns the buffer snapshot for plan buffer `index`, if it changed.
    #[must_use]
    pub fn buffer(&self, index: usize) -> Option<&BufferSnapshot> {
        self.buffers.iter().find(|buffer| buffer.index == index)
    }
}

/// A changed buffer field: one mask per element and their packed payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    /// Index into [`RecordPlan::buffers`].
    pub index: usize,
    pub element_masks: Vec<ChangeMask>,
    pub payload: Vec<u8>,
}

impl BufferSnapshot {
    /// Number of elements carried.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.element_masks.len()
    }
}

/// Writes `current` as a snapshot at `tick`.
///
/// With no baseline every field is dirty and written raw. With a baseline a
/// field is dirty when its send policy is `Always` or its quantized value
/// differs; every leaf sharing a dirty bit is written, packed against the
/// baseline value. The snapshot is built completely before it is returned.
pub fn write_snapshot(
    plan: &RecordPlan,
    tick: SnapshotTick,
    current: &Record,
    baseline: Option<(SnapshotTick, &Record)>,
    scratch: &mut CodecScratch,
) -> CodecResult<Snapshot> {
    let base_record = baseline.map(|(_, record)| record);

    let mut writer = BitWriter::new();
    let mut mask = encode_leaves(plan, current, base_record, scratch, &mut writer)?;
    let payload = writer.finish();

    let mut buffers = Vec::new();
    for (index, buffer) in plan.buffers().iter().enumerate() {
        let base_elements = base_record.map(|record| record.buffers[index].as_slice());
        if let Some(snapshot) = encode_buffer(
            index,
            &buffer.element,
            &current.buffers[index],
            base_elements,
            scratch,
        )? {
            mask.set(buffer.bit);
            buffers.push(snapshot);
        }
    }

    log::trace!(
        "wrote '{}' tick {} ({}): {}/{} bits, {} payload bytes, {} buffers",
        plan.name(),
        tick.raw(),
        if base_record.is_some() { "delta" } else { "full" },
        mask.count_ones(),
        mask.bits(),
        payload.len(),
        buffers.len()
    );

    Ok(Snapshot {
        tick,
        baseline_tick: baseline.map(|(tick, _)| tick),
        mask,
        payload,
        buffers,
    })
}

/// Computes the mask of the fixed leaves of `current` and writes their payload.
pub(crate) fn encode_leaves(
    plan: &RecordPlan,
    current: &Record,
    baseline: Option<&Record>,
    scratch: &mut CodecScratch,
    writer: &mut BitWriter,
) -> CodecResult<ChangeMask> {
    current.check_shape(plan)?;
    if let Some(base) = baseline {
        base.check_shape(plan)?;
    }

    let leaves = plan.leaves();
    let s = scratch.leaf_scratch(plan.total_bits(), leaves.len());
    for (i, leaf) in leaves.iter().enumerate() {
        s.current_q[i] = quantize(leaf, current.fields[i])?;
        let dirty = match baseline {
            None => true,
            Some(base) => {
                s.baseline_q[i] = quantize(leaf, base.fields[i])?;
                leaf.send == SendPolicy::Always || s.baseline_q[i] != s.current_q[i]
            }
        };
        // Aggregates resend every sibling when any one of them changes.
        if dirty {
            s.dirty[leaf.bit] = true;
        }
    }

    let mut mask = ChangeMask::new(plan.total_bits());
    for (bit, dirty) in s.dirty.iter().enumerate() {
        if *dirty {
            mask.set(bit);
        }
    }

    for (i, leaf) in leaves.iter().enumerate() {
        if !s.dirty[leaf.bit] {
            continue;
        }
        if baseline.is_some() {
            write_packed_quantized(leaf.codec, s.current_q[i], s.baseline_q[i], writer)?;
        } else {
            write_raw_quantized(leaf.codec, s.current_q[i], writer)?;
        }
    }

    Ok(mask)
}

/// Encodes one buffer field. Returns `None` when nothing changed.
///
/// Each element is compared against the baseline element at the same index,
/// or against a zeroed element past the baseline length.
fn encode_buffer(
    index: usize,
    element_plan: &RecordPlan,
    elements: &[Record],
    baseline: Option<&[Record]>,
    scratch: &mut CodecScratch,
) -> CodecResult<Option<BufferSnapshot>> {
    let zero = Record::zeroed(element_plan);
    let mut changed = baseline.map_or(true, |base| base.len() != elements.len());
    let mut writer = BitWriter::new();
    let mut element_masks = Vec::with_capacity(elements.len());

    for (i, element) in elements.iter().enumerate() {
        let base = baseline.map(|base| base.get(i).unwrap_or(&zero));
        let mask = encode_leaves(element_plan, element, base, scratch, &mut writer)?;
        changed |= !mask.is_empty();
        element_masks.push(mask);
    }

    if !changed {
        return Ok(None);
    }
    Ok(Some(BufferSnapshot {
        index,
        element_masks,
        payload: writer.finish(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;
    use schema::{FieldDescriptor, RecordDescriptor, TypeRegistry};

    fn plan() -> RecordPlan {
        let desc = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("IntValue", "i32"))
            .field(FieldDescriptor::primitive("FloatValue", "f32").quantized(10));
        RecordPlan::build(&desc, &TypeRegistry::with_defaults()).unwrap()
    }

    fn record(int: i64, float: f32) -> Record {
        Record {
            fields: vec![FieldValue::Int(int), FieldValue::Float(float)],
            buffers: Vec::new(),
        }
    }

    #[test]
    fn first_snapshot_is_full_state() {
        let plan = plan();
        let mut scratch = CodecScratch::new();
        let snapshot =
            write_snapshot(&plan, SnapshotTick::new(1), &record(5, 2.0), None, &mut scratch)
                .unwrap();
        assert!(snapshot.is_full());
        assert_eq!(snapshot.mask.words(), &[0b11]);
        // 32-bit int + 32-bit quantized float.
        assert_eq!(snapshot.payload.len(), 8);
    }

    #[test]
    fn unchanged_record_has_empty_mask_and_payload() {
        let plan = plan();
        let mut scratch = CodecScratch::new();
        let base = record(5, 2.0);
        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(2),
            &base,
            Some((SnapshotTick::new(1), &base)),
            &mut scratch,
        )
        .unwrap();
        assert!(snapshot.mask.is_empty());
        assert!(snapshot.payload.is_empty());
        assert_eq!(snapshot.baseline_tick, Some(SnapshotTick::new(1)));
    }

    #[test]
    fn sub_quantum_change_is_not_dirty() {
        let plan = plan();
        let mut scratch = CodecScratch::new();
        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(2),
            &record(5, 2.03),
            Some((SnapshotTick::new(1), &record(5, 2.0))),
            &mut scratch,
        )
        .unwrap();
        assert!(snapshot.mask.is_empty());
    }

    #[test]
    fn always_send_leaf_is_dirty() {
        let desc = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("a", "u8"))
            .field(FieldDescriptor::primitive("b", "u8").send(SendPolicy::Always));
        let plan = RecordPlan::build(&desc, &TypeRegistry::with_defaults()).unwrap();
        let base = Record {
            fields: vec![FieldValue::UInt(1), FieldValue::UInt(2)],
            buffers: Vec::new(),
        };
        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(2),
            &base,
            Some((SnapshotTick::new(1), &base)),
            &mut CodecScratch::new(),
        )
        .unwrap();
        assert_eq!(snapshot.mask.words(), &[0b10]);
    }

    #[test]
    fn shape_errors_are_reported() {
        let plan = plan();
        let bad = Record {
            fields: vec![FieldValue::Int(1)],
            buffers: Vec::new(),
        };
        let err = write_snapshot(&plan, SnapshotTick::new(1), &bad, None, &mut CodecScratch::new())
            .unwrap_err();
        assert!(matches!(err, crate::CodecError::ShapeMismatch { .. }));
    }
}
