//! Snapshot reader and interpolator.

use bitstream::BitReader;
use schema::RecordPlan;

use crate::error::{CodecError, CodecResult, MaskReason};
use crate::field::{default_value, interpolate, read_packed, read_raw, FieldValue};
use crate::mask::ChangeMask;
use crate::record::Record;
use crate::writer::{BufferSnapshot, Snapshot};

/// Decodes `snapshot` into a record.
///
/// Set bits decode from the payload, packed against `baseline` for a delta
/// snapshot and raw for a full one. Clear bits carry the baseline value
/// forward (the zero value for a full snapshot). Buffers whose bit is clear
/// keep the baseline elements.
pub fn read_snapshot(
    plan: &RecordPlan,
    snapshot: &Snapshot,
    baseline: Option<&Record>,
) -> CodecResult<Record> {
    let base = match (snapshot.baseline_tick, baseline) {
        (None, _) => None,
        (Some(tick), None) => {
            return Err(CodecError::BaselineRequired {
                baseline_tick: tick.raw(),
            })
        }
        (Some(_), Some(base)) => {
            base.check_shape(plan)?;
            for (buffer, elements) in plan.buffers().iter().zip(&base.buffers) {
                elements
                    .iter()
                    .try_for_each(|element| element.check_shape(&buffer.element))?;
            }
            Some(base)
        }
    };

    check_mask_bits(plan.total_bits(), &snapshot.mask)?;
    validate_buffer_sections(plan, snapshot)?;

    let mut reader = BitReader::new(&snapshot.payload);
    let fields = decode_leaves(plan, &snapshot.mask, base, &mut reader)?;
    expect_padding(&mut reader)?;

    let mut buffers = Vec::with_capacity(plan.buffers().len());
    for (index, buffer) in plan.buffers().iter().enumerate() {
        let base_elements = base.map(|record| record.buffers[index].as_slice());
        if !snapshot.mask.get(buffer.bit) {
            buffers.push(base_elements.map(<[Record]>::to_vec).unwrap_or_default());
            continue;
        }
        let section = snapshot
            .buffer(index)
            .ok_or(CodecError::InvalidMask {
                reason: MaskReason::BufferMissing { index },
            })?;
        buffers.push(decode_buffer(&buffer.element, section, base_elements)?);
    }

    Ok(Record { fields, buffers })
}

/// Blends two decoded records.
///
/// Fixed leaves follow their smoothing mode. Buffers are never blended per
/// element: the whole buffer comes from `a` when `factor < 0.5`, else `b`.
pub fn interpolate_records(
    plan: &RecordPlan,
    a: &Record,
    b: &Record,
    factor: f32,
) -> CodecResult<Record> {
    a.check_shape(plan)?;
    b.check_shape(plan)?;

    let fields = plan
        .leaves()
        .iter()
        .zip(a.fields.iter().zip(&b.fields))
        .map(|(leaf, (x, y))| interpolate(leaf, *x, *y, factor))
        .collect();
    let buffers = if factor < 0.5 {
        a.buffers.clone()
    } else {
        b.buffers.clone()
    };
    Ok(Record { fields, buffers })
}

/// Decodes `snapshot_b` against `a`, then blends the two.
pub fn read_interpolated(
    plan: &RecordPlan,
    a: &Record,
    snapshot_b: &Snapshot,
    factor: f32,
) -> CodecResult<Record> {
    let b = read_snapshot(plan, snapshot_b, Some(a))?;
    interpolate_records(plan, a, &b, factor)
}

pub(crate) fn check_mask_bits(expected: usize, mask: &ChangeMask) -> CodecResult<()> {
    if mask.bits() != expected {
        return Err(CodecError::InvalidMask {
            reason: MaskReason::BitCountMismatch {
                expected,
                found: mask.bits(),
            },
        });
    }
    Ok(())
}

/// Buffer sections must be ascending, known, and match the set buffer bits.
pub(crate) fn validate_buffer_sections(plan: &RecordPlan, snapshot: &Snapshot) -> CodecResult<()> {
    let mut previous: Option<usize> = None;
    for section in &snapshot.buffers {
        let index = section.index;
        let Some(buffer) = plan.buffers().get(index) else {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::UnknownBuffer { index },
            });
        };
        if let Some(previous) = previous.filter(|p| *p >= index) {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::BufferOrder {
                    previous,
                    current: index,
                },
            });
        }
        if !snapshot.mask.get(buffer.bit) {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::BufferBitClear { index },
            });
        }
        previous = Some(index);
    }
    for (index, buffer) in plan.buffers().iter().enumerate() {
        if snapshot.mask.get(buffer.bit) && snapshot.buffer(index).is_none() {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::BufferMissing { index },
            });
        }
    }
    Ok(())
}

/// Decodes the fixed leaves of one record.
fn decode_leaves(
    plan: &RecordPlan,
    mask: &ChangeMask,
    base: Option<&Record>,
    reader: &mut BitReader<'_>,
) -> CodecResult<Vec<FieldValue>> {
    plan.leaves()
        .iter()
        .enumerate()
        .map(|(i, leaf)| {
            let base_value = base.map(|record| record.fields[i]);
            match (mask.get(leaf.bit), base_value) {
                (true, Some(b)) => read_packed(leaf, b, reader),
                (true, None) => read_raw(leaf, reader),
                (false, Some(b)) => Ok(b),
                (false, None) => Ok(default_value(leaf.codec)),
            }
        })
        .collect()
}

fn decode_buffer(
    element_plan: &RecordPlan,
    section: &BufferSnapshot,
    baseline: Option<&[Record]>,
) -> CodecResult<Vec<Record>> {
    let zero = Record::zeroed(element_plan);
    let mut reader = BitReader::new(&section.payload);
    let mut elements = Vec::with_capacity(section.element_count());

    for (i, mask) in section.element_masks.iter().enumerate() {
        check_mask_bits(element_plan.total_bits(), mask)?;
        let base = baseline.map(|base| base.get(i).unwrap_or(&zero));
        let fields = decode_leaves(element_plan, mask, base, &mut reader)?;
        elements.push(Record {
            fields,
            buffers: Vec::new(),
        });
    }
    expect_padding(&mut reader)?;
    Ok(elements)
}

/// Anything after the last field must be zero padding shorter than a word.
pub(crate) fn expect_padding(reader: &mut BitReader<'_>) -> CodecResult<()> {
    let remaining_bits = reader.bits_remaining();
    if remaining_bits >= 32 {
        return Err(CodecError::TrailingPayloadBits { remaining_bits });
    }
    while reader.bits_remaining() > 0 {
        let chunk = reader.bits_remaining().min(32) as u8;
        if reader.read_bits(chunk)? != 0 {
            return Err(CodecError::TrailingPayloadBits { remaining_bits });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::CodecScratch;
    use crate::types::SnapshotTick;
    use crate::writer::write_snapshot;
    use schema::{FieldDescriptor, RecordDescriptor, Smoothing, TypeRegistry};

    fn plan() -> RecordPlan {
        let desc = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("IntValue", "i32"))
            .field(
                FieldDescriptor::primitive("FloatValue", "f32")
                    .quantized(10)
                    .smoothing(Smoothing::Interpolate),
            );
        RecordPlan::build(&desc, &TypeRegistry::with_defaults()).unwrap()
    }

    fn record(int: i64, float: f32) -> Record {
        Record {
            fields: vec![FieldValue::Int(int), FieldValue::Float(float)],
            buffers: Vec::new(),
        }
    }

    fn delta(plan: &RecordPlan, current: &Record, base: &Record) -> Snapshot {
        write_snapshot(
            plan,
            SnapshotTick::new(2),
            current,
            Some((SnapshotTick::new(1), base)),
            &mut CodecScratch::new(),
        )
        .unwrap()
    }

    #[test]
    fn quantized_delta_scenario() {
        let plan = plan();
        let base = record(5, 2.0);
        let snapshot = delta(&plan, &record(5, 2.06), &base);
        assert_eq!(snapshot.mask.words(), &[0b10]);

        let mut reader = BitReader::new(&snapshot.payload);
        assert_eq!(reader.read_packed_i64().unwrap(), 1);

        let decoded = read_snapshot(&plan, &snapshot, Some(&base)).unwrap();
        assert_eq!(decoded, record(5, 2.1));
    }

    #[test]
    fn delta_without_baseline_is_rejected() {
        let plan = plan();
        let base = record(5, 2.0);
        let snapshot = delta(&plan, &record(6, 2.0), &base);
        assert_eq!(
            read_snapshot(&plan, &snapshot, None),
            Err(CodecError::BaselineRequired { baseline_tick: 1 })
        );
    }

    #[test]
    fn clear_bits_carry_baseline_forward() {
        let plan = plan();
        let base = record(5, 2.0);
        let snapshot = delta(&plan, &record(9, 2.0), &base);
        let decoded = read_snapshot(&plan, &snapshot, Some(&base)).unwrap();
        assert_eq!(decoded, record(9, 2.0));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let plan = plan();
        let base = record(5, 2.0);
        let mut snapshot = delta(&plan, &record(5, 2.06), &base);
        snapshot.payload.push(0xFF);
        assert!(matches!(
            read_snapshot(&plan, &snapshot, Some(&base)),
            Err(CodecError::TrailingPayloadBits { .. })
        ));
    }

    #[test]
    fn malformed_baseline_element_is_rejected() {
        let desc = RecordDescriptor::new("Carrier").field(FieldDescriptor::buffer(
            "items",
            RecordDescriptor::new("Item").field(FieldDescriptor::primitive("id", "u16")),
        ));
        let plan = RecordPlan::build(&desc, &TypeRegistry::with_defaults()).unwrap();
        let carrier = |elements: Vec<Record>| Record {
            fields: Vec::new(),
            buffers: vec![elements],
        };
        let item = |id| Record {
            fields: vec![FieldValue::UInt(id)],
            buffers: Vec::new(),
        };

        let snapshot = delta(&plan, &carrier(vec![item(2)]), &carrier(vec![item(1)]));
        let malformed = carrier(vec![Record::default()]);
        assert!(matches!(
            read_snapshot(&plan, &snapshot, Some(&malformed)),
            Err(CodecError::ShapeMismatch { ref record, .. }) if record == "Item"
        ));
    }

    #[test]
    fn mask_bit_count_must_match_plan() {
        let plan = plan();
        let mut snapshot = delta(&plan, &record(5, 2.06), &record(5, 2.0));
        snapshot.mask = ChangeMask::new(3);
        assert!(matches!(
            read_snapshot(&plan, &snapshot, Some(&record(5, 2.0))),
            Err(CodecError::InvalidMask {
                reason: MaskReason::BitCountMismatch { expected: 2, found: 3 }
            })
        ));
    }

    #[test]
    fn interpolation_by_factor() {
        let plan = plan();
        let a = record(0, 1.0);
        let b = record(10, 2.0);

        let mid = interpolate_records(&plan, &a, &b, 0.25).unwrap();
        // IntValue has no smoothing and takes the value from `b`.
        assert_eq!(mid.fields[0], FieldValue::Int(10));
        assert_eq!(mid.fields[1], FieldValue::Float(1.25));

        let late = interpolate_records(&plan, &a, &b, 0.75).unwrap();
        assert_eq!(late.fields[0], FieldValue::Int(10));
    }

    #[test]
    fn read_interpolated_decodes_against_a() {
        let plan = plan();
        let a = record(5, 2.0);
        let snapshot = delta(&plan, &record(5, 3.0), &a);
        let v = read_interpolated(&plan, &a, &snapshot, 0.5).unwrap();
        assert_eq!(v.fields[1], FieldValue::Float(2.5));
    }
}
