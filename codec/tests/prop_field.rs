//! Property tests for field round-trips and quantization.

use codec::{read_snapshot, write_snapshot, CodecScratch, FieldValue, Record, SnapshotTick};
use proptest::prelude::*;
use schema::{FieldDescriptor, RecordDescriptor, RecordPlan, TypeRegistry};

fn plan() -> RecordPlan {
    let desc = RecordDescriptor::new("Prop")
        .field(FieldDescriptor::primitive("flag", "bool"))
        .field(FieldDescriptor::primitive("small", "i8"))
        .field(FieldDescriptor::primitive("wide", "i32"))
        .field(FieldDescriptor::primitive("count", "u16"))
        .field(FieldDescriptor::primitive("big", "u64"))
        .field(FieldDescriptor::enumeration("mode", 7))
        .field(FieldDescriptor::primitive("raw", "f32"))
        .field(FieldDescriptor::primitive("pos", "f32").quantized(100));
    RecordPlan::build(&desc, &TypeRegistry::with_defaults()).unwrap()
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        any::<bool>(),
        any::<i8>(),
        any::<i32>(),
        any::<u16>(),
        any::<u64>(),
        0u32..7,
        prop::num::f32::NORMAL | prop::num::f32::ZERO | prop::num::f32::SUBNORMAL,
        -1.0e6f32..1.0e6,
    )
        .prop_map(|(flag, small, wide, count, big, mode, raw, pos)| Record {
            fields: vec![
                FieldValue::Bool(flag),
                FieldValue::Int(i64::from(small)),
                FieldValue::Int(i64::from(wide)),
                FieldValue::UInt(u64::from(count)),
                FieldValue::UInt(big),
                FieldValue::Enum(mode),
                FieldValue::Float(raw),
                FieldValue::Float(pos),
            ],
            buffers: Vec::new(),
        })
}

fn assert_close(expected: &Record, decoded: &Record) {
    assert_eq!(decoded.fields[..7], expected.fields[..7]);
    let (FieldValue::Float(a), FieldValue::Float(b)) = (expected.fields[7], decoded.fields[7]) else {
        panic!("expected floats");
    };
    // f32 spacing near 1e6 is 0.0625, so allow the representation error too.
    let tolerance = 1.0 / 100.0 + a.abs() * f32::EPSILON;
    assert!((a - b).abs() <= tolerance, "{a} decoded as {b}");
}

proptest! {
    #[test]
    fn full_snapshot_roundtrip(record in record_strategy()) {
        let plan = plan();
        let snapshot = write_snapshot(&plan, SnapshotTick::new(1), &record, None, &mut CodecScratch::new()).unwrap();
        prop_assert_eq!(snapshot.mask.count_ones(), plan.total_bits());
        let decoded = read_snapshot(&plan, &snapshot, None).unwrap();
        assert_close(&record, &decoded);
    }

    #[test]
    fn delta_snapshot_roundtrip(base in record_strategy(), current in record_strategy()) {
        let plan = plan();
        let mut scratch = CodecScratch::new();
        // The receiver holds the decoded baseline, not the sender's raw values.
        let held = read_snapshot(
            &plan,
            &write_snapshot(&plan, SnapshotTick::new(1), &base, None, &mut scratch).unwrap(),
            None,
        )
        .unwrap();
        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(2),
            &current,
            Some((SnapshotTick::new(1), &held)),
            &mut scratch,
        )
        .unwrap();
        let decoded = read_snapshot(&plan, &snapshot, Some(&held)).unwrap();
        assert_close(&current, &decoded);
    }

    #[test]
    fn same_quantum_is_not_dirty(q in -100_000i32..100_000, a in -0.45f32..0.45, b in -0.45f32..0.45) {
        let plan = plan();
        let mut base = Record::zeroed(&plan);
        let mut current = Record::zeroed(&plan);
        base.fields[7] = FieldValue::Float((q as f32 + a) / 100.0);
        current.fields[7] = FieldValue::Float((q as f32 + b) / 100.0);

        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(2),
            &current,
            Some((SnapshotTick::new(1), &base)),
            &mut CodecScratch::new(),
        )
        .unwrap();
        prop_assert!(snapshot.mask.is_empty());
    }
}
