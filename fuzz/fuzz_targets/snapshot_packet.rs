#![no_main]

use codec::{decode_snapshot_packet, read_snapshot, CodecLimits, Record};
use libfuzzer_sys::fuzz_target;
use schema::{FieldDescriptor, RecordDescriptor, RecordPlan, TypeRegistry};

fn plan() -> Option<RecordPlan> {
    let desc = RecordDescriptor::new("Fuzz")
        .field(FieldDescriptor::primitive("alive", "bool"))
        .field(
            FieldDescriptor::structure(
                "pos",
                vec![
                    FieldDescriptor::primitive("x", "f32"),
                    FieldDescriptor::primitive("y", "f32"),
                ],
            )
            .quantized(100)
            .composite(),
        )
        .field(FieldDescriptor::enumeration("state", 5))
        .field(FieldDescriptor::buffer(
            "items",
            RecordDescriptor::new("Item").field(FieldDescriptor::primitive("id", "u16")),
        ));
    RecordPlan::build(&desc, &TypeRegistry::with_defaults()).ok()
}

fuzz_target!(|data: &[u8]| {
    let Some(plan) = plan() else {
        return;
    };
    let limits = CodecLimits::for_testing();
    let wire_limits = wire::Limits::for_testing();

    if let Ok(snapshot) = decode_snapshot_packet(&plan, data, &wire_limits, &limits) {
        let baseline = Record::zeroed(&plan);
        let _ = read_snapshot(&plan, &snapshot, Some(&baseline));
    }
});
