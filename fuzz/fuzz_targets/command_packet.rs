#![no_main]

use std::num::NonZeroUsize;

use codec::{decode_command_packet, CodecLimits, TickRing};
use libfuzzer_sys::fuzz_target;
use schema::{FieldDescriptor, RecordDescriptor, RecordPlan, TypeRegistry};

fuzz_target!(|data: &[u8]| {
    let desc = RecordDescriptor::new("Input")
        .field(FieldDescriptor::primitive("move_x", "i8"))
        .field(FieldDescriptor::primitive("fire", "u32"));
    let Ok(plan) = RecordPlan::build(&desc, &TypeRegistry::with_defaults()) else {
        return;
    };
    let Some(capacity) = NonZeroUsize::new(16) else {
        return;
    };
    let mut ring = TickRing::new(capacity);
    let _ = decode_command_packet(
        &plan,
        data,
        &wire::Limits::for_testing(),
        &CodecLimits::for_testing(),
        &mut ring,
    );
});
