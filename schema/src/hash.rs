//! Deterministic descriptor hashing.

use blake3::Hasher;

use crate::{LeafCodec, RecordPlan, SendPolicy, Smoothing};

/// Computes a deterministic hash of a resolved plan.
///
/// Covers the record name, leaf paths, codecs, quantization, bit positions,
/// smoothing and send policy, and every buffer element plan.
#[must_use]
pub fn plan_hash(plan: &RecordPlan) -> u64 {
    let mut hasher = Hasher::new();
    write_plan(&mut hasher, plan);
    let hash = hasher.finalize();
    let bytes = hash.as_bytes();
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[0..8]);
    u64::from_le_bytes(out)
}

fn write_plan(hasher: &mut Hasher, plan: &RecordPlan) {
    write_str(hasher, plan.name());
    write_u32(hasher, plan.total_bits() as u32);
    write_u32(hasher, plan.leaves().len() as u32);

    for leaf in plan.leaves() {
        write_str(hasher, &leaf.path);
        write_codec(hasher, leaf.codec);
        write_u32(hasher, leaf.bit as u32);
        write_smoothing(hasher, leaf.smoothing);
        write_send(hasher, leaf.send);
    }

    write_u32(hasher, plan.buffers().len() as u32);
    for buffer in plan.buffers() {
        write_str(hasher, &buffer.path);
        write_u32(hasher, buffer.bit as u32);
        write_plan(hasher, &buffer.element);
    }
}

fn write_codec(hasher: &mut Hasher, codec: LeafCodec) {
    match codec {
        LeafCodec::Bool => {
            write_u8(hasher, 0);
        }
        LeafCodec::SInt { bits } => {
            write_u8(hasher, 1);
            write_u8(hasher, bits);
        }
        LeafCodec::UInt { bits } => {
            write_u8(hasher, 2);
            write_u8(hasher, bits);
        }
        LeafCodec::Enum { variants, bits } => {
            write_u8(hasher, 3);
            write_u32(hasher, variants);
            write_u8(hasher, bits);
        }
        LeafCodec::Float => {
            write_u8(hasher, 4);
        }
        LeafCodec::QuantizedFloat { scale } => {
            write_u8(hasher, 5);
            write_u32(hasher, scale);
        }
    }
}

fn write_smoothing(hasher: &mut Hasher, smoothing: Smoothing) {
    let tag = match smoothing {
        Smoothing::None => 0,
        Smoothing::Interpolate => 1,
        Smoothing::Clamp => 2,
    };
    write_u8(hasher, tag);
}

fn write_send(hasher: &mut Hasher, send: SendPolicy) {
    let tag = match send {
        SendPolicy::OnChange => 0,
        SendPolicy::Always => 1,
    };
    write_u8(hasher, tag);
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use crate::{FieldDescriptor, RecordDescriptor, RecordPlan, Smoothing, TypeRegistry};

    fn plan(desc: &RecordDescriptor) -> RecordPlan {
        RecordPlan::build(desc, &TypeRegistry::with_defaults()).unwrap()
    }

    fn base() -> RecordDescriptor {
        RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("a", "i32"))
            .field(FieldDescriptor::primitive("b", "f32").quantized(10))
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(plan(&base()).hash(), plan(&base()).hash());
        assert_ne!(plan(&base()).hash(), 0);
    }

    #[test]
    fn hash_changes_with_field_order() {
        let swapped = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("b", "f32").quantized(10))
            .field(FieldDescriptor::primitive("a", "i32"));
        assert_ne!(plan(&base()).hash(), plan(&swapped).hash());
    }

    #[test]
    fn hash_changes_with_quantization() {
        let other = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("a", "i32"))
            .field(FieldDescriptor::primitive("b", "f32").quantized(100));
        assert_ne!(plan(&base()).hash(), plan(&other).hash());
    }

    #[test]
    fn hash_changes_with_smoothing() {
        let other = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("a", "i32"))
            .field(
                FieldDescriptor::primitive("b", "f32")
                    .quantized(10)
                    .smoothing(Smoothing::Interpolate),
            );
        assert_ne!(plan(&base()).hash(), plan(&other).hash());
    }

    #[test]
    fn hash_changes_with_composite_grouping() {
        let fields = vec![
            FieldDescriptor::primitive("x", "u8"),
            FieldDescriptor::primitive("y", "u8"),
        ];
        let plain = RecordDescriptor::new("R").field(FieldDescriptor::structure("p", fields.clone()));
        let grouped =
            RecordDescriptor::new("R").field(FieldDescriptor::structure("p", fields).composite());
        assert_ne!(plan(&plain).hash(), plan(&grouped).hash());
    }

    #[test]
    fn hash_covers_buffer_elements() {
        let a = RecordDescriptor::new("R").field(FieldDescriptor::buffer(
            "items",
            RecordDescriptor::new("Item").field(FieldDescriptor::primitive("id", "u8")),
        ));
        let b = RecordDescriptor::new("R").field(FieldDescriptor::buffer(
            "items",
            RecordDescriptor::new("Item").field(FieldDescriptor::primitive("id", "u16")),
        ));
        assert_ne!(plan(&a).hash(), plan(&b).hash());
    }
}
