//! Per-leaf field codec.
//!
//! Every function dispatches on the closed [`LeafCodec`] enum resolved when
//! the plan was built; no type classification happens here.
//!
//! Each leaf has a comparable integer representation produced by
//! [`quantize`]. Dirty checks and delta coding use only that representation,
//! so sub-quantum float jitter never marks a field as changed.

use bitstream::{BitReader, BitWriter};
use schema::{LeafCodec, LeafPlan, Smoothing};

use crate::error::{CodecError, CodecResult, ValueReason};

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Enum(u32),
}

impl FieldValue {
    /// Short name of the variant for diagnostics.
    #[must_use]
    pub const fn kind_name(self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Enum(_) => "enum",
        }
    }
}

/// Returns the zero value for a leaf codec.
#[must_use]
pub const fn default_value(codec: LeafCodec) -> FieldValue {
    match codec {
        LeafCodec::Bool => FieldValue::Bool(false),
        LeafCodec::SInt { .. } => FieldValue::Int(0),
        LeafCodec::UInt { .. } => FieldValue::UInt(0),
        LeafCodec::Enum { .. } => FieldValue::Enum(0),
        LeafCodec::Float | LeafCodec::QuantizedFloat { .. } => FieldValue::Float(0.0),
    }
}

const fn expected_kind(codec: LeafCodec) -> &'static str {
    default_value(codec).kind_name()
}

fn invalid(leaf: &LeafPlan, reason: ValueReason) -> CodecError {
    CodecError::InvalidValue {
        field: leaf.path.clone(),
        reason,
    }
}

fn mismatch(leaf: &LeafPlan, value: FieldValue) -> CodecError {
    invalid(
        leaf,
        ValueReason::TypeMismatch {
            expected: expected_kind(leaf.codec),
            found: value.kind_name(),
        },
    )
}

/// Checks that `value` has the leaf's type and fits its declared range.
pub fn validate(leaf: &LeafPlan, value: FieldValue) -> CodecResult<()> {
    quantize(leaf, value).map(|_| ())
}

/// Returns the comparable integer representation of `value`.
///
/// Quantized floats map to `round(v * scale)`, which must fit an `i32`.
/// Plain floats map to their IEEE bit pattern.
pub fn quantize(leaf: &LeafPlan, value: FieldValue) -> CodecResult<i64> {
    match (leaf.codec, value) {
        (LeafCodec::Bool, FieldValue::Bool(v)) => Ok(i64::from(v)),
        (LeafCodec::SInt { bits }, FieldValue::Int(v)) => {
            if fits_signed(v, bits) {
                Ok(v)
            } else {
                Err(invalid(leaf, ValueReason::SignedOutOfRange { bits, value: v }))
            }
        }
        (LeafCodec::UInt { bits }, FieldValue::UInt(v)) => {
            if fits_unsigned(v, bits) {
                Ok(v as i64)
            } else {
                Err(invalid(leaf, ValueReason::UnsignedOutOfRange { bits, value: v }))
            }
        }
        (LeafCodec::Enum { variants, .. }, FieldValue::Enum(v)) => {
            if v < variants {
                Ok(i64::from(v))
            } else {
                Err(invalid(
                    leaf,
                    ValueReason::EnumOutOfRange {
                        variants,
                        value: u64::from(v),
                    },
                ))
            }
        }
        (LeafCodec::Float, FieldValue::Float(v)) => Ok(i64::from(v.to_bits())),
        (LeafCodec::QuantizedFloat { scale }, FieldValue::Float(v)) => {
            let scaled = (f64::from(v) * f64::from(scale)).round();
            if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&scaled) {
                Ok(scaled as i64)
            } else {
                Err(invalid(
                    leaf,
                    ValueReason::QuantizedOutOfRange {
                        scale,
                        value: f64::from(v),
                    },
                ))
            }
        }
        _ => Err(mismatch(leaf, value)),
    }
}

/// Inverse of [`quantize`] for an in-range representation.
pub fn dequantize(leaf: &LeafPlan, q: i64) -> CodecResult<FieldValue> {
    let value = match leaf.codec {
        LeafCodec::Bool => FieldValue::Bool(q != 0),
        LeafCodec::SInt { bits } => {
            if !fits_signed(q, bits) {
                return Err(invalid(leaf, ValueReason::SignedOutOfRange { bits, value: q }));
            }
            FieldValue::Int(q)
        }
        LeafCodec::UInt { bits } => {
            let v = q as u64;
            if !fits_unsigned(v, bits) {
                return Err(invalid(leaf, ValueReason::UnsignedOutOfRange { bits, value: v }));
            }
            FieldValue::UInt(v)
        }
        LeafCodec::Enum { variants, .. } => match u32::try_from(q) {
            Ok(v) if v < variants => FieldValue::Enum(v),
            _ => {
                return Err(invalid(
                    leaf,
                    ValueReason::EnumOutOfRange {
                        variants,
                        value: q as u64,
                    },
                ))
            }
        },
        LeafCodec::Float => FieldValue::Float(f32::from_bits(q as u32)),
        LeafCodec::QuantizedFloat { scale } => {
            if i32::try_from(q).is_err() {
                return Err(invalid(
                    leaf,
                    ValueReason::QuantizedOutOfRange {
                        scale,
                        value: q as f64 / f64::from(scale),
                    },
                ));
            }
            FieldValue::Float((q as f64 / f64::from(scale)) as f32)
        }
    };
    Ok(value)
}

/// Writes the fixed-width encoding of `value`.
pub fn write_raw(leaf: &LeafPlan, value: FieldValue, writer: &mut BitWriter) -> CodecResult<()> {
    let q = quantize(leaf, value)?;
    write_raw_quantized(leaf.codec, q, writer)
}

pub(crate) fn write_raw_quantized(
    codec: LeafCodec,
    q: i64,
    writer: &mut BitWriter,
) -> CodecResult<()> {
    let bits = codec.raw_bits();
    writer.write_bits((q as u64) & width_mask(bits), bits)?;
    Ok(())
}

/// Reads a value written by [`write_raw`].
pub fn read_raw(leaf: &LeafPlan, reader: &mut BitReader<'_>) -> CodecResult<FieldValue> {
    let bits = leaf.codec.raw_bits();
    let raw = reader.read_bits(bits)?;
    let q = match leaf.codec {
        LeafCodec::SInt { .. } | LeafCodec::QuantizedFloat { .. } => sign_extend(raw, bits),
        _ => raw as i64,
    };
    dequantize(leaf, q)
}

/// Writes `value` relative to `baseline`.
///
/// Integer-backed codecs write the zigzag packed difference in the quantized
/// domain. Bools and plain floats fall back to the raw encoding.
pub fn write_packed(
    leaf: &LeafPlan,
    value: FieldValue,
    baseline: FieldValue,
    writer: &mut BitWriter,
) -> CodecResult<()> {
    let q = quantize(leaf, value)?;
    let base = quantize(leaf, baseline)?;
    write_packed_quantized(leaf.codec, q, base, writer)
}

pub(crate) fn write_packed_quantized(
    codec: LeafCodec,
    q: i64,
    base: i64,
    writer: &mut BitWriter,
) -> CodecResult<()> {
    if codec.is_integer_backed() {
        writer.write_packed_i64(q.wrapping_sub(base))?;
        Ok(())
    } else {
        write_raw_quantized(codec, q, writer)
    }
}

/// Reads a value written by [`write_packed`].
pub fn read_packed(
    leaf: &LeafPlan,
    baseline: FieldValue,
    reader: &mut BitReader<'_>,
) -> CodecResult<FieldValue> {
    if !leaf.codec.is_integer_backed() {
        return read_raw(leaf, reader);
    }
    let base = quantize(leaf, baseline)?;
    let delta = reader.read_packed_i64()?;
    dequantize(leaf, base.wrapping_add(delta))
}

/// Reconstructs a value between snapshot `a` and snapshot `b`.
///
/// - [`Smoothing::None`]: the value decoded from `b`, whatever the factor.
/// - [`Smoothing::Interpolate`]: lerp on decoded values, factor clamped to `[0, 1]`.
/// - [`Smoothing::Clamp`]: lerp with the raw factor, output clamped to the
///   range spanned by `a` and `b`.
///
/// Integers round to nearest. Values that cannot blend take the nearer side.
#[must_use]
pub fn interpolate(leaf: &LeafPlan, a: FieldValue, b: FieldValue, factor: f32) -> FieldValue {
    let nearest = if factor < 0.5 { a } else { b };
    let t = match leaf.smoothing {
        Smoothing::None => return b,
        Smoothing::Interpolate => f64::from(factor.clamp(0.0, 1.0)),
        Smoothing::Clamp => f64::from(factor),
    };

    let blend = |x: f64, y: f64| {
        let v = (y - x).mul_add(t, x);
        v.clamp(x.min(y), x.max(y))
    };

    match (a, b) {
        (FieldValue::Float(x), FieldValue::Float(y)) => {
            FieldValue::Float(blend(f64::from(x), f64::from(y)) as f32)
        }
        (FieldValue::Int(x), FieldValue::Int(y)) => {
            FieldValue::Int(blend(x as f64, y as f64).round() as i64)
        }
        (FieldValue::UInt(x), FieldValue::UInt(y)) => {
            FieldValue::UInt(blend(x as f64, y as f64).round() as u64)
        }
        _ => nearest,
    }
}

/// Canonical 8-byte storage representation used by buffer regions.
///
/// Floats keep their exact bit pattern; everything else stores the
/// quantized integer.
pub fn to_slot(leaf: &LeafPlan, value: FieldValue) -> CodecResult<u64> {
    match (leaf.codec, value) {
        (LeafCodec::QuantizedFloat { .. }, FieldValue::Float(v)) => {
            quantize(leaf, value)?;
            Ok(u64::from(v.to_bits()))
        }
        _ => quantize(leaf, value).map(|q| q as u64),
    }
}

/// Inverse of [`to_slot`].
pub fn from_slot(leaf: &LeafPlan, slot: u64) -> CodecResult<FieldValue> {
    match leaf.codec {
        LeafCodec::QuantizedFloat { .. } => Ok(FieldValue::Float(f32::from_bits(slot as u32))),
        _ => dequantize(leaf, slot as i64),
    }
}

const fn width_mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

const fn fits_signed(value: i64, bits: u8) -> bool {
    if bits >= 64 {
        return true;
    }
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    value >= min && value <= max
}

const fn fits_unsigned(value: u64, bits: u8) -> bool {
    bits >= 64 || value >> bits == 0
}

const fn sign_extend(raw: u64, bits: u8) -> i64 {
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits as u32;
    ((raw << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::SendPolicy;

    fn leaf(codec: LeafCodec) -> LeafPlan {
        LeafPlan {
            path: "v".into(),
            codec,
            bit: 0,
            smoothing: Smoothing::None,
            send: SendPolicy::OnChange,
        }
    }

    fn smoothed(codec: LeafCodec, smoothing: Smoothing) -> LeafPlan {
        LeafPlan {
            smoothing,
            ..leaf(codec)
        }
    }

    fn raw_roundtrip(leaf: &LeafPlan, value: FieldValue) -> (FieldValue, usize) {
        let mut writer = BitWriter::new();
        write_raw(leaf, value, &mut writer).unwrap();
        let bits = writer.bits_written();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        (read_raw(leaf, &mut reader).unwrap(), bits)
    }

    #[test]
    fn raw_widths() {
        let cases = [
            (LeafCodec::Bool, FieldValue::Bool(true), 1),
            (LeafCodec::SInt { bits: 8 }, FieldValue::Int(-128), 8),
            (LeafCodec::UInt { bits: 12 }, FieldValue::UInt(4095), 12),
            (LeafCodec::Enum { variants: 5, bits: 3 }, FieldValue::Enum(4), 3),
            (LeafCodec::Float, FieldValue::Float(-1.5), 32),
            (LeafCodec::SInt { bits: 64 }, FieldValue::Int(i64::MIN), 64),
            (LeafCodec::UInt { bits: 64 }, FieldValue::UInt(u64::MAX), 64),
        ];
        for (codec, value, width) in cases {
            let (decoded, bits) = raw_roundtrip(&leaf(codec), value);
            assert_eq!(decoded, value, "codec {codec}");
            assert_eq!(bits, width, "codec {codec}");
        }
    }

    #[test]
    fn quantized_float_rounds() {
        let leaf = leaf(LeafCodec::QuantizedFloat { scale: 10 });
        assert_eq!(quantize(&leaf, FieldValue::Float(2.0)).unwrap(), 20);
        assert_eq!(quantize(&leaf, FieldValue::Float(2.03)).unwrap(), 20);
        assert_eq!(quantize(&leaf, FieldValue::Float(2.06)).unwrap(), 21);
        assert_eq!(quantize(&leaf, FieldValue::Float(-2.06)).unwrap(), -21);

        let (decoded, bits) = raw_roundtrip(&leaf, FieldValue::Float(2.06));
        assert_eq!(decoded, FieldValue::Float(2.1));
        assert_eq!(bits, 32);
    }

    #[test]
    fn quantized_float_out_of_range() {
        let leaf = leaf(LeafCodec::QuantizedFloat { scale: 1000 });
        let err = quantize(&leaf, FieldValue::Float(3.0e6)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::QuantizedOutOfRange { .. },
                ..
            }
        ));
        assert!(quantize(&leaf, FieldValue::Float(f32::NAN)).is_err());
    }

    #[test]
    fn out_of_range_integers_rejected() {
        assert!(validate(&leaf(LeafCodec::SInt { bits: 8 }), FieldValue::Int(128)).is_err());
        assert!(validate(&leaf(LeafCodec::SInt { bits: 8 }), FieldValue::Int(-129)).is_err());
        assert!(validate(&leaf(LeafCodec::UInt { bits: 4 }), FieldValue::UInt(16)).is_err());
        assert!(validate(
            &leaf(LeafCodec::Enum { variants: 3, bits: 2 }),
            FieldValue::Enum(3)
        )
        .is_err());
    }

    #[test]
    fn type_mismatch_rejected() {
        let err = validate(&leaf(LeafCodec::Bool), FieldValue::UInt(1)).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidValue {
                field: "v".into(),
                reason: ValueReason::TypeMismatch {
                    expected: "bool",
                    found: "uint",
                },
            }
        );
    }

    #[test]
    fn packed_small_delta_is_compact() {
        let leaf = leaf(LeafCodec::SInt { bits: 32 });
        let mut writer = BitWriter::new();
        write_packed(&leaf, FieldValue::Int(1001), FieldValue::Int(1000), &mut writer).unwrap();
        assert_eq!(writer.bits_written(), 5);

        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            read_packed(&leaf, FieldValue::Int(1000), &mut reader).unwrap(),
            FieldValue::Int(1001)
        );
    }

    #[test]
    fn packed_extreme_deltas_wrap() {
        let leaf = leaf(LeafCodec::SInt { bits: 64 });
        let mut writer = BitWriter::new();
        write_packed(&leaf, FieldValue::Int(i64::MAX), FieldValue::Int(i64::MIN), &mut writer)
            .unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            read_packed(&leaf, FieldValue::Int(i64::MIN), &mut reader).unwrap(),
            FieldValue::Int(i64::MAX)
        );
    }

    #[test]
    fn packed_quantized_float_encodes_delta() {
        let leaf = leaf(LeafCodec::QuantizedFloat { scale: 10 });
        let mut writer = BitWriter::new();
        write_packed(&leaf, FieldValue::Float(2.06), FieldValue::Float(2.0), &mut writer).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_packed_i64().unwrap(), 1);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            read_packed(&leaf, FieldValue::Float(2.0), &mut reader).unwrap(),
            FieldValue::Float(2.1)
        );
    }

    #[test]
    fn packed_falls_back_to_raw_for_bool_and_float() {
        for (codec, value) in [
            (LeafCodec::Bool, FieldValue::Bool(true)),
            (LeafCodec::Float, FieldValue::Float(0.25)),
        ] {
            let leaf = leaf(codec);
            let mut writer = BitWriter::new();
            write_packed(&leaf, value, default_value(codec), &mut writer).unwrap();
            assert_eq!(writer.bits_written(), usize::from(codec.raw_bits()));
        }
    }

    #[test]
    fn packed_decode_rejects_out_of_range_result() {
        let leaf = leaf(LeafCodec::UInt { bits: 4 });
        let mut writer = BitWriter::new();
        writer.write_packed_i64(100).unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        assert!(read_packed(&leaf, FieldValue::UInt(0), &mut reader).is_err());
    }

    #[test]
    fn interpolate_none_takes_b() {
        let int = leaf(LeafCodec::SInt { bits: 32 });
        let (a, b) = (FieldValue::Int(0), FieldValue::Int(10));
        assert_eq!(interpolate(&int, a, b, 0.0), b);
        assert_eq!(interpolate(&int, a, b, 0.49), b);
        assert_eq!(interpolate(&int, a, b, 1.0), b);

        let flag = leaf(LeafCodec::Bool);
        let v = interpolate(&flag, FieldValue::Bool(false), FieldValue::Bool(true), 0.1);
        assert_eq!(v, FieldValue::Bool(true));
    }

    #[test]
    fn interpolate_lerps_on_decoded_values() {
        let leaf = smoothed(LeafCodec::QuantizedFloat { scale: 10 }, Smoothing::Interpolate);
        let v = interpolate(&leaf, FieldValue::Float(1.0), FieldValue::Float(2.0), 0.25);
        assert_eq!(v, FieldValue::Float(1.25));

        // Factor is clamped.
        let v = interpolate(&leaf, FieldValue::Float(1.0), FieldValue::Float(2.0), 1.5);
        assert_eq!(v, FieldValue::Float(2.0));
    }

    #[test]
    fn interpolate_integers_round_to_nearest() {
        let leaf = smoothed(LeafCodec::SInt { bits: 16 }, Smoothing::Interpolate);
        let v = interpolate(&leaf, FieldValue::Int(0), FieldValue::Int(3), 0.5);
        assert_eq!(v, FieldValue::Int(2));
        let v = interpolate(&leaf, FieldValue::Int(10), FieldValue::Int(0), 0.3);
        assert_eq!(v, FieldValue::Int(7));
    }

    #[test]
    fn clamp_mode_clamps_output() {
        let leaf = smoothed(LeafCodec::Float, Smoothing::Clamp);
        let v = interpolate(&leaf, FieldValue::Float(4.0), FieldValue::Float(2.0), 2.0);
        assert_eq!(v, FieldValue::Float(2.0));
        let v = interpolate(&leaf, FieldValue::Float(4.0), FieldValue::Float(2.0), -1.0);
        assert_eq!(v, FieldValue::Float(4.0));
        let v = interpolate(&leaf, FieldValue::Float(4.0), FieldValue::Float(2.0), 0.5);
        assert_eq!(v, FieldValue::Float(3.0));
    }

    #[test]
    fn slot_roundtrip_is_exact() {
        let cases = [
            (LeafCodec::QuantizedFloat { scale: 10 }, FieldValue::Float(2.06)),
            (LeafCodec::SInt { bits: 16 }, FieldValue::Int(-7)),
            (LeafCodec::UInt { bits: 64 }, FieldValue::UInt(u64::MAX)),
            (LeafCodec::Float, FieldValue::Float(-0.0)),
        ];
        for (codec, value) in cases {
            let leaf = leaf(codec);
            let slot = to_slot(&leaf, value).unwrap();
            assert_eq!(from_slot(&leaf, slot).unwrap(), value);
        }
    }

    #[test]
    fn sign_extend_values() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0x8000_0000, 32), i64::from(i32::MIN));
    }
}
