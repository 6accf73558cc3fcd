//! Flat execution plan resolved once per record descriptor.
//!
//! Plan building classifies every field, resolves codecs through the
//! [`TypeRegistry`], assigns change-mask bits, and validates configuration.
//! Writers and readers then loop over the flat leaf list without re-deriving
//! any of it.

use std::collections::HashSet;
use std::fmt;

use crate::error::{SchemaError, SchemaResult};
use crate::hash::plan_hash;
use crate::registry::{PrimitiveCodec, QuantizationSupport, TypeRegistry};
use crate::{FieldDescriptor, FieldKind, MaskAccumulator, RecordDescriptor, SendPolicy, Smoothing};

/// Resolved encoding of a leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafCodec {
    /// Boolean (1 bit).
    Bool,
    /// Signed integer, two's complement at `bits` width.
    SInt { bits: u8 },
    /// Unsigned integer at `bits` width.
    UInt { bits: u8 },
    /// Enum discriminant in `0..variants`, written with `bits` bits.
    Enum { variants: u32, bits: u8 },
    /// Unquantized float, compared and sent as IEEE bits.
    Float,
    /// Float scaled by `scale` and rounded to an `i32`.
    QuantizedFloat { scale: u32 },
}

impl LeafCodec {
    /// Width of the raw (non-delta) encoding.
    #[must_use]
    pub const fn raw_bits(self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::SInt { bits } | Self::UInt { bits } | Self::Enum { bits, .. } => bits,
            Self::Float | Self::QuantizedFloat { .. } => 32,
        }
    }

    /// Returns `true` if the packed path writes integer deltas.
    #[must_use]
    pub const fn is_integer_backed(self) -> bool {
        !matches!(self, Self::Bool | Self::Float)
    }

    /// Returns `true` if values can be blended between snapshots.
    #[must_use]
    pub const fn is_interpolable(self) -> bool {
        !matches!(self, Self::Bool | Self::Enum { .. })
    }

    /// Quantization factor, if any.
    #[must_use]
    pub const fn quantization(self) -> Option<u32> {
        match self {
            Self::QuantizedFloat { scale } => Some(scale),
            _ => None,
        }
    }
}

impl fmt::Display for LeafCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::SInt { bits } => write!(f, "i{bits}"),
            Self::UInt { bits } => write!(f, "u{bits}"),
            Self::Enum { variants, .. } => write!(f, "enum({variants})"),
            Self::Float => write!(f, "f32"),
            Self::QuantizedFloat { scale } => write!(f, "f32/{scale}"),
        }
    }
}

/// Number of bits needed to represent `max_value`.
#[must_use]
pub const fn required_bits(max_value: u32) -> u8 {
    (u32::BITS - max_value.leading_zeros()) as u8
}

/// One primitive leaf in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPlan {
    /// Dotted path from the record root, e.g. `pos.x`.
    pub path: String,
    pub codec: LeafCodec,
    /// Change-mask bit shared by every leaf of an aggregate.
    pub bit: usize,
    pub smoothing: Smoothing,
    pub send: SendPolicy,
}

/// A variable-length buffer field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPlan {
    pub path: String,
    /// Bit in the parent record's change mask.
    pub bit: usize,
    /// Plan of a single element; its bits index the per-element masks.
    pub element: RecordPlan,
}

/// Flat, validated plan for one record descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPlan {
    name: String,
    leaves: Vec<LeafPlan>,
    buffers: Vec<BufferPlan>,
    total_bits: usize,
    hash: u64,
}

impl RecordPlan {
    /// Validates `descriptor` and resolves its execution plan.
    pub fn build(descriptor: &RecordDescriptor, registry: &TypeRegistry) -> SchemaResult<Self> {
        let plan = Self::build_inner(descriptor, registry, true)?;
        log::debug!(
            "built plan '{}': {} leaves, {} buffers, {} mask bits, hash {:#018x}",
            plan.name,
            plan.leaves.len(),
            plan.buffers.len(),
            plan.total_bits,
            plan.hash
        );
        Ok(plan)
    }

    fn build_inner(
        descriptor: &RecordDescriptor,
        registry: &TypeRegistry,
        allow_buffers: bool,
    ) -> SchemaResult<Self> {
        let mut builder = PlanBuilder {
            record: &descriptor.name,
            registry,
            acc: MaskAccumulator::new(),
            leaves: Vec::new(),
            buffers: Vec::new(),
        };
        builder.walk(&descriptor.fields, "", Inherited::default(), allow_buffers)?;

        let mut plan = Self {
            name: descriptor.name.clone(),
            leaves: builder.leaves,
            buffers: builder.buffers,
            total_bits: builder.acc.total_bits(),
            hash: 0,
        };
        plan.hash = plan_hash(&plan);
        Ok(plan)
    }

    /// Record name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Leaves in declaration order.
    #[must_use]
    pub fn leaves(&self) -> &[LeafPlan] {
        &self.leaves
    }

    /// Buffer fields in declaration order.
    #[must_use]
    pub fn buffers(&self) -> &[BufferPlan] {
        &self.buffers
    }

    /// Number of change-mask bits.
    #[must_use]
    pub const fn total_bits(&self) -> usize {
        self.total_bits
    }

    /// Number of 32-bit mask words (`ceil(total_bits / 32)`).
    #[must_use]
    pub const fn mask_words(&self) -> usize {
        self.total_bits.div_ceil(32)
    }

    /// Deterministic descriptor hash; both sides must agree.
    #[must_use]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Index of the leaf at `path`.
    #[must_use]
    pub fn leaf_index(&self, path: &str) -> Option<usize> {
        self.leaves.iter().position(|leaf| leaf.path == path)
    }

    /// Index of the buffer at `path`.
    #[must_use]
    pub fn buffer_index(&self, path: &str) -> Option<usize> {
        self.buffers.iter().position(|buffer| buffer.path == path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Inherited {
    quantization: Option<u32>,
    smoothing: Smoothing,
    send: SendPolicy,
    in_composite: bool,
}

struct PlanBuilder<'a> {
    record: &'a str,
    registry: &'a TypeRegistry,
    acc: MaskAccumulator,
    leaves: Vec<LeafPlan>,
    buffers: Vec<BufferPlan>,
}

impl PlanBuilder<'_> {
    fn walk(
        &mut self,
        fields: &[FieldDescriptor],
        prefix: &str,
        inherited: Inherited,
        allow_buffers: bool,
    ) -> SchemaResult<()> {
        let mut names = HashSet::new();
        for field in fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{prefix}.{}", field.name)
            };
            if !names.insert(field.name.as_str()) {
                return Err(self.err_duplicate(path));
            }
            if field.quantization == Some(0) {
                return Err(SchemaError::InvalidQuantization {
                    record: self.record.to_owned(),
                    field: path,
                });
            }
            self.field(field, path, inherited, allow_buffers)?;
        }
        Ok(())
    }

    fn field(
        &mut self,
        field: &FieldDescriptor,
        path: String,
        inherited: Inherited,
        allow_buffers: bool,
    ) -> SchemaResult<()> {
        if let FieldKind::Buffer { element } = &field.kind {
            if !allow_buffers || inherited.in_composite {
                return Err(SchemaError::NestedBuffer {
                    record: self.record.to_owned(),
                    field: path,
                });
            }
            if field.composite {
                return Err(SchemaError::CompositeTypeMismatch {
                    record: self.record.to_owned(),
                    field: path,
                    expected: "primitive".to_owned(),
                    found: "buffer".to_owned(),
                });
            }
            let bit = self.acc.assign_bit();
            let element = RecordPlan::build_inner(element, self.registry, false).map_err(
                |err| match err {
                    SchemaError::NestedBuffer { record, field } => SchemaError::NestedBuffer {
                        record,
                        field: format!("{path}.{field}"),
                    },
                    other => other,
                },
            )?;
            self.buffers.push(BufferPlan { path, bit, element });
            return Ok(());
        }

        let scope = Inherited {
            quantization: field.quantization.or(inherited.quantization),
            smoothing: if field.smoothing == Smoothing::None {
                inherited.smoothing
            } else {
                field.smoothing
            },
            send: if field.send == SendPolicy::Always {
                SendPolicy::Always
            } else {
                inherited.send
            },
            in_composite: inherited.in_composite || field.composite,
        };

        let first_leaf = self.leaves.len();
        if field.composite {
            self.acc.open_aggregate();
        }

        match &field.kind {
            FieldKind::Primitive { type_name } => {
                let codec = self.resolve_primitive(field, &path, type_name, scope)?;
                self.push_leaf(field, path.clone(), codec, scope)?;
            }
            FieldKind::Enum { variants } => {
                if *variants == 0 {
                    return Err(SchemaError::InvalidEnum {
                        record: self.record.to_owned(),
                        field: path,
                    });
                }
                if field.quantization.is_some() {
                    return Err(SchemaError::QuantizationUnsupported {
                        record: self.record.to_owned(),
                        field: path,
                        type_name: "enum".to_owned(),
                    });
                }
                let codec = LeafCodec::Enum {
                    variants: *variants,
                    bits: required_bits(variants - 1),
                };
                self.push_leaf(field, path.clone(), codec, scope)?;
            }
            FieldKind::Struct { fields } => {
                self.walk(fields, &path, scope, false)?;
                let quantized = self.leaves[first_leaf..]
                    .iter()
                    .any(|leaf| leaf.codec.quantization().is_some());
                if field.quantization.is_some() && !quantized {
                    return Err(SchemaError::QuantizationUnsupported {
                        record: self.record.to_owned(),
                        field: path,
                        type_name: "struct".to_owned(),
                    });
                }
            }
            FieldKind::Buffer { .. } => unreachable!("handled above"),
        }

        if field.composite {
            self.acc.close_aggregate();
            self.check_composite(&path, first_leaf)?;
        }
        Ok(())
    }

    fn resolve_primitive(
        &self,
        field: &FieldDescriptor,
        path: &str,
        type_name: &str,
        scope: Inherited,
    ) -> SchemaResult<LeafCodec> {
        let Some(template) = self.registry.get(type_name) else {
            return Err(SchemaError::UnknownType {
                record: self.record.to_owned(),
                field: path.to_owned(),
                type_name: type_name.to_owned(),
            });
        };

        // Inherited factors only reach leaves that can use them.
        let quantization = match template.quantization {
            QuantizationSupport::Unsupported => {
                if field.quantization.is_some() {
                    return Err(SchemaError::QuantizationUnsupported {
                        record: self.record.to_owned(),
                        field: path.to_owned(),
                        type_name: type_name.to_owned(),
                    });
                }
                None
            }
            QuantizationSupport::Optional => scope.quantization,
            QuantizationSupport::Required => {
                if scope.quantization.is_none() {
                    return Err(SchemaError::MissingQuantization {
                        record: self.record.to_owned(),
                        field: path.to_owned(),
                        type_name: type_name.to_owned(),
                    });
                }
                scope.quantization
            }
        };

        Ok(match (template.codec, quantization) {
            (PrimitiveCodec::Bool, _) => LeafCodec::Bool,
            (PrimitiveCodec::SInt { bits }, _) => LeafCodec::SInt { bits },
            (PrimitiveCodec::UInt { bits }, _) => LeafCodec::UInt { bits },
            (PrimitiveCodec::Float32, None) => LeafCodec::Float,
            (PrimitiveCodec::Float32, Some(scale)) => LeafCodec::QuantizedFloat { scale },
        })
    }

    fn push_leaf(
        &mut self,
        field: &FieldDescriptor,
        path: String,
        codec: LeafCodec,
        scope: Inherited,
    ) -> SchemaResult<()> {
        let smoothing = if codec.is_interpolable() {
            scope.smoothing
        } else if field.smoothing == Smoothing::None {
            Smoothing::None
        } else {
            return Err(SchemaError::SmoothingUnsupported {
                record: self.record.to_owned(),
                field: path,
            });
        };

        let bit = self.acc.assign_bit();
        self.leaves.push(LeafPlan {
            path,
            codec,
            bit,
            smoothing,
            send: scope.send,
        });
        Ok(())
    }

    fn check_composite(&self, path: &str, first_leaf: usize) -> SchemaResult<()> {
        let group = &self.leaves[first_leaf..];
        let Some(first) = group.first() else {
            return Err(SchemaError::EmptyComposite {
                record: self.record.to_owned(),
                field: path.to_owned(),
            });
        };
        if let Some(other) = group.iter().find(|leaf| leaf.codec != first.codec) {
            return Err(SchemaError::CompositeTypeMismatch {
                record: self.record.to_owned(),
                field: path.to_owned(),
                expected: first.codec.to_string(),
                found: other.codec.to_string(),
            });
        }
        Ok(())
    }

    fn err_duplicate(&self, path: String) -> SchemaError {
        SchemaError::DuplicateField {
            record: self.record.to_owned(),
            field: path,
        }
    }
}
