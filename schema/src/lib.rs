//! Record descriptors and change-mask planning for the ghostsnap codec.
//!
//! This crate defines how replicated state is described:
//! - Record and field descriptors (primitive, enum, struct, buffer)
//! - An explicit type registry mapping type names to codecs
//! - Quantization, composite grouping, smoothing and send policy
//! - Change-mask bit accounting and the flat per-record execution plan
//! - Deterministic descriptor hashing
//!
//! # Design Principles
//!
//! - **Validate once** - Configuration errors surface while building a plan, never while encoding.
//! - **Fixed walk order** - Declaration order decides bit positions and payload layout.
//! - **Explicit registry** - Type templates are passed in, not looked up globally.
//! - **Deterministic hashing** - The plan hash is stable given the same descriptor.

mod error;
mod field;
mod hash;
mod mask;
mod plan;
mod record;
mod registry;

pub use error::{SchemaError, SchemaResult};
pub use field::{FieldDescriptor, FieldKind, SendPolicy, Smoothing};
pub use hash::plan_hash;
pub use mask::MaskAccumulator;
pub use plan::{required_bits, BufferPlan, LeafCodec, LeafPlan, RecordPlan};
pub use record::RecordDescriptor;
pub use registry::{PrimitiveCodec, QuantizationSupport, TypeRegistry, TypeTemplate};
