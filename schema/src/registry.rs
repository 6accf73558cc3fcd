//! Type registry: maps primitive type names to codecs.
//!
//! The registry is an explicit value built once at startup and passed by
//! reference into plan building. There is no process-wide table.

use std::collections::BTreeMap;

use crate::error::{SchemaError, SchemaResult};

/// Primitive encodings known to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveCodec {
    /// Boolean (1 bit).
    Bool,
    /// Signed two's complement integer with fixed bit width.
    SInt { bits: u8 },
    /// Unsigned integer with fixed bit width.
    UInt { bits: u8 },
    /// IEEE-754 single precision float.
    Float32,
}

/// Whether a type accepts a quantization factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantizationSupport {
    Unsupported,
    Optional,
    Required,
}

/// Registered codec for a type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTemplate {
    pub codec: PrimitiveCodec,
    pub quantization: QuantizationSupport,
}

impl TypeTemplate {
    /// Creates a template that does not accept quantization.
    #[must_use]
    pub const fn exact(codec: PrimitiveCodec) -> Self {
        Self {
            codec,
            quantization: QuantizationSupport::Unsupported,
        }
    }

    /// Creates a template with the given quantization support.
    #[must_use]
    pub const fn new(codec: PrimitiveCodec, quantization: QuantizationSupport) -> Self {
        Self {
            codec,
            quantization,
        }
    }
}

/// Table of type name to [`TypeTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    templates: BTreeMap<String, TypeTemplate>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in primitives:
    /// `bool`, `i8`..`i64`, `u8`..`u64` and `f32` (optionally quantized).
    #[must_use]
    pub fn with_defaults() -> Self {
        let builtins = [
            ("bool", TypeTemplate::exact(PrimitiveCodec::Bool)),
            ("i8", TypeTemplate::exact(PrimitiveCodec::SInt { bits: 8 })),
            ("i16", TypeTemplate::exact(PrimitiveCodec::SInt { bits: 16 })),
            ("i32", TypeTemplate::exact(PrimitiveCodec::SInt { bits: 32 })),
            ("i64", TypeTemplate::exact(PrimitiveCodec::SInt { bits: 64 })),
            ("u8", TypeTemplate::exact(PrimitiveCodec::UInt { bits: 8 })),
            ("u16", TypeTemplate::exact(PrimitiveCodec::UInt { bits: 16 })),
            ("u32", TypeTemplate::exact(PrimitiveCodec::UInt { bits: 32 })),
            ("u64", TypeTemplate::exact(PrimitiveCodec::UInt { bits: 64 })),
            (
                "f32",
                TypeTemplate::new(PrimitiveCodec::Float32, QuantizationSupport::Optional),
            ),
        ];
        let templates = builtins
            .into_iter()
            .map(|(name, template)| (name.to_owned(), template))
            .collect();
        Self { templates }
    }

    /// Registers a new type name.
    pub fn register(&mut self, name: impl Into<String>, template: TypeTemplate) -> SchemaResult<()> {
        let name = name.into();
        if let PrimitiveCodec::SInt { bits } | PrimitiveCodec::UInt { bits } = template.codec {
            if bits == 0 || bits > 64 {
                return Err(SchemaError::InvalidBitWidth {
                    type_name: name,
                    bits,
                });
            }
        }
        if template.quantization != QuantizationSupport::Unsupported
            && template.codec != PrimitiveCodec::Float32
        {
            return Err(SchemaError::QuantizedTemplate { type_name: name });
        }
        if self.templates.contains_key(&name) {
            return Err(SchemaError::DuplicateType { type_name: name });
        }
        self.templates.insert(name, template);
        Ok(())
    }

    /// Looks up a type name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeTemplate> {
        self.templates.get(name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterates registered types in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeTemplate)> {
        self.templates.iter().map(|(name, t)| (name.as_str(), t))
    }
}
