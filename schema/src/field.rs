//! Field descriptors and per-field replication policy.

use crate::RecordDescriptor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a receiver reconstructs a value between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Smoothing {
    /// Take the value decoded from the newer snapshot.
    #[default]
    None,
    /// Linear interpolation on decoded values, factor clamped to `[0, 1]`.
    Interpolate,
    /// Linear interpolation with the raw factor, output clamped to the
    /// range spanned by the two snapshots.
    Clamp,
}

/// When a field is considered dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SendPolicy {
    /// Dirty when the quantized value differs from the baseline.
    #[default]
    OnChange,
    /// Dirty on every snapshot.
    Always,
}

/// Semantic kind of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum FieldKind {
    /// A primitive resolved through the type registry.
    Primitive { type_name: String },

    /// An enumeration with `variants` discriminants `0..variants`.
    Enum { variants: u32 },

    /// A fixed-size nested structure.
    Struct { fields: Vec<FieldDescriptor> },

    /// A variable-length array of element records.
    Buffer { element: RecordDescriptor },
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDescriptor {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: FieldKind,
    /// Scale applied before encoding as an integer. Inherited by struct leaves
    /// that do not set their own.
    #[cfg_attr(feature = "serde", serde(default))]
    pub quantization: Option<u32>,
    /// Aggregate every leaf of this field under a single change-mask bit.
    #[cfg_attr(feature = "serde", serde(default))]
    pub composite: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub smoothing: Smoothing,
    #[cfg_attr(feature = "serde", serde(default))]
    pub send: SendPolicy,
}

impl FieldDescriptor {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            quantization: None,
            composite: false,
            smoothing: Smoothing::None,
            send: SendPolicy::OnChange,
        }
    }

    /// Creates a primitive field resolved by type name.
    #[must_use]
    pub fn primitive(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            FieldKind::Primitive {
                type_name: type_name.into(),
            },
        )
    }

    /// Creates an enum field.
    #[must_use]
    pub fn enumeration(name: impl Into<String>, variants: u32) -> Self {
        Self::with_kind(name, FieldKind::Enum { variants })
    }

    /// Creates a nested struct field.
    #[must_use]
    pub fn structure(name: impl Into<String>, fields: Vec<Self>) -> Self {
        Self::with_kind(name, FieldKind::Struct { fields })
    }

    /// Creates a variable-length buffer field.
    #[must_use]
    pub fn buffer(name: impl Into<String>, element: RecordDescriptor) -> Self {
        Self::with_kind(name, FieldKind::Buffer { element })
    }

    /// Sets the quantization factor.
    #[must_use]
    pub fn quantized(mut self, factor: u32) -> Self {
        self.quantization = Some(factor);
        self
    }

    /// Marks the field as a composite (one change-mask bit for all leaves).
    #[must_use]
    pub fn composite(mut self) -> Self {
        self.composite = true;
        self
    }

    /// Sets the smoothing mode.
    #[must_use]
    pub fn smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Sets the send policy.
    #[must_use]
    pub fn send(mut self, send: SendPolicy) -> Self {
        self.send = send;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_defaults() {
        let field = FieldDescriptor::primitive("hp", "u16");
        assert_eq!(
            field.kind,
            FieldKind::Primitive {
                type_name: "u16".into()
            }
        );
        assert_eq!(field.quantization, None);
        assert!(!field.composite);
        assert_eq!(field.smoothing, Smoothing::None);
        assert_eq!(field.send, SendPolicy::OnChange);
    }

    #[test]
    fn builder_chain() {
        let field = FieldDescriptor::structure(
            "pos",
            vec![
                FieldDescriptor::primitive("x", "f32"),
                FieldDescriptor::primitive("y", "f32"),
            ],
        )
        .quantized(100)
        .composite()
        .smoothing(Smoothing::Interpolate)
        .send(SendPolicy::Always);

        assert_eq!(field.quantization, Some(100));
        assert!(field.composite);
        assert_eq!(field.smoothing, Smoothing::Interpolate);
        assert_eq!(field.send, SendPolicy::Always);
        assert!(matches!(field.kind, FieldKind::Struct { ref fields } if fields.len() == 2));
    }

    #[test]
    fn buffer_holds_element_descriptor() {
        let element = RecordDescriptor::new("Slot").field(FieldDescriptor::primitive("id", "u8"));
        let field = FieldDescriptor::buffer("slots", element.clone());
        assert_eq!(field.kind, FieldKind::Buffer { element });
    }

    #[cfg(feature = "serde")]
    #[test]
    fn field_from_json() {
        let json = r#"{"name":"x","kind":"primitive","type_name":"f32","quantization":10,"smoothing":"interpolate"}"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(
            field,
            FieldDescriptor::primitive("x", "f32")
                .quantized(10)
                .smoothing(Smoothing::Interpolate)
        );
    }
}
