//! Record descriptors.

use crate::FieldDescriptor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered list of fields.
///
/// Declaration order is the wire order: it fixes change-mask bit positions
/// and payload layout on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordDescriptor {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    /// Creates a record with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Creates a record with the provided fields.
    #[must_use]
    pub fn with_fields(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Adds a field to the record.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_order() {
        let record = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("a", "i32"))
            .field(FieldDescriptor::primitive("b", "bool"));
        let names: Vec<_> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn record_from_json() {
        let json = r#"{
            "name": "Ghost",
            "fields": [
                { "name": "hp", "kind": "primitive", "type_name": "u16" },
                { "name": "state", "kind": "enum", "variants": 5 },
                { "name": "items", "kind": "buffer", "element": {
                    "name": "Item",
                    "fields": [{ "name": "id", "kind": "primitive", "type_name": "u32" }]
                } }
            ]
        }"#;
        let record: RecordDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(record.fields.len(), 3);
        assert_eq!(record.fields[1], FieldDescriptor::enumeration("state", 5));
    }
}
