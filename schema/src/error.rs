//! Configuration errors raised while building a record plan.

use std::fmt;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when validating descriptors or building a plan.
///
/// Field-level variants name the record and the dotted field path so the
/// offending declaration can be found directly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// No codec is registered under the field's type name.
    UnknownType {
        record: String,
        field: String,
        type_name: String,
    },

    /// The type requires a quantization factor but none was given.
    MissingQuantization {
        record: String,
        field: String,
        type_name: String,
    },

    /// A quantization factor was given for a type that cannot use one.
    QuantizationUnsupported {
        record: String,
        field: String,
        type_name: String,
    },

    /// Quantization factor must be non-zero.
    InvalidQuantization { record: String, field: String },

    /// A composite field contains leaves of different underlying types.
    CompositeTypeMismatch {
        record: String,
        field: String,
        expected: String,
        found: String,
    },

    /// A composite field has no leaves.
    EmptyComposite { record: String, field: String },

    /// Two sibling fields share a name.
    DuplicateField { record: String, field: String },

    /// Enum with zero variants.
    InvalidEnum { record: String, field: String },

    /// Interpolation requested for a field that cannot be interpolated.
    SmoothingUnsupported { record: String, field: String },

    /// Buffer fields may only appear at the top level of a record.
    NestedBuffer { record: String, field: String },

    /// Invalid bit width for a registered integer type.
    InvalidBitWidth { type_name: String, bits: u8 },

    /// A type name was registered twice.
    DuplicateType { type_name: String },

    /// A non-float template was registered as accepting quantization.
    QuantizedTemplate { type_name: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType {
                record,
                field,
                type_name,
            } => write!(f, "{record}.{field}: unknown type '{type_name}'"),
            Self::MissingQuantization {
                record,
                field,
                type_name,
            } => write!(
                f,
                "{record}.{field}: type '{type_name}' requires a quantization factor"
            ),
            Self::QuantizationUnsupported {
                record,
                field,
                type_name,
            } => write!(
                f,
                "{record}.{field}: type '{type_name}' does not support quantization"
            ),
            Self::InvalidQuantization { record, field } => {
                write!(f, "{record}.{field}: quantization factor must be non-zero")
            }
            Self::CompositeTypeMismatch {
                record,
                field,
                expected,
                found,
            } => write!(
                f,
                "{record}.{field}: composite expects '{expected}' leaves, found '{found}'"
            ),
            Self::EmptyComposite { record, field } => {
                write!(f, "{record}.{field}: composite has no fields")
            }
            Self::DuplicateField { record, field } => {
                write!(f, "{record}.{field}: duplicate field name")
            }
            Self::InvalidEnum { record, field } => {
                write!(f, "{record}.{field}: enum must have at least one variant")
            }
            Self::SmoothingUnsupported { record, field } => {
                write!(f, "{record}.{field}: field cannot be interpolated")
            }
            Self::NestedBuffer { record, field } => {
                write!(f, "{record}.{field}: buffer fields cannot be nested")
            }
            Self::InvalidBitWidth { type_name, bits } => {
                write!(f, "type '{type_name}': invalid bit width {bits}")
            }
            Self::DuplicateType { type_name } => {
                write!(f, "type '{type_name}' is already registered")
            }
            Self::QuantizedTemplate { type_name } => {
                write!(f, "type '{type_name}': only float types can be quantized")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_record_and_field() {
        let err = SchemaError::MissingQuantization {
            record: "Player".into(),
            field: "pos.x".into(),
            type_name: "qfloat".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Player.pos.x"), "got: {msg}");
        assert!(msg.contains("qfloat"), "got: {msg}");
    }

    #[test]
    fn error_display_bit_width() {
        let err = SchemaError::InvalidBitWidth {
            type_name: "u99".into(),
            bits: 99,
        };
        assert_eq!(err.to_string(), "type 'u99': invalid bit width 99");
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<SchemaError>();
    }
}
