//! Error types for codec operations.

use std::fmt;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or storing records.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CodecError {
    /// Wire format error.
    Wire(wire::DecodeError),

    /// Wire encoding error.
    Encode(wire::EncodeError),

    /// Bitstream error.
    Bitstream(bitstream::BitError),

    /// Descriptor hash mismatch.
    DescriptorMismatch { expected: u64, found: u64 },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Buffer resize request outside the permitted range.
    InvalidBufferSize { requested: usize, limit: usize },

    /// Invalid mask data.
    InvalidMask { reason: MaskReason },

    /// Field value does not match its leaf codec.
    InvalidValue { field: String, reason: ValueReason },

    /// Record does not have the shape described by the plan.
    ShapeMismatch {
        record: String,
        expected_fields: usize,
        found_fields: usize,
        expected_buffers: usize,
        found_buffers: usize,
    },

    /// A delta snapshot was read without its baseline.
    BaselineRequired { baseline_tick: u32 },

    /// Tick 0 marks "no baseline" on the wire and cannot be a baseline.
    ZeroBaselineTick,

    /// A payload had non-zero bits after the last field.
    TrailingPayloadBits { remaining_bits: usize },

    /// Unexpected section for the current packet type.
    UnexpectedSection { section: wire::SectionTag },

    /// Duplicate section encountered.
    DuplicateSection { section: wire::SectionTag },

    /// Required section is absent.
    MissingSection { section: wire::SectionTag },

    /// Element or region index out of range.
    IndexOutOfRange { index: usize, len: usize },

    /// Element bytes do not match the region stride.
    ElementSizeMismatch { expected: usize, found: usize },

    /// Entity index outside the preallocated history.
    EntityOutOfRange { entity: u32, entities: usize },

    /// No command stored for the requested tick.
    CommandNotFound { tick: u32 },

    /// Command section `i` does not carry tick `header.tick - i`.
    CommandTickMismatch { expected: u32, found: u32 },

    /// Command records cannot carry buffer fields.
    BuffersNotSupported { record: String },
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    BufferElements,
    PayloadBytes,
    CommandsPerPacket,
}

/// Details for invalid mask errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskReason {
    /// Mask bit count differs from the plan.
    BitCountMismatch { expected: usize, found: usize },
    /// Word count differs from `ceil(bits / 32)`.
    WordCountMismatch { expected: usize, found: usize },
    /// A bit past the last assigned bit is set.
    UnknownBit { bit: usize },
    /// A buffer section refers to a buffer the plan does not have.
    UnknownBuffer { index: usize },
    /// Buffer sections are not in strictly ascending order.
    BufferOrder { previous: usize, current: usize },
    /// A buffer section is present but its mask bit is clear.
    BufferBitClear { index: usize },
    /// A buffer bit is set but no section carries it.
    BufferMissing { index: usize },
    /// A buffer section carries a different number of element masks than
    /// the record has elements.
    ElementCount { index: usize, expected: usize, found: usize },
}

/// Details for invalid value errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueReason {
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    UnsignedOutOfRange {
        bits: u8,
        value: u64,
    },
    SignedOutOfRange {
        bits: u8,
        value: i64,
    },
    EnumOutOfRange {
        variants: u32,
        value: u64,
    },
    QuantizedOutOfRange {
        scale: u32,
        value: f64,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(e) => write!(f, "wire error: {e}"),
            Self::Encode(e) => write!(f, "wire encode error: {e}"),
            Self::Bitstream(e) => write!(f, "bitstream error: {e}"),
            Self::DescriptorMismatch { expected, found } => {
                write!(
                    f,
                    "descriptor hash mismatch: expected 0x{expected:016X}, found 0x{found:016X}"
                )
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::InvalidBufferSize { requested, limit } => {
                write!(
                    f,
                    "invalid buffer size: {requested} elements (limit {limit})"
                )
            }
            Self::InvalidMask { reason } => write!(f, "invalid change mask: {reason}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{field}': {reason}")
            }
            Self::ShapeMismatch {
                record,
                expected_fields,
                found_fields,
                expected_buffers,
                found_buffers,
            } => {
                write!(
                    f,
                    "record '{record}' shape mismatch: expected {expected_fields} fields and \
                     {expected_buffers} buffers, found {found_fields} and {found_buffers}"
                )
            }
            Self::BaselineRequired { baseline_tick } => {
                write!(f, "delta snapshot requires baseline tick {baseline_tick}")
            }
            Self::ZeroBaselineTick => write!(f, "baseline tick 0 is reserved"),
            Self::TrailingPayloadBits { remaining_bits } => {
                write!(f, "trailing payload data: {remaining_bits} bits")
            }
            Self::UnexpectedSection { section } => {
                write!(f, "unexpected section {section:?}")
            }
            Self::DuplicateSection { section } => {
                write!(f, "duplicate section {section:?} in packet")
            }
            Self::MissingSection { section } => {
                write!(f, "missing section {section:?}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range (len {len})")
            }
            Self::ElementSizeMismatch { expected, found } => {
                write!(f, "element is {found} bytes, stride is {expected}")
            }
            Self::EntityOutOfRange { entity, entities } => {
                write!(f, "entity {entity} out of range ({entities} slots)")
            }
            Self::CommandNotFound { tick } => write!(f, "no command stored for tick {tick}"),
            Self::CommandTickMismatch { expected, found } => {
                write!(f, "command tick mismatch: expected {expected}, found {found}")
            }
            Self::BuffersNotSupported { record } => {
                write!(f, "record '{record}' has buffer fields; commands cannot carry them")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BufferElements => "buffer elements",
            Self::PayloadBytes => "payload bytes",
            Self::CommandsPerPacket => "commands per packet",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for MaskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitCountMismatch { expected, found } => {
                write!(f, "expected {expected} bits, found {found}")
            }
            Self::WordCountMismatch { expected, found } => {
                write!(f, "expected {expected} words, found {found}")
            }
            Self::UnknownBit { bit } => write!(f, "bit {bit} is not assigned"),
            Self::UnknownBuffer { index } => write!(f, "unknown buffer {index}"),
            Self::BufferOrder { previous, current } => {
                write!(f, "buffer {current} follows buffer {previous}")
            }
            Self::BufferBitClear { index } => {
                write!(f, "buffer {index} present but its bit is clear")
            }
            Self::BufferMissing { index } => {
                write!(f, "buffer {index} bit set but no section present")
            }
            Self::ElementCount {
                index,
                expected,
                found,
            } => write!(
                f,
                "buffer {index} has {expected} elements but {found} masks"
            ),
        }
    }
}

impl fmt::Display for ValueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected} but got {found}")
            }
            Self::UnsignedOutOfRange { bits, value } => {
                write!(f, "unsigned value {value} does not fit in {bits} bits")
            }
            Self::SignedOutOfRange { bits, value } => {
                write!(f, "signed value {value} does not fit in {bits} bits")
            }
            Self::EnumOutOfRange { variants, value } => {
                write!(f, "enum value {value} outside {variants} variants")
            }
            Self::QuantizedOutOfRange { scale, value } => {
                write!(f, "value {value} scaled by {scale} does not fit in i32")
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Bitstream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wire::DecodeError> for CodecError {
    fn from(err: wire::DecodeError) -> Self {
        Self::Wire(err)
    }
}

impl From<wire::EncodeError> for CodecError {
    fn from(err: wire::EncodeError) -> Self {
        Self::Encode(err)
    }
}

impl From<bitstream::BitError> for CodecError {
    fn from(err: bitstream::BitError) -> Self {
        Self::Bitstream(err)
    }
}
