//! Decode limits for snapshot and command packets.

/// Wire-level bounds checked before any section body is parsed.
///
/// A snapshot packet holds one `Fields` section plus one `Buffer` section per
/// changed buffer field; a command packet holds one `Command` section per
/// redundant command. Element counts and payload sizes inside those sections
/// are bounded by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Largest accepted packet, header included.
    pub max_packet_bytes: usize,

    /// Most sections one packet may carry.
    pub max_sections: usize,

    /// Largest accepted section body. A buffer section with its element
    /// masks must fit in this.
    pub max_section_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_packet_bytes: 64 * 1024,
            // fields section plus up to 31 buffer sections
            max_sections: 32,
            max_section_len: 32 * 1024,
        }
    }
}

impl Limits {
    /// Small bounds for tests and fuzzing.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_packet_bytes: 4096,
            max_sections: 8,
            max_section_len: 1024,
        }
    }

    /// No bounds. Only for trusted input such as local captures.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_packet_bytes: usize::MAX,
            max_sections: usize::MAX,
            max_section_len: usize::MAX,
        }
    }
}
