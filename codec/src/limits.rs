//! Limits for codec-level encoding and decoding.

/// Codec-specific limits enforced on buffers, payloads and command packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecLimits {
    /// Maximum number of elements in one buffer field.
    pub max_buffer_elements: usize,
    /// Maximum number of bytes in one fields or buffer payload.
    pub max_payload_bytes: usize,
    /// Maximum number of commands carried by one command packet.
    pub max_commands_per_packet: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_buffer_elements: 1024,
            max_payload_bytes: 32 * 1024,
            max_commands_per_packet: 8,
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_buffer_elements: 64,
            max_payload_bytes: 4096,
            max_commands_per_packet: 4,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_buffer_elements: usize::MAX,
            max_payload_bytes: usize::MAX,
            max_commands_per_packet: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_reasonable() {
        let limits = CodecLimits::default();
        assert!(limits.max_buffer_elements >= 128);
        assert!(limits.max_payload_bytes >= 1024);
        assert!(limits.max_commands_per_packet >= 2);
    }

    #[test]
    fn testing_limits_smaller() {
        let test_limits = CodecLimits::for_testing();
        let default_limits = CodecLimits::default();
        assert!(test_limits.max_buffer_elements < default_limits.max_buffer_elements);
        assert!(test_limits.max_payload_bytes < default_limits.max_payload_bytes);
    }

    #[test]
    fn unlimited_limits() {
        let limits = CodecLimits::unlimited();
        assert_eq!(limits.max_buffer_elements, usize::MAX);
        assert_eq!(limits.max_payload_bytes, usize::MAX);
    }
}
