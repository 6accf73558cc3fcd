//! Packet header types and constants.

/// Magic number identifying ghostsnap packets.
///
/// This value is fixed and must never change across versions.
pub const MAGIC: u32 = 0x4753_4E50; // "GSNP" in ASCII

/// Current wire format version.
pub const VERSION: u16 = 1;

/// Header size in bytes (28 total).
pub const HEADER_SIZE: usize = 4 + 2 + 2 + 8 + 4 + 4 + 4;

/// Packet flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketFlags(u16);

impl PacketFlags {
    /// Flag indicating a full-state snapshot (no baseline).
    pub const FULL_SNAPSHOT: u16 = 1 << 0;

    /// Flag indicating a snapshot delta-coded against a baseline tick.
    pub const DELTA_SNAPSHOT: u16 = 1 << 1;

    /// Flag indicating a command packet.
    pub const COMMAND: u16 = 1 << 2;

    /// Reserved bits mask (must be zero in version 1).
    const RESERVED_MASK: u16 = !0b111;

    /// Creates new flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` if this is a full snapshot.
    #[must_use]
    pub const fn is_full_snapshot(self) -> bool {
        self.0 & Self::FULL_SNAPSHOT != 0
    }

    /// Returns `true` if this is a delta snapshot.
    #[must_use]
    pub const fn is_delta_snapshot(self) -> bool {
        self.0 & Self::DELTA_SNAPSHOT != 0
    }

    /// Returns `true` if this is a command packet.
    #[must_use]
    pub const fn is_command(self) -> bool {
        self.0 & Self::COMMAND != 0
    }

    /// Returns `true` if exactly one packet kind is set and no reserved bits are.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        if self.0 & Self::RESERVED_MASK != 0 {
            return false;
        }
        (self.0 & !Self::RESERVED_MASK).count_ones() == 1
    }

    /// Creates flags for a full snapshot.
    #[must_use]
    pub const fn full_snapshot() -> Self {
        Self(Self::FULL_SNAPSHOT)
    }

    /// Creates flags for a delta snapshot.
    #[must_use]
    pub const fn delta_snapshot() -> Self {
        Self(Self::DELTA_SNAPSHOT)
    }

    /// Creates flags for a command packet.
    #[must_use]
    pub const fn command() -> Self {
        Self(Self::COMMAND)
    }
}

/// Packet header.
///
/// This struct represents the header fields *after* the magic number.
/// The magic number is validated separately during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Wire format version.
    pub version: u16,
    /// Packet flags.
    pub flags: PacketFlags,
    /// Record descriptor hash; both sides must agree.
    pub descriptor_hash: u64,
    /// Simulation tick this packet represents.
    pub tick: u32,
    /// Baseline tick for delta packets (0 otherwise).
    pub baseline_tick: u32,
    /// Payload length in bytes.
    pub payload_len: u32,
}

impl PacketHeader {
    /// Creates a new header for a full snapshot.
    #[must_use]
    pub const fn full_snapshot(descriptor_hash: u64, tick: u32, payload_len: u32) -> Self {
        Self {
            version: VERSION,
            flags: PacketFlags::full_snapshot(),
            descriptor_hash,
            tick,
            baseline_tick: 0,
            payload_len,
        }
    }

    /// Creates a new header for a delta snapshot.
    #[must_use]
    pub const fn delta_snapshot(
        descriptor_hash: u64,
        tick: u32,
        baseline_tick: u32,
        payload_len: u32,
    ) -> Self {
        Self {
            version: VERSION,
            flags: PacketFlags::delta_snapshot(),
            descriptor_hash,
            tick,
            baseline_tick,
            payload_len,
        }
    }

    /// Creates a new header for a command packet.
    #[must_use]
    pub const fn command(descriptor_hash: u64, tick: u32, payload_len: u32) -> Self {
        Self {
            version: VERSION,
            flags: PacketFlags::command(),
            descriptor_hash,
            tick,
            baseline_tick: 0,
            payload_len,
        }
    }
}
