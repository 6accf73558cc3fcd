//! Prefix-bucketed integer packing.
//!
//! A packed value is a unary bucket selector followed by the value bits:
//!
//! | prefix | payload bits |
//! |--------|--------------|
//! | `0`    | 4            |
//! | `10`   | 8            |
//! | `110`  | 16           |
//! | `1110` | 32           |
//! | `1111` | 64           |
//!
//! Signed values are zigzag-mapped before packing so small magnitudes of
//! either sign land in the smallest bucket.

/// Payload widths per bucket, smallest first.
pub(crate) const BUCKET_BITS: [u8; 5] = [4, 8, 16, 32, 64];

/// Index of the last bucket (its prefix has no terminating zero).
pub(crate) const LAST_BUCKET: usize = BUCKET_BITS.len() - 1;

/// Returns the bucket index for an unsigned value.
pub(crate) const fn bucket_for(value: u64) -> usize {
    let mut idx = 0;
    while idx < LAST_BUCKET {
        if value < (1u64 << BUCKET_BITS[idx]) {
            return idx;
        }
        idx += 1;
    }
    LAST_BUCKET
}

/// Number of bits `value` occupies once packed (prefix included).
#[must_use]
pub const fn packed_len_bits(value: u64) -> usize {
    let bucket = bucket_for(value);
    let prefix = if bucket == LAST_BUCKET {
        LAST_BUCKET
    } else {
        bucket + 1
    };
    prefix + BUCKET_BITS[bucket] as usize
}

/// Maps a signed integer onto an unsigned one (0, -1, 1, -2, ...).
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[must_use]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_small_magnitudes() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MAX)), i64::MAX);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(bucket_for(0), 0);
        assert_eq!(bucket_for(15), 0);
        assert_eq!(bucket_for(16), 1);
        assert_eq!(bucket_for(255), 1);
        assert_eq!(bucket_for(256), 2);
        assert_eq!(bucket_for(u64::from(u32::MAX)), 3);
        assert_eq!(bucket_for(u64::MAX), 4);
    }

    #[test]
    fn packed_lengths() {
        assert_eq!(packed_len_bits(3), 5);
        assert_eq!(packed_len_bits(200), 10);
        assert_eq!(packed_len_bits(1 << 20), 36);
        assert_eq!(packed_len_bits(u64::MAX), 68);
    }
}
