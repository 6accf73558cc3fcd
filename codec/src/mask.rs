//! Change masks.

use crate::error::{CodecError, CodecResult, MaskReason};

/// Bit-vector of changed fields, stored as `ceil(bits / 32)` words.
///
/// Bit `i` lives in word `i / 32` at position `i % 32`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeMask {
    words: Vec<u32>,
    bits: usize,
}

impl ChangeMask {
    /// Creates an all-clear mask of `bits` bits.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(32)],
            bits,
        }
    }

    /// Creates an all-set mask of `bits` bits.
    #[must_use]
    pub fn full(bits: usize) -> Self {
        let mut mask = Self::new(bits);
        for bit in 0..bits {
            mask.set(bit);
        }
        mask
    }

    /// Builds a mask from wire words, rejecting bits past `bits`.
    pub fn from_words(bits: usize, words: Vec<u32>) -> CodecResult<Self> {
        let expected = bits.div_ceil(32);
        if words.len() != expected {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::WordCountMismatch {
                    expected,
                    found: words.len(),
                },
            });
        }
        let mask = Self { words, bits };
        if let Some(bit) = mask.highest_set().filter(|bit| *bit >= bits) {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::UnknownBit { bit },
            });
        }
        Ok(mask)
    }

    /// Number of bits.
    #[must_use]
    pub const fn bits(&self) -> usize {
        self.bits
    }

    /// Backing words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Sets bit `bit`. Out-of-range bits are ignored.
    pub fn set(&mut self, bit: usize) {
        if bit < self.bits {
            self.words[bit / 32] |= 1 << (bit % 32);
        }
    }

    /// Returns bit `bit`; out-of-range bits read as clear.
    #[must_use]
    pub fn get(&self, bit: usize) -> bool {
        bit < self.bits && self.words[bit / 32] & (1 << (bit % 32)) != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bits).filter(|bit| self.get(*bit))
    }

    fn highest_set(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 32 + 31 - w.leading_zeros() as usize)
    }
}
