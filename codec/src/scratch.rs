//! Reusable scratch buffers for codec operations.

/// Per-thread working buffers for the snapshot writer.
///
/// Holds no state between calls beyond allocated capacity, so one instance
/// per worker thread can serve any number of records.
#[derive(Debug, Default)]
pub struct CodecScratch {
    dirty_bits: Vec<bool>,
    current_q: Vec<i64>,
    baseline_q: Vec<i64>,
}

impl CodecScratch {
    /// Creates a new scratch buffer with no pre-allocated capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_bit_capacity(&mut self, bits: usize) {
        if self.dirty_bits.len() < bits {
            self.dirty_bits.resize(bits, false);
        }
    }

    fn ensure_leaf_capacity(&mut self, leaves: usize) {
        if self.current_q.len() < leaves {
            self.current_q.resize(leaves, 0);
            self.baseline_q.resize(leaves, 0);
        }
    }
}

/// Borrowed working slices for one record.
pub(crate) struct LeafScratch<'a> {
    pub dirty: &'a mut [bool],
    pub current_q: &'a mut [i64],
    pub baseline_q: &'a mut [i64],
}

impl CodecScratch {
    /// Returns cleared dirty flags for `bits` mask bits and quantized slots
    /// for `leaves` leaves.
    pub(crate) fn leaf_scratch(&mut self, bits: usize, leaves: usize) -> LeafScratch<'_> {
        self.ensure_bit_capacity(bits);
        self.ensure_leaf_capacity(leaves);
        let dirty = &mut self.dirty_bits[..bits];
        dirty.fill(false);
        LeafScratch {
            dirty,
            current_q: &mut self.current_q[..leaves],
            baseline_q: &mut self.baseline_q[..leaves],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_slices_are_sized_and_cleared() {
        let mut scratch = CodecScratch::new();
        {
            let s = scratch.leaf_scratch(4, 3);
            assert_eq!(s.dirty.len(), 4);
            assert_eq!(s.current_q.len(), 3);
            assert_eq!(s.baseline_q.len(), 3);
            s.dirty[2] = true;
        }
        let s = scratch.leaf_scratch(2, 1);
        assert_eq!(s.dirty, &[false, false]);
        let s = scratch.leaf_scratch(4, 1);
        assert!(s.dirty.iter().all(|d| !d));
    }
}
