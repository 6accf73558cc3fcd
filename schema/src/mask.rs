//! Change-mask bit accounting.

/// Assigns change-mask bits in declaration order.
///
/// Outside an aggregate scope every call to [`assign_bit`](Self::assign_bit)
/// yields a fresh bit. Inside a scope every call yields the same bit, and
/// closing the outermost scope advances the counter by exactly one. Nested
/// scopes share the outermost scope's bit. A scope that assigned nothing
/// consumes no bit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskAccumulator {
    next: usize,
    depth: usize,
    scope_used: bool,
}

impl MaskAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: 0,
            depth: 0,
            scope_used: false,
        }
    }

    /// Returns the bit for the next leaf.
    pub fn assign_bit(&mut self) -> usize {
        let bit = self.next;
        if self.depth > 0 {
            self.scope_used = true;
        } else {
            self.next += 1;
        }
        bit
    }

    /// Enters an aggregate scope.
    pub fn open_aggregate(&mut self) {
        self.depth += 1;
    }

    /// Leaves an aggregate scope. Unbalanced closes are ignored.
    pub fn close_aggregate(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0 && self.scope_used {
            self.next += 1;
            self.scope_used = false;
        }
    }

    /// Returns `true` while inside an aggregate scope.
    #[must_use]
    pub const fn in_aggregate(&self) -> bool {
        self.depth > 0
    }

    /// Total bits assigned so far.
    #[must_use]
    pub fn total_bits(&self) -> usize {
        self.next + usize::from(self.scope_used)
    }
}
