//! Fixed-capacity tick-indexed ring.

use std::num::NonZeroUsize;

use crate::types::SnapshotTick;

/// Stores one value per tick in slot `tick % capacity`.
///
/// Writes are last-write-wins. Lookups fall back to the closest earlier tick
/// still inside the window, so a missing command repeats the previous one.
#[derive(Debug, Clone)]
pub struct TickRing<T> {
    slots: Vec<Option<(SnapshotTick, T)>>,
}

impl<T: Clone + Default> TickRing<T> {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: vec![None; capacity.get()],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Stores `value` at `tick`, replacing whatever shared its slot.
    pub fn set(&mut self, tick: SnapshotTick, value: T) {
        let slot = self.slot(tick);
        self.slots[slot] = Some((tick, value));
    }

    /// Returns the value stored at exactly `tick`.
    #[must_use]
    pub fn get_exact(&self, tick: SnapshotTick) -> Option<&T> {
        match &self.slots[self.slot(tick)] {
            Some((stored, value)) if *stored == tick => Some(value),
            _ => None,
        }
    }

    /// Returns the value at `tick` and whether it was an exact hit.
    ///
    /// Without an exact hit, returns the closest stored tick `t <= tick`
    /// with `tick - t < capacity`, or `T::default()` if there is none.
    #[must_use]
    pub fn try_get(&self, tick: SnapshotTick) -> (T, bool) {
        if let Some(value) = self.get_exact(tick) {
            return (value.clone(), true);
        }
        for distance in 1..self.capacity() as u32 {
            let Some(earlier) = tick.checked_sub(distance) else {
                break;
            };
            if let Some(value) = self.get_exact(earlier) {
                return (value.clone(), false);
            }
        }
        (T::default(), false)
    }

    /// Looks up `tick - step` with the same fallback as [`try_get`](Self::try_get).
    #[must_use]
    pub fn try_get_previous(&self, tick: SnapshotTick, step: u32) -> (T, bool) {
        tick.checked_sub(step)
            .map_or_else(|| (T::default(), false), |earlier| self.try_get(earlier))
    }

    /// The most recent stored tick and its value.
    #[must_use]
    pub fn latest(&self) -> Option<(SnapshotTick, &T)> {
        self.slots
            .iter()
            .flatten()
            .max_by_key(|(tick, _)| *tick)
            .map(|(tick, value)| (*tick, value))
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    fn slot(&self, tick: SnapshotTick) -> usize {
        tick.raw() as usize % self.slots.len()
    }
}
