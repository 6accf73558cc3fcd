//! Core types for the codec.

/// A simulation tick number.
///
/// Ticks are monotonically increasing identifiers for simulation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SnapshotTick(u32);

impl SnapshotTick {
    /// Creates a new snapshot tick.
    #[must_use]
    pub const fn new(tick: u32) -> Self {
        Self(tick)
    }

    /// Returns the raw tick value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if this tick is zero (used on the wire as "no baseline").
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns the tick `steps` earlier, or `None` before tick 0.
    #[must_use]
    pub const fn checked_sub(self, steps: u32) -> Option<Self> {
        match self.0.checked_sub(steps) {
            Some(tick) => Some(Self(tick)),
            None => None,
        }
    }
}

impl From<u32> for SnapshotTick {
    fn from(tick: u32) -> Self {
        Self(tick)
    }
}

impl From<SnapshotTick> for u32 {
    fn from(tick: SnapshotTick) -> Self {
        tick.0
    }
}

/// Index of an entity slot in shared history storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw entity ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tick_zero() {
        assert!(SnapshotTick::new(0).is_zero());
        assert!(!SnapshotTick::new(1).is_zero());
        assert!(SnapshotTick::default().is_zero());
    }

    #[test]
    fn snapshot_tick_conversions() {
        let tick: SnapshotTick = 42u32.into();
        assert_eq!(tick.raw(), 42);
        let value: u32 = SnapshotTick::new(99).into();
        assert_eq!(value, 99);
    }

    #[test]
    fn snapshot_tick_checked_sub() {
        assert_eq!(
            SnapshotTick::new(10).checked_sub(3),
            Some(SnapshotTick::new(7))
        );
        assert_eq!(SnapshotTick::new(2).checked_sub(3), None);
    }

    #[test]
    fn snapshot_tick_ordering() {
        assert!(SnapshotTick::new(1) < SnapshotTick::new(2));
        assert_eq!(SnapshotTick::new(2), SnapshotTick::new(2));
    }

    #[test]
    fn snapshot_tick_const() {
        const TICK: SnapshotTick = SnapshotTick::new(42);
        assert_eq!(TICK.raw(), 42);
    }

    #[test]
    fn entity_id_conversions() {
        let id: EntityId = 123u32.into();
        assert_eq!(id.raw(), 123);
        let value: u32 = EntityId::new(99).into();
        assert_eq!(value, 99);
        assert_eq!(EntityId::default().raw(), 0);
    }
}
