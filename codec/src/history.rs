//! Receiver-side history of decoded records.

use std::num::NonZeroUsize;

use parking_lot::RwLock;
use schema::RecordPlan;

use crate::buffer::DynamicBufferRing;
use crate::error::{CodecError, CodecResult, MaskReason};
use crate::field::FieldValue;
use crate::mask::ChangeMask;
use crate::record::Record;
use crate::ring::TickRing;
use crate::types::{EntityId, SnapshotTick};
use crate::writer::{BufferSnapshot, Snapshot};

/// Per-entity tick history for one record type.
///
/// Fixed fields live in one [`TickRing`] per entity; buffer fields live in a
/// shared [`DynamicBufferRing`]. Different entities can be stored and loaded
/// from different threads at the same time.
#[derive(Debug)]
pub struct SnapshotHistory {
    plan: RecordPlan,
    fields: Vec<RwLock<TickRing<Vec<FieldValue>>>>,
    buffers: DynamicBufferRing,
    max_buffer_elements: usize,
}

impl SnapshotHistory {
    /// Preallocates history for `entities` entities over `capacity_ticks` ticks.
    #[must_use]
    pub fn new(
        plan: RecordPlan,
        capacity_ticks: NonZeroUsize,
        entities: usize,
        max_buffer_elements: usize,
    ) -> Self {
        let buffers = DynamicBufferRing::new(capacity_ticks, entities, &plan, max_buffer_elements);
        let fields = (0..entities)
            .map(|_| RwLock::new(TickRing::new(capacity_ticks)))
            .collect();
        Self {
            plan,
            fields,
            buffers,
            max_buffer_elements,
        }
    }

    #[must_use]
    pub const fn plan(&self) -> &RecordPlan {
        &self.plan
    }

    #[must_use]
    pub fn entities(&self) -> usize {
        self.fields.len()
    }

    /// Stores `record` as the state of `entity` at `tick`.
    ///
    /// The record is validated first; an invalid record leaves the history
    /// unchanged. Element masks are cleared.
    pub fn store(&self, entity: EntityId, tick: SnapshotTick, record: &Record) -> CodecResult<()> {
        self.store_with_masks(entity, tick, record, &[])
    }

    /// Stores `record` decoded from `snapshot`, keeping the per-element
    /// change masks of every buffer section the snapshot carried.
    ///
    /// Buffers without a section get cleared masks.
    pub fn store_snapshot(
        &self,
        entity: EntityId,
        snapshot: &Snapshot,
        record: &Record,
    ) -> CodecResult<()> {
        self.store_with_masks(entity, snapshot.tick, record, &snapshot.buffers)
    }

    /// Element masks of buffer `buffer` for `entity` at exactly `tick`.
    pub fn element_masks(
        &self,
        entity: EntityId,
        tick: SnapshotTick,
        buffer: usize,
    ) -> CodecResult<Option<Vec<ChangeMask>>> {
        let ring = self.entity_ring(entity)?;
        if ring.read().get_exact(tick).is_none() {
            return Ok(None);
        }
        let region = self.buffers.read(tick, entity, buffer)?;
        (0..region.len())
            .map(|index| region.element_mask(index))
            .collect::<CodecResult<Vec<_>>>()
            .map(Some)
    }

    fn store_with_masks(
        &self,
        entity: EntityId,
        tick: SnapshotTick,
        record: &Record,
        sections: &[BufferSnapshot],
    ) -> CodecResult<()> {
        record.validate(&self.plan)?;
        let ring = self.entity_ring(entity)?;
        if let Some(elements) = record
            .buffers
            .iter()
            .find(|elements| elements.len() > self.max_buffer_elements)
        {
            return Err(CodecError::InvalidBufferSize {
                requested: elements.len(),
                limit: self.max_buffer_elements,
            });
        }
        for section in sections {
            let bits = self
                .plan
                .buffers()
                .get(section.index)
                .map_or(0, |buffer| buffer.element.total_bits());
            if let Some(mask) = section.element_masks.iter().find(|mask| mask.bits() != bits) {
                return Err(CodecError::InvalidMask {
                    reason: MaskReason::BitCountMismatch {
                        expected: bits,
                        found: mask.bits(),
                    },
                });
            }
            let expected = record.buffers.get(section.index).map_or(0, Vec::len);
            if section.element_count() != expected {
                return Err(CodecError::InvalidMask {
                    reason: MaskReason::ElementCount {
                        index: section.index,
                        expected,
                        found: section.element_count(),
                    },
                });
            }
        }

        for (index, buffer) in self.plan.buffers().iter().enumerate() {
            let mut region = self.buffers.write(tick, entity, index)?;
            region.store_all(&buffer.element, &record.buffers[index])?;
            let section = sections.iter().find(|section| section.index == index);
            let cleared = ChangeMask::new(buffer.element.total_bits());
            for element in 0..region.len() {
                let mask = section
                    .and_then(|section| section.element_masks.get(element))
                    .unwrap_or(&cleared);
                region.set_element_mask(element, mask)?;
            }
        }
        ring.write().set(tick, record.fields.clone());
        Ok(())
    }

    /// Loads the state of `entity` at exactly `tick`, if it is still held.
    pub fn load(&self, entity: EntityId, tick: SnapshotTick) -> CodecResult<Option<Record>> {
        let ring = self.entity_ring(entity)?;
        let Some(fields) = ring.read().get_exact(tick).cloned() else {
            return Ok(None);
        };
        let buffers = self
            .plan
            .buffers()
            .iter()
            .enumerate()
            .map(|(index, buffer)| self.buffers.read(tick, entity, index)?.load_all(&buffer.element))
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Some(Record { fields, buffers }))
    }

    /// Latest tick stored for `entity`.
    pub fn latest_tick(&self, entity: EntityId) -> CodecResult<Option<SnapshotTick>> {
        Ok(self.entity_ring(entity)?.read().latest().map(|(tick, _)| tick))
    }

    fn entity_ring(&self, entity: EntityId) -> CodecResult<&RwLock<TickRing<Vec<FieldValue>>>> {
        self.fields
            .get(entity.raw() as usize)
            .ok_or(CodecError::EntityOutOfRange {
                entity: entity.raw(),
                entities: self.fields.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::CodecScratch;
    use crate::writer::write_snapshot;
    use schema::{FieldDescriptor, RecordDescriptor, TypeRegistry};

    fn plan() -> RecordPlan {
        let desc = RecordDescriptor::new("Ghost")
            .field(FieldDescriptor::primitive("hp", "u8"))
            .field(FieldDescriptor::buffer(
                "items",
                RecordDescriptor::new("Item")
                    .field(FieldDescriptor::primitive("id", "u16"))
                    .field(FieldDescriptor::primitive("weight", "f32").quantized(10)),
            ));
        RecordPlan::build(&desc, &TypeRegistry::with_defaults()).unwrap()
    }

    fn item(id: u64, weight: f32) -> Record {
        Record {
            fields: vec![FieldValue::UInt(id), FieldValue::Float(weight)],
            buffers: Vec::new(),
        }
    }

    fn ghost(hp: u64, items: Vec<Record>) -> Record {
        Record {
            fields: vec![FieldValue::UInt(hp)],
            buffers: vec![items],
        }
    }

    fn history() -> SnapshotHistory {
        SnapshotHistory::new(plan(), NonZeroUsize::new(4).unwrap(), 3, 8)
    }

    #[test]
    fn store_and_load_roundtrip() {
        let history = history();
        let record = ghost(90, vec![item(1, 0.5), item(2, 1.5)]);
        history
            .store(EntityId::new(2), SnapshotTick::new(10), &record)
            .unwrap();
        assert_eq!(
            history.load(EntityId::new(2), SnapshotTick::new(10)).unwrap(),
            Some(record)
        );
        assert_eq!(history.load(EntityId::new(2), SnapshotTick::new(11)).unwrap(), None);
        assert_eq!(history.load(EntityId::new(1), SnapshotTick::new(10)).unwrap(), None);
    }

    #[test]
    fn slot_reuse_replaces_old_tick() {
        let history = history();
        let entity = EntityId::new(0);
        history
            .store(entity, SnapshotTick::new(1), &ghost(1, vec![item(1, 1.0)]))
            .unwrap();
        history
            .store(entity, SnapshotTick::new(5), &ghost(5, Vec::new()))
            .unwrap();
        assert_eq!(history.load(entity, SnapshotTick::new(1)).unwrap(), None);
        assert_eq!(
            history.load(entity, SnapshotTick::new(5)).unwrap(),
            Some(ghost(5, Vec::new()))
        );
        assert_eq!(history.latest_tick(entity).unwrap(), Some(SnapshotTick::new(5)));
    }

    #[test]
    fn oversized_buffer_leaves_history_unchanged() {
        let history = history();
        let entity = EntityId::new(0);
        let big = ghost(1, (0..9).map(|i| item(i, 0.0)).collect());
        assert!(matches!(
            history.store(entity, SnapshotTick::new(1), &big),
            Err(CodecError::InvalidBufferSize { requested: 9, limit: 8 })
        ));
        assert_eq!(history.load(entity, SnapshotTick::new(1)).unwrap(), None);
    }

    #[test]
    fn snapshot_element_masks_are_kept() {
        let plan = plan();
        let history = history();
        let entity = EntityId::new(1);
        let base = ghost(90, vec![item(1, 0.5), item(2, 1.5)]);
        let current = ghost(90, vec![item(1, 0.5), item(2, 2.5), item(3, 0.0)]);
        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(6),
            &current,
            Some((SnapshotTick::new(5), &base)),
            &mut CodecScratch::new(),
        )
        .unwrap();

        history.store_snapshot(entity, &snapshot, &current).unwrap();
        let masks = history
            .element_masks(entity, SnapshotTick::new(6), 0)
            .unwrap()
            .unwrap();
        assert_eq!(masks, snapshot.buffers[0].element_masks);
        assert!(masks[0].is_empty());
        assert_eq!(masks[1].iter_set().collect::<Vec<_>>(), vec![1]);

        // A plain store into the same slot clears them.
        history
            .store(entity, SnapshotTick::new(10), &current)
            .unwrap();
        let masks = history
            .element_masks(entity, SnapshotTick::new(10), 0)
            .unwrap()
            .unwrap();
        assert!(masks.iter().all(ChangeMask::is_empty));
        assert_eq!(history.element_masks(entity, SnapshotTick::new(6), 0).unwrap(), None);
    }

    #[test]
    fn snapshot_mask_count_must_match_elements() {
        let plan = plan();
        let history = history();
        let entity = EntityId::new(0);
        let record = ghost(1, vec![item(1, 0.5)]);
        let snapshot = write_snapshot(
            &plan,
            SnapshotTick::new(2),
            &record,
            None,
            &mut CodecScratch::new(),
        )
        .unwrap();
        let other = ghost(1, vec![item(1, 0.5), item(2, 0.5)]);
        assert!(matches!(
            history.store_snapshot(entity, &snapshot, &other),
            Err(CodecError::InvalidMask {
                reason: MaskReason::ElementCount { index: 0, expected: 2, found: 1 }
            })
        ));
        assert_eq!(history.load(entity, SnapshotTick::new(2)).unwrap(), None);
    }

    #[test]
    fn unknown_entity_is_rejected() {
        let history = history();
        assert!(matches!(
            history.load(EntityId::new(3), SnapshotTick::new(0)),
            Err(CodecError::EntityOutOfRange { entity: 3, entities: 3 })
        ));
    }

    #[test]
    fn entities_store_concurrently() {
        let history = history();
        std::thread::scope(|scope| {
            for entity in 0..3u32 {
                let history = &history;
                scope.spawn(move || {
                    for tick in 0..8u32 {
                        let items = (0..=u64::from(tick)).map(|i| item(i, 0.0)).collect();
                        history
                            .store(
                                EntityId::new(entity),
                                SnapshotTick::new(tick),
                                &ghost(u64::from(entity), items),
                            )
                            .unwrap();
                    }
                });
            }
        });
        for entity in 0..3u32 {
            let record = history
                .load(EntityId::new(entity), SnapshotTick::new(7))
                .unwrap()
                .unwrap();
            assert_eq!(record.fields, vec![FieldValue::UInt(u64::from(entity))]);
            assert_eq!(record.buffers[0].len(), 8);
        }
    }
}
