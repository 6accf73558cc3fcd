//! Variable-length buffer storage.
//!
//! A [`BufferRegion`] holds the elements of one buffer field for one entity
//! at one tick. Its bytes are laid out as
//!
//! ```text
//! [element masks: capacity * mask_words u32, LE][element slots: capacity * stride]
//! ```
//!
//! where every element stores one little-endian `u64` slot per leaf (see
//! [`to_slot`]). Both areas start 4-byte aligned.
//!
//! [`DynamicBufferRing`] preallocates one region per
//! `(tick slot, entity, buffer field)` and guards each with its own lock, so
//! resizing one region never blocks readers of another.

use std::num::NonZeroUsize;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use schema::RecordPlan;
use wire::align4;

use crate::error::{CodecError, CodecResult, MaskReason};
use crate::field::{from_slot, to_slot};
use crate::mask::ChangeMask;
use crate::record::Record;
use crate::types::{EntityId, SnapshotTick};

const SLOT_BYTES: usize = 8;

/// Bytes needed for `count` elements with the given mask words and stride.
#[must_use]
pub const fn required_size(mask_words: usize, stride: usize, count: usize) -> usize {
    align4(mask_words * 4 * count) + align4(stride * count)
}

/// Storage for the elements of one buffer field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRegion {
    data: Vec<u8>,
    len: usize,
    capacity: usize,
    stride: usize,
    mask_bits: usize,
    mask_words: usize,
    max_elements: usize,
}

impl BufferRegion {
    /// Creates an empty region for elements of `element_plan`.
    #[must_use]
    pub fn new(element_plan: &RecordPlan, max_elements: usize) -> Self {
        Self {
            data: Vec::new(),
            len: 0,
            capacity: 0,
            stride: element_plan.leaves().len() * SLOT_BYTES,
            mask_bits: element_plan.total_bits(),
            mask_words: element_plan.mask_words(),
            max_elements,
        }
    }

    /// Logical element count.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements that fit without reallocating.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes per element slot area.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub const fn mask_words_per_element(&self) -> usize {
        self.mask_words
    }

    /// Allocated bytes, always `required_size(mask_words, stride, capacity)`.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Sets the logical length.
    ///
    /// Growing zero-fills the new elements and their masks. Shrinking keeps
    /// the allocation.
    pub fn resize(&mut self, len: usize) -> CodecResult<()> {
        if len > self.max_elements {
            log::warn!(
                "rejected buffer resize to {len} elements (limit {})",
                self.max_elements
            );
            return Err(CodecError::InvalidBufferSize {
                requested: len,
                limit: self.max_elements,
            });
        }
        if len > self.capacity {
            self.reallocate(len);
        }
        if len > self.len {
            let masks = self.mask_offset(self.len)..self.mask_offset(len);
            self.data[masks].fill(0);
            let slots = self.slot_offset(self.len)..self.slot_offset(len);
            self.data[slots].fill(0);
        }
        self.len = len;
        Ok(())
    }

    /// Raw slot bytes of element `index`.
    pub fn element(&self, index: usize) -> CodecResult<&[u8]> {
        self.check_index(index)?;
        let start = self.slot_offset(index);
        Ok(&self.data[start..start + self.stride])
    }

    /// Overwrites the slot bytes of element `index`.
    pub fn set_element(&mut self, index: usize, bytes: &[u8]) -> CodecResult<()> {
        self.check_index(index)?;
        if bytes.len() != self.stride {
            return Err(CodecError::ElementSizeMismatch {
                expected: self.stride,
                found: bytes.len(),
            });
        }
        let start = self.slot_offset(index);
        self.data[start..start + self.stride].copy_from_slice(bytes);
        Ok(())
    }

    /// Change mask stored for element `index`.
    pub fn element_mask(&self, index: usize) -> CodecResult<ChangeMask> {
        self.check_index(index)?;
        let start = self.mask_offset(index);
        let words = self.data[start..start + self.mask_words * 4]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        ChangeMask::from_words(self.mask_bits, words)
    }

    pub fn set_element_mask(&mut self, index: usize, mask: &ChangeMask) -> CodecResult<()> {
        self.check_index(index)?;
        if mask.bits() != self.mask_bits {
            return Err(CodecError::InvalidMask {
                reason: MaskReason::BitCountMismatch {
                    expected: self.mask_bits,
                    found: mask.bits(),
                },
            });
        }
        let start = self.mask_offset(index);
        for (i, word) in mask.words().iter().enumerate() {
            let at = start + i * 4;
            self.data[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Writes `record` into element `index`.
    pub fn store_record(
        &mut self,
        element_plan: &RecordPlan,
        index: usize,
        record: &Record,
    ) -> CodecResult<()> {
        record.check_shape(element_plan)?;
        let mut bytes = Vec::with_capacity(self.stride);
        for (leaf, value) in element_plan.leaves().iter().zip(&record.fields) {
            bytes.extend_from_slice(&to_slot(leaf, *value)?.to_le_bytes());
        }
        self.set_element(index, &bytes)
    }

    /// Reads element `index` back as a record.
    pub fn load_record(&self, element_plan: &RecordPlan, index: usize) -> CodecResult<Record> {
        let bytes = self.element(index)?;
        let fields = element_plan
            .leaves()
            .iter()
            .zip(bytes.chunks_exact(SLOT_BYTES))
            .map(|(leaf, chunk)| {
                let mut slot = [0u8; SLOT_BYTES];
                slot.copy_from_slice(chunk);
                from_slot(leaf, u64::from_le_bytes(slot))
            })
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Record {
            fields,
            buffers: Vec::new(),
        })
    }

    /// Replaces the contents with `records`.
    pub fn store_all(&mut self, element_plan: &RecordPlan, records: &[Record]) -> CodecResult<()> {
        self.resize(records.len())?;
        for (index, record) in records.iter().enumerate() {
            self.store_record(element_plan, index, record)?;
        }
        Ok(())
    }

    pub fn load_all(&self, element_plan: &RecordPlan) -> CodecResult<Vec<Record>> {
        (0..self.len)
            .map(|index| self.load_record(element_plan, index))
            .collect()
    }

    fn check_index(&self, index: usize) -> CodecResult<()> {
        if index >= self.len {
            return Err(CodecError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    const fn mask_offset(&self, index: usize) -> usize {
        index * self.mask_words * 4
    }

    const fn slot_area(&self) -> usize {
        align4(self.mask_words * 4 * self.capacity)
    }

    const fn slot_offset(&self, index: usize) -> usize {
        self.slot_area() + index * self.stride
    }

    fn reallocate(&mut self, capacity: usize) {
        let mut data = vec![0; required_size(self.mask_words, self.stride, capacity)];
        let mask_bytes = self.mask_offset(self.len);
        data[..mask_bytes].copy_from_slice(&self.data[..mask_bytes]);

        let old_slots = self.slot_area();
        let slot_bytes = self.len * self.stride;
        let new_slots = align4(self.mask_words * 4 * capacity);
        data[new_slots..new_slots + slot_bytes]
            .copy_from_slice(&self.data[old_slots..old_slots + slot_bytes]);

        self.data = data;
        self.capacity = capacity;
    }
}

/// Buffer regions for every `(tick slot, entity, buffer field)` triple.
#[derive(Debug)]
pub struct DynamicBufferRing {
    regions: Vec<RwLock<BufferRegion>>,
    capacity_ticks: NonZeroUsize,
    entities: usize,
    buffers: usize,
}

impl DynamicBufferRing {
    /// Preallocates empty regions for each buffer field of `plan`.
    #[must_use]
    pub fn new(
        capacity_ticks: NonZeroUsize,
        entities: usize,
        plan: &RecordPlan,
        max_elements: usize,
    ) -> Self {
        let buffers = plan.buffers().len();
        let mut regions = Vec::with_capacity(capacity_ticks.get() * entities * buffers);
        for _ in 0..capacity_ticks.get() * entities {
            for buffer in plan.buffers() {
                regions.push(RwLock::new(BufferRegion::new(&buffer.element, max_elements)));
            }
        }
        Self {
            regions,
            capacity_ticks,
            entities,
            buffers,
        }
    }

    #[must_use]
    pub const fn capacity_ticks(&self) -> usize {
        self.capacity_ticks.get()
    }

    #[must_use]
    pub const fn entities(&self) -> usize {
        self.entities
    }

    /// Locks a region for reading.
    pub fn read(
        &self,
        tick: SnapshotTick,
        entity: EntityId,
        buffer: usize,
    ) -> CodecResult<RwLockReadGuard<'_, BufferRegion>> {
        Ok(self.regions[self.region_index(tick, entity, buffer)?].read())
    }

    /// Locks a region for writing.
    pub fn write(
        &self,
        tick: SnapshotTick,
        entity: EntityId,
        buffer: usize,
    ) -> CodecResult<RwLockWriteGuard<'_, BufferRegion>> {
        Ok(self.regions[self.region_index(tick, entity, buffer)?].write())
    }

    /// Resizes one region, locking only that region.
    pub fn resize(
        &self,
        tick: SnapshotTick,
        entity: EntityId,
        buffer: usize,
        len: usize,
    ) -> CodecResult<()> {
        self.write(tick, entity, buffer)?.resize(len)
    }

    /// Sum of allocated bytes across all regions.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.regions.iter().map(|r| r.read().size_bytes()).sum()
    }

    fn region_index(&self, tick: SnapshotTick, entity: EntityId, buffer: usize) -> CodecResult<usize> {
        let entity_index = entity.raw() as usize;
        if entity_index >= self.entities {
            return Err(CodecError::EntityOutOfRange {
                entity: entity.raw(),
                entities: self.entities,
            });
        }
        if buffer >= self.buffers {
            return Err(CodecError::IndexOutOfRange {
                index: buffer,
                len: self.buffers,
            });
        }
        let slot = tick.raw() as usize % self.capacity_ticks.get();
        Ok((slot * self.entities + entity_index) * self.buffers + buffer)
    }
}
