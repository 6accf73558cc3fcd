//! In-memory record values laid out in plan order.

use schema::RecordPlan;

use crate::error::{CodecError, CodecResult};
use crate::field::{default_value, validate, FieldValue};

/// Values of one record: one entry per plan leaf and one element list per
/// plan buffer, both in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub fields: Vec<FieldValue>,
    pub buffers: Vec<Vec<Record>>,
}

impl Record {
    /// Returns the default state: zero fields and empty buffers.
    #[must_use]
    pub fn zeroed(plan: &RecordPlan) -> Self {
        Self {
            fields: plan
                .leaves()
                .iter()
                .map(|leaf| default_value(leaf.codec))
                .collect(),
            buffers: vec![Vec::new(); plan.buffers().len()],
        }
    }

    /// Checks shape, value types and ranges against `plan`.
    pub fn validate(&self, plan: &RecordPlan) -> CodecResult<()> {
        self.check_shape(plan)?;
        for (leaf, value) in plan.leaves().iter().zip(&self.fields) {
            validate(leaf, *value)?;
        }
        for (buffer, elements) in plan.buffers().iter().zip(&self.buffers) {
            for element in elements {
                element.validate(&buffer.element)?;
            }
        }
        Ok(())
    }

    pub(crate) fn check_shape(&self, plan: &RecordPlan) -> CodecResult<()> {
        if self.fields.len() != plan.leaves().len() || self.buffers.len() != plan.buffers().len()
        {
            return Err(CodecError::ShapeMismatch {
                record: plan.name().to_owned(),
                expected_fields: plan.leaves().len(),
                found_fields: self.fields.len(),
                expected_buffers: plan.buffers().len(),
                found_buffers: self.buffers.len(),
            });
        }
        Ok(())
    }

    /// Value of the leaf at `path`.
    #[must_use]
    pub fn get(&self, plan: &RecordPlan, path: &str) -> Option<FieldValue> {
        plan.leaf_index(path)
            .and_then(|index| self.fields.get(index).copied())
    }

    /// Sets the leaf at `path`. Returns `false` if no such leaf exists.
    pub fn set(&mut self, plan: &RecordPlan, path: &str, value: FieldValue) -> bool {
        match plan.leaf_index(path).and_then(|i| self.fields.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Elements of the buffer at `path`.
    #[must_use]
    pub fn buffer(&self, plan: &RecordPlan, path: &str) -> Option<&[Record]> {
        plan.buffer_index(path)
            .and_then(|index| self.buffers.get(index))
            .map(Vec::as_slice)
    }

    /// Mutable elements of the buffer at `path`.
    pub fn buffer_mut(&mut self, plan: &RecordPlan, path: &str) -> Option<&mut Vec<Record>> {
        plan.buffer_index(path)
            .and_then(move |index| self.buffers.get_mut(index))
    }
}
