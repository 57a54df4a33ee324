//! The transactional record store the harness drives load against.
//!
//! The harness never looks inside a store. It only talks to it through the [`Store`] trait,
//! which is the whole collaborator surface: record allocation, read and write transactions,
//! forward record traversal and field access. [`MemStore`] is the in-process implementation
//! the binary runs against.

mod memory;
mod txlock;

pub use memory::{MemStore, MIN_STORE_BYTES, WORD_BYTES};
pub use txlock::TxLock;

use crate::error::StoreError;
use std::{fmt, sync::Arc};

/// An opaque reference to a record inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef(usize);

impl RecordRef {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn into_raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Null,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Int(i64),
}

impl FieldValue {
    pub fn field_type(self) -> FieldType {
        match self {
            FieldValue::Null => FieldType::Null,
            FieldValue::Int(_) => FieldType::Int,
        }
    }
}

/// The operations a store exposes to the harness.
///
/// Transactions are opened and closed by separate calls. A cursor fetch and the field
/// accesses that follow it are expected to happen between one `begin_*` and the matching
/// `end_*`; isolation between concurrent transactions is the store's responsibility.
pub trait Store: Send + Sync {
    fn create_record(&self, fields: usize) -> Result<RecordRef, StoreError>;

    fn begin_write(&self) -> Result<(), StoreError>;
    fn end_write(&self) -> Result<(), StoreError>;
    fn begin_read(&self) -> Result<(), StoreError>;
    fn end_read(&self) -> Result<(), StoreError>;

    fn first_record(&self) -> Option<RecordRef>;
    fn next_record(&self, record: RecordRef) -> Option<RecordRef>;

    fn set_int_field(&self, record: RecordRef, index: usize, value: i64)
        -> Result<(), StoreError>;
    fn field(&self, record: RecordRef, index: usize) -> Result<FieldValue, StoreError>;
    fn field_type(&self, record: RecordRef, index: usize) -> Result<FieldType, StoreError>;

    /// The declared field count of a record. An error here is what a negative
    /// length would signal in a C style store API.
    fn record_len(&self, record: RecordRef) -> Result<usize, StoreError>;
}

impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    fn create_record(&self, fields: usize) -> Result<RecordRef, StoreError> {
        (**self).create_record(fields)
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        (**self).begin_write()
    }

    fn end_write(&self) -> Result<(), StoreError> {
        (**self).end_write()
    }

    fn begin_read(&self) -> Result<(), StoreError> {
        (**self).begin_read()
    }

    fn end_read(&self) -> Result<(), StoreError> {
        (**self).end_read()
    }

    fn first_record(&self) -> Option<RecordRef> {
        (**self).first_record()
    }

    fn next_record(&self, record: RecordRef) -> Option<RecordRef> {
        (**self).next_record(record)
    }

    fn set_int_field(
        &self,
        record: RecordRef,
        index: usize,
        value: i64,
    ) -> Result<(), StoreError> {
        (**self).set_int_field(record, index, value)
    }

    fn field(&self, record: RecordRef, index: usize) -> Result<FieldValue, StoreError> {
        (**self).field(record, index)
    }

    fn field_type(&self, record: RecordRef, index: usize) -> Result<FieldType, StoreError> {
        (**self).field_type(record, index)
    }

    fn record_len(&self, record: RecordRef) -> Result<usize, StoreError> {
        (**self).record_len(record)
    }
}
