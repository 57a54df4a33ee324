use super::{FieldType, FieldValue, RecordRef, Store, TxLock};
use crate::error::StoreError;
use log::{debug, info};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering},
        Arc,
    },
};

/// Space is accounted in 4 byte words, the cell size of a 32-bit encoded record store.
pub const WORD_BYTES: usize = 4;
pub const MIN_STORE_BYTES: usize = 1024;

const RECORD_HEADER_WORDS: usize = 2;

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;

static REGISTRY: Lazy<Mutex<HashMap<String, Arc<MemStore>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn record_bytes(fields: usize) -> usize {
    (fields + RECORD_HEADER_WORDS) * WORD_BYTES
}

struct Field {
    tag: AtomicU8,
    value: AtomicI64,
}

impl Field {
    fn null() -> Self {
        Self {
            tag: AtomicU8::new(TAG_NULL),
            value: AtomicI64::new(0),
        }
    }

    fn load(&self) -> FieldValue {
        match self.tag.load(Ordering::Acquire) {
            TAG_INT => FieldValue::Int(self.value.load(Ordering::Relaxed)),
            _ => FieldValue::Null,
        }
    }

    fn store_int(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
        self.tag.store(TAG_INT, Ordering::Release);
    }
}

struct Heap {
    records: Vec<Box<[Field]>>,
    used: usize,
}

/// A named, fixed capacity record store living in the memory of this process.
///
/// Stores are shared through a process wide registry so that every handle attached under
/// the same identifier sees the same records, the way attaching to a shared memory segment
/// by name would behave.
pub struct MemStore {
    name: String,
    capacity: usize,
    lock: TxLock,
    deleted: AtomicBool,
    heap: RwLock<Heap>,
}

impl MemStore {
    /// Create an unregistered store. Most callers want [`MemStore::attach`].
    pub fn new(name: &str, capacity: usize) -> Result<Self, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyIdentifier);
        }

        if capacity < MIN_STORE_BYTES {
            return Err(StoreError::TooSmall {
                size: capacity,
                minimum: MIN_STORE_BYTES,
            });
        }

        Ok(Self {
            name: name.to_string(),
            capacity,
            lock: TxLock::new(),
            deleted: AtomicBool::new(false),
            heap: RwLock::new(Heap {
                records: Vec::new(),
                used: 0,
            }),
        })
    }

    /// Attach to the store registered under `name`, creating it with `capacity` bytes
    /// if it does not exist yet. The capacity of an existing store is left untouched.
    pub fn attach(name: &str, capacity: usize) -> Result<Arc<Self>, StoreError> {
        let mut registry = REGISTRY.lock();

        if let Some(store) = registry.get(name) {
            debug!("attached to existing store `{}`", name);
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(Self::new(name, capacity)?);
        registry.insert(name.to_string(), Arc::clone(&store));
        info!("created store `{}` with {} bytes", name, capacity);
        Ok(store)
    }

    /// Remove the store registered under `name`. Handles that are still alive keep the
    /// records readable in memory but every new transaction on them fails.
    /// Returns false if no such store was registered.
    pub fn delete(name: &str) -> bool {
        match REGISTRY.lock().remove(name) {
            Some(store) => {
                store.deleted.store(true, Ordering::Release);
                info!("deleted store `{}`", name);
                true
            }
            None => false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used_bytes(&self) -> usize {
        self.heap.read().used
    }

    pub fn len(&self) -> usize {
        self.heap.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    fn check_alive(&self) -> Result<(), StoreError> {
        if self.is_deleted() {
            Err(StoreError::Deleted)
        } else {
            Ok(())
        }
    }

    fn with_record<T, F>(&self, record: RecordRef, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&[Field]) -> Result<T, StoreError>,
    {
        let heap = self.heap.read();
        let fields = heap
            .records
            .get(record.into_raw())
            .ok_or_else(|| StoreError::NoSuchRecord(record.into_raw()))?;

        f(fields)
    }

    fn with_field<T, F>(&self, record: RecordRef, index: usize, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Field) -> T,
    {
        self.with_record(record, |fields| {
            fields
                .get(index)
                .map(f)
                .ok_or(StoreError::FieldOutOfRange {
                    index,
                    len: fields.len(),
                })
        })
    }
}

impl Store for MemStore {
    fn create_record(&self, fields: usize) -> Result<RecordRef, StoreError> {
        self.check_alive()?;
        let requested = record_bytes(fields);
        let mut heap = self.heap.write();
        let available = self.capacity - heap.used;

        if requested > available {
            return Err(StoreError::OutOfSpace {
                requested,
                available,
            });
        }

        let record = RecordRef::new(heap.records.len());
        heap.records.push((0..fields).map(|_| Field::null()).collect());
        heap.used += requested;
        Ok(record)
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        self.check_alive()?;
        self.lock.write_lock();
        Ok(())
    }

    fn end_write(&self) -> Result<(), StoreError> {
        self.lock.write_unlock()
    }

    fn begin_read(&self) -> Result<(), StoreError> {
        self.check_alive()?;
        self.lock.read_lock();
        Ok(())
    }

    fn end_read(&self) -> Result<(), StoreError> {
        self.lock.read_unlock()
    }

    fn first_record(&self) -> Option<RecordRef> {
        if self.heap.read().records.is_empty() {
            None
        } else {
            Some(RecordRef::new(0))
        }
    }

    fn next_record(&self, record: RecordRef) -> Option<RecordRef> {
        let next = record.into_raw() + 1;

        if next < self.heap.read().records.len() {
            Some(RecordRef::new(next))
        } else {
            None
        }
    }

    fn set_int_field(
        &self,
        record: RecordRef,
        index: usize,
        value: i64,
    ) -> Result<(), StoreError> {
        if !self.lock.is_write_locked() {
            return Err(StoreError::NotWriting("set_int_field"));
        }

        self.with_field(record, index, |field| field.store_int(value))
    }

    fn field(&self, record: RecordRef, index: usize) -> Result<FieldValue, StoreError> {
        self.with_field(record, index, Field::load)
    }

    fn field_type(&self, record: RecordRef, index: usize) -> Result<FieldType, StoreError> {
        self.with_field(record, index, |field| field.load().field_type())
    }

    fn record_len(&self, record: RecordRef) -> Result<usize, StoreError> {
        self.with_record(record, |fields| Ok(fields.len()))
    }
}
