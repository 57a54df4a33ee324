use crate::{
    barrier::StartBarrier,
    config::HarnessConfig,
    error::{StoreError, WorkerError},
    store::{RecordRef, Store},
};
use log::{debug, error, info};
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Writer,
    Reader,
}

impl Role {
    /// The first `writers` worker ids write, the rest read.
    pub fn for_worker(id: usize, writers: usize) -> Self {
        if id < writers {
            Role::Writer
        } else {
            Role::Reader
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Writer => "writer",
            Role::Reader => "reader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Writer => write!(f, "Writer"),
            Role::Reader => write!(f, "Reader"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CursorState {
    Fresh,
    At(RecordRef),
    Exhausted,
}

/// A forward only position in the record sequence of a store, private to one worker.
///
/// The position survives across transactions, so successive transactions of the same
/// worker visit successive records.
#[derive(Debug, Clone)]
pub struct Cursor {
    state: CursorState,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            state: CursorState::Fresh,
        }
    }

    /// Fetch the first record on the first call and the following record afterwards.
    pub fn advance<S>(&mut self, store: &S) -> Option<RecordRef>
    where
        S: Store + ?Sized,
    {
        let next = match self.state {
            CursorState::Fresh => store.first_record(),
            CursorState::At(record) => store.next_record(record),
            CursorState::Exhausted => None,
        };

        self.state = match next {
            Some(record) => CursorState::At(record),
            None => CursorState::Exhausted,
        };

        next
    }

    fn fetch_op(&self) -> &'static str {
        match self.state {
            CursorState::Fresh => "first_record",
            _ => "next_record",
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// An open store transaction. `commit` closes it and reports the store's verdict;
/// dropping it without a commit closes it and ignores the verdict.
struct Transaction<'a, S>
where
    S: Store + ?Sized,
{
    store: &'a S,
    access: Access,
    open: bool,
}

impl<'a, S> Transaction<'a, S>
where
    S: Store + ?Sized,
{
    fn begin(store: &'a S, access: Access) -> Result<Self, WorkerError> {
        let (op, result) = match access {
            Access::Read => ("begin_read", store.begin_read()),
            Access::Write => ("begin_write", store.begin_write()),
        };

        result.map_err(|source| WorkerError::Transaction { op, source })?;

        Ok(Self {
            store,
            access,
            open: true,
        })
    }

    fn end(&self) -> Result<(), StoreError> {
        match self.access {
            Access::Read => self.store.end_read(),
            Access::Write => self.store.end_write(),
        }
    }

    fn commit(mut self) -> Result<(), WorkerError> {
        self.open = false;

        let op = match self.access {
            Access::Read => "end_read",
            Access::Write => "end_write",
        };

        self.end()
            .map_err(|source| WorkerError::Transaction { op, source })
    }
}

impl<'a, S> Drop for Transaction<'a, S>
where
    S: Store + ?Sized,
{
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.end() {
                debug!("closing abandoned transaction failed: {}", err);
            }
        }
    }
}

/// What a worker reports back when it is joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub id: usize,
    pub role: Role,
    /// Transactions committed before the loop ended.
    pub iterations: usize,
    /// Why the loop ended early, if it did.
    pub error: Option<WorkerError>,
}

impl WorkerOutcome {
    pub fn new(id: usize, role: Role) -> Self {
        Self {
            id,
            role,
            iterations: 0,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One load generating thread: waits at the start barrier, then runs a bounded loop of
/// single record transactions against the shared store.
pub struct Worker<S>
where
    S: Store + ?Sized,
{
    id: usize,
    role: Role,
    store: Arc<S>,
    barrier: Arc<StartBarrier>,
    iterations: usize,
    record_size: usize,
    chatty: bool,
}

impl<S> Worker<S>
where
    S: Store + ?Sized,
{
    pub fn new(
        id: usize,
        role: Role,
        store: Arc<S>,
        barrier: Arc<StartBarrier>,
        config: &HarnessConfig,
    ) -> Self {
        Self {
            id,
            role,
            store,
            barrier,
            iterations: config.iterations,
            record_size: config.record_size,
            chatty: config.chatty,
        }
    }

    pub fn run(self) -> WorkerOutcome {
        self.announce("started");
        self.barrier.arrive();

        let mut outcome = WorkerOutcome::new(self.id, self.role);
        let result = match self.role {
            Role::Writer => self.write_loop(&mut outcome.iterations),
            Role::Reader => self.read_loop(&mut outcome.iterations),
        };

        match result {
            Ok(()) => self.announce("ended"),
            Err(err) => {
                error!("{} thread {}: {}.", self.role, self.id, err);
                outcome.error = Some(err);
            }
        }

        outcome
    }

    fn announce(&self, event: &str) {
        if self.chatty {
            info!("{} thread {} {}.", self.role, self.id, event);
        } else {
            debug!("{} thread {} {}.", self.role, self.id, event);
        }
    }

    /// Overwrite every field of successive records with one counter running
    /// down from -1 over the whole loop.
    fn write_loop(&self, completed: &mut usize) -> Result<(), WorkerError> {
        let store = &*self.store;
        let mut cursor = Cursor::new();
        let mut value: i64 = -1;

        for _ in 0..self.iterations {
            let txn = Transaction::begin(store, Access::Write)?;

            let op = cursor.fetch_op();
            let record = cursor.advance(store).ok_or(WorkerError::NoRecord(op))?;

            for index in 0..self.record_size {
                store
                    .set_int_field(record, index, value)
                    .map_err(|source| WorkerError::FieldWrite { index, source })?;
                value -= 1;
            }

            txn.commit()?;
            *completed += 1;
        }

        Ok(())
    }

    /// Read the value and type of every field of successive records. The values
    /// are discarded, only the read path is exercised.
    fn read_loop(&self, completed: &mut usize) -> Result<(), WorkerError> {
        let store = &*self.store;
        let mut cursor = Cursor::new();

        for _ in 0..self.iterations {
            let txn = Transaction::begin(store, Access::Read)?;

            let op = cursor.fetch_op();
            let record = cursor.advance(store).ok_or(WorkerError::NoRecord(op))?;
            let len = store
                .record_len(record)
                .map_err(WorkerError::InvalidLength)?;

            for index in 0..len {
                let _ = store.field(record, index);
                let _ = store.field_type(record, index);
            }

            txn.commit()?;
            *completed += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Cursor, Role, Worker};
    use crate::{
        barrier::{StartBarrier, WaitStrategy},
        config::HarnessConfig,
        error::{StoreError, WorkerError},
        store::{FieldType, FieldValue, MemStore, RecordRef, Store},
    };
    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Wraps a store, records every field write and can be told to fail.
    pub(crate) struct Recording<S> {
        pub inner: S,
        pub writes: Mutex<Vec<(RecordRef, usize, i64)>>,
        pub begins: AtomicUsize,
        pub ends: AtomicUsize,
        pub fail_set_after: Option<usize>,
        pub fail_end_write: bool,
        pub fail_end_read: bool,
        /// Refuse the transaction that would be the n-th to begin, counting from zero.
        pub fail_begin: Option<usize>,
        /// Raw index of the record whose length cannot be read.
        pub fail_record_len_at: Option<usize>,
    }

    impl<S> Recording<S> {
        pub(crate) fn new(inner: S) -> Self {
            Self {
                inner,
                writes: Mutex::new(Vec::new()),
                begins: AtomicUsize::new(0),
                ends: AtomicUsize::new(0),
                fail_set_after: None,
                fail_end_write: false,
                fail_end_read: false,
                fail_begin: None,
                fail_record_len_at: None,
            }
        }

        fn count_begin(&self) -> Result<(), StoreError> {
            if self.fail_begin == Some(self.begins.load(Ordering::SeqCst)) {
                return Err(StoreError::Deleted);
            }

            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl<S: Store> Store for Recording<S> {
        fn create_record(&self, fields: usize) -> Result<RecordRef, StoreError> {
            self.inner.create_record(fields)
        }

        fn begin_write(&self) -> Result<(), StoreError> {
            self.count_begin()?;
            self.inner.begin_write()
        }

        fn end_write(&self) -> Result<(), StoreError> {
            self.ends.fetch_add(1, Ordering::SeqCst);
            self.inner.end_write()?;

            if self.fail_end_write {
                Err(StoreError::NotLocked)
            } else {
                Ok(())
            }
        }

        fn begin_read(&self) -> Result<(), StoreError> {
            self.count_begin()?;
            self.inner.begin_read()
        }

        fn end_read(&self) -> Result<(), StoreError> {
            self.ends.fetch_add(1, Ordering::SeqCst);
            self.inner.end_read()?;

            if self.fail_end_read {
                Err(StoreError::NotLocked)
            } else {
                Ok(())
            }
        }

        fn first_record(&self) -> Option<RecordRef> {
            self.inner.first_record()
        }

        fn next_record(&self, record: RecordRef) -> Option<RecordRef> {
            self.inner.next_record(record)
        }

        fn set_int_field(
            &self,
            record: RecordRef,
            index: usize,
            value: i64,
        ) -> Result<(), StoreError> {
            let mut writes = self.writes.lock();

            if self.fail_set_after == Some(writes.len()) {
                return Err(StoreError::FieldOutOfRange { index, len: 0 });
            }

            writes.push((record, index, value));
            self.inner.set_int_field(record, index, value)
        }

        fn field(&self, record: RecordRef, index: usize) -> Result<FieldValue, StoreError> {
            self.inner.field(record, index)
        }

        fn field_type(&self, record: RecordRef, index: usize) -> Result<FieldType, StoreError> {
            self.inner.field_type(record, index)
        }

        fn record_len(&self, record: RecordRef) -> Result<usize, StoreError> {
            if self.fail_record_len_at == Some(record.into_raw()) {
                return Err(StoreError::NoSuchRecord(record.into_raw()));
            }

            self.inner.record_len(record)
        }
    }

    fn populated(name: &str, records: usize, fields: usize) -> MemStore {
        let store = MemStore::new(name, 1 << 20).unwrap();

        for _ in 0..records {
            store.create_record(fields).unwrap();
        }

        store
    }

    fn config(iterations: usize) -> HarnessConfig {
        HarnessConfig {
            iterations,
            record_size: 3,
            chatty: false,
            ..HarnessConfig::default()
        }
    }

    fn released_barrier() -> Arc<StartBarrier> {
        let barrier = Arc::new(StartBarrier::new(1, WaitStrategy::Blocking));
        barrier.release_all();
        barrier
    }

    #[test]
    fn cursor_walks_forward() {
        let store = populated("worker-cursor", 3, 1);
        let mut cursor = Cursor::new();

        for raw in 0..3 {
            assert_eq!(cursor.advance(&store), Some(RecordRef::new(raw)));
        }

        assert_eq!(cursor.advance(&store), None);
        assert_eq!(cursor.advance(&store), None);
    }

    #[test]
    fn writer_counts_down_across_records() {
        let store = Arc::new(Recording::new(populated("worker-countdown", 10, 3)));
        let worker = Worker::new(
            0,
            Role::Writer,
            Arc::clone(&store),
            released_barrier(),
            &config(4),
        );

        let outcome = worker.run();
        assert!(outcome.is_ok());
        assert_eq!(outcome.iterations, 4);

        let writes = store.writes.lock();
        let values: Vec<i64> = writes.iter().map(|&(_, _, value)| value).collect();
        let expected: Vec<i64> = (1..=12).map(|n| -n).collect();
        assert_eq!(values, expected);

        assert_eq!(writes[0].0, RecordRef::new(0));
        assert_eq!(writes[11], (RecordRef::new(3), 2, -12));
        assert_eq!(
            store.inner.field(RecordRef::new(1), 0),
            Ok(FieldValue::Int(-4))
        );
        assert_eq!(
            store.inner.field(RecordRef::new(4), 0),
            Ok(FieldValue::Null)
        );
    }

    #[test]
    fn writer_stops_when_records_run_out() {
        let store = Arc::new(Recording::new(populated("worker-run-out", 2, 3)));
        let worker = Worker::new(
            1,
            Role::Writer,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.error, Some(WorkerError::NoRecord("next_record")));
        assert_eq!(store.begins.load(Ordering::SeqCst), 3);
        assert_eq!(store.ends.load(Ordering::SeqCst), 3);
        store.inner.begin_write().unwrap();
        store.inner.end_write().unwrap();
    }

    #[test]
    fn writer_stops_on_field_error() {
        let mut recording = Recording::new(populated("worker-field-error", 5, 3));
        recording.fail_set_after = Some(4);
        let store = Arc::new(recording);
        let worker = Worker::new(
            2,
            Role::Writer,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 1);
        assert!(matches!(
            outcome.error,
            Some(WorkerError::FieldWrite { index: 1, .. })
        ));
        assert_eq!(store.ends.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn writer_stops_on_failed_commit() {
        let mut recording = Recording::new(populated("worker-commit-error", 5, 3));
        recording.fail_end_write = true;
        let store = Arc::new(recording);
        let worker = Worker::new(
            3,
            Role::Writer,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 0);
        assert!(matches!(
            outcome.error,
            Some(WorkerError::Transaction { op: "end_write", .. })
        ));
        assert_eq!(store.writes.lock().len(), 3);
    }

    #[test]
    fn reader_never_writes() {
        let store = Arc::new(Recording::new(populated("worker-reader", 6, 4)));
        let worker = Worker::new(
            4,
            Role::Reader,
            Arc::clone(&store),
            released_barrier(),
            &config(6),
        );

        let outcome = worker.run();
        assert!(outcome.is_ok());
        assert_eq!(outcome.iterations, 6);
        assert!(store.writes.lock().is_empty());
        assert_eq!(store.begins.load(Ordering::SeqCst), 6);
        assert_eq!(store.ends.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn writer_stops_on_failed_begin() {
        let mut recording = Recording::new(populated("worker-begin-write-error", 5, 3));
        recording.fail_begin = Some(0);
        let store = Arc::new(recording);
        let worker = Worker::new(
            6,
            Role::Writer,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 0);
        assert_eq!(
            outcome.error,
            Some(WorkerError::Transaction {
                op: "begin_write",
                source: StoreError::Deleted,
            })
        );
        assert!(store.writes.lock().is_empty());
        assert_eq!(store.ends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reader_stops_on_bad_record_len() {
        let mut recording = Recording::new(populated("worker-record-len", 5, 3));
        recording.fail_record_len_at = Some(2);
        let store = Arc::new(recording);
        let worker = Worker::new(
            7,
            Role::Reader,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(
            outcome.error,
            Some(WorkerError::InvalidLength(StoreError::NoSuchRecord(2)))
        );
        assert_eq!(store.begins.load(Ordering::SeqCst), 3);
        assert_eq!(store.ends.load(Ordering::SeqCst), 3);
        store.inner.begin_write().unwrap();
        store.inner.end_write().unwrap();
    }

    #[test]
    fn reader_stops_on_failed_begin() {
        let mut recording = Recording::new(populated("worker-begin-read-error", 5, 3));
        recording.fail_begin = Some(2);
        let store = Arc::new(recording);
        let worker = Worker::new(
            8,
            Role::Reader,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(
            outcome.error,
            Some(WorkerError::Transaction {
                op: "begin_read",
                source: StoreError::Deleted,
            })
        );
        assert_eq!(store.begins.load(Ordering::SeqCst), 2);
        assert_eq!(store.ends.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reader_stops_on_failed_commit() {
        let mut recording = Recording::new(populated("worker-end-read-error", 5, 3));
        recording.fail_end_read = true;
        let store = Arc::new(recording);
        let worker = Worker::new(
            9,
            Role::Reader,
            Arc::clone(&store),
            released_barrier(),
            &config(5),
        );

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 0);
        assert_eq!(
            outcome.error,
            Some(WorkerError::Transaction {
                op: "end_read",
                source: StoreError::NotLocked,
            })
        );
        assert_eq!(store.begins.load(Ordering::SeqCst), 1);
        assert_eq!(store.ends.load(Ordering::SeqCst), 1);
        store.inner.begin_write().unwrap();
        store.inner.end_write().unwrap();
    }

    #[test]
    fn reader_on_empty_store() {
        let store = Arc::new(MemStore::new("worker-empty", 4096).unwrap());
        let worker = Worker::new(5, Role::Reader, store, released_barrier(), &config(3));

        let outcome = worker.run();
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.error, Some(WorkerError::NoRecord("first_record")));
    }

    #[test]
    fn role_split() {
        assert_eq!(Role::for_worker(0, 2), Role::Writer);
        assert_eq!(Role::for_worker(1, 2), Role::Writer);
        assert_eq!(Role::for_worker(2, 2), Role::Reader);
        assert_eq!(Role::for_worker(0, 0), Role::Reader);
    }
}
