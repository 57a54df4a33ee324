use thiserror::Error;

/// Failures reported by a [`Store`](crate::Store) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store identifier must not be empty")]
    EmptyIdentifier,
    #[error("store size of {size} bytes is below the minimum of {minimum} bytes")]
    TooSmall { size: usize, minimum: usize },
    #[error("out of space: {requested} bytes requested, {available} bytes available")]
    OutOfSpace { requested: usize, available: usize },
    #[error("record {0} does not exist")]
    NoSuchRecord(usize),
    #[error("field {index} is out of range for a record of length {len}")]
    FieldOutOfRange { index: usize, len: usize },
    #[error("{0} requires an open write transaction")]
    NotWriting(&'static str),
    #[error("no transaction of that kind is open")]
    NotLocked,
    #[error("store has been deleted")]
    Deleted,
}

/// The reason a worker stopped its loop early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("{op} failed: {source}")]
    Transaction {
        op: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{0} returned no record")]
    NoRecord(&'static str),
    #[error("int storage error on field {index}: {source}")]
    FieldWrite {
        index: usize,
        #[source]
        source: StoreError,
    },
    #[error("invalid record length: {0}")]
    InvalidLength(#[source] StoreError),
}

/// Errors that abort a run before any worker is started.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to create data record #{index}: {source}")]
    Prepare {
        index: usize,
        #[source]
        source: StoreError,
    },
    #[error("failed to allocate thread table for {0} workers")]
    ThreadTable(usize),
}

/// A worker thread that could not be joined cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("worker thread panicked: {0}")]
    Panicked(String),
}
