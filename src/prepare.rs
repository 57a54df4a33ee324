use crate::{error::SetupError, store::Store};
use log::info;

/// Fill the store with `count` records of `fields_per_record` fields each.
///
/// Runs on the calling thread before any worker exists. The first failed allocation
/// aborts the whole preparation; records created before it stay in the store.
pub fn prepare<S>(store: &S, count: usize, fields_per_record: usize) -> Result<(), SetupError>
where
    S: Store + ?Sized,
{
    for index in 0..count {
        store
            .create_record(fields_per_record)
            .map_err(|source| SetupError::Prepare { index, source })?;
    }

    info!(
        "prepared {} records of {} fields",
        count, fields_per_record
    );

    Ok(())
}
