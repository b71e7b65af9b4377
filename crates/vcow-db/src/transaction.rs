//! Transactions: pure functions from one root map to the next.

use std::time::Duration;

use vcow_immutable::{DurableResult, Timestamp, VersionedMap};

/// Builds a new root from the current one.
///
/// A transaction must not have side effects outside the returned map: it
/// may be retried, and its result is discarded if the write fails.
pub trait Transaction {
    /// Produce the new root. Every slot it creates or deletes should use
    /// `timestamp`, which is also the timestamp of the committed block.
    fn transform(
        &self,
        root: &VersionedMap,
        timestamp: Timestamp,
        payload: &VersionedMap,
    ) -> DurableResult<VersionedMap>;

    /// Time after which the transaction is reported as slow.
    fn max_duration(&self) -> Option<Duration> {
        None
    }

    /// Name used in log messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Transaction for F
where
    F: Fn(&VersionedMap, Timestamp, &VersionedMap) -> DurableResult<VersionedMap>,
{
    fn transform(
        &self,
        root: &VersionedMap,
        timestamp: Timestamp,
        payload: &VersionedMap,
    ) -> DurableResult<VersionedMap> {
        self(root, timestamp, payload)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Copies every key visible in the payload into the root, replacing what
/// the root held for that key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merge;

impl Transaction for Merge {
    fn transform(
        &self,
        root: &VersionedMap,
        timestamp: Timestamp,
        payload: &VersionedMap,
    ) -> DurableResult<VersionedMap> {
        let mut next = root.clone();
        for (key, values) in payload.iter(timestamp) {
            next = next.clear_list(key, timestamp);
            for value in values {
                next = next.add(key, value.clone(), timestamp)?;
            }
        }
        Ok(next)
    }

    fn name(&self) -> &str {
        "merge"
    }
}
