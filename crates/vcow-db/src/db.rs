//! The dual-slot database file.
//!
//! The file holds two fixed-size slots, at offset 0 and at offset
//! `max_root_block_size`. Every write goes to the slot that does not hold
//! the live root, and the live root only moves once that write is complete,
//! so a crash mid-write can damage at most the inactive slot.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use vcow_immutable::{Registry, Timestamp, Value, VersionedMap};

use crate::block::{self, BlockRejection, RootBlock};
use crate::clock::Clock;
use crate::transaction::Transaction;
use crate::{DbConfig, DbError, DbResult};

/// Lifecycle state of a [`Db`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbState {
    Closed,
    Open,
    /// The last open attempt failed.
    Error(String),
}

/// One of the two root block locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Offset 0.
    First,
    /// Offset `max_root_block_size`.
    Second,
}

impl Slot {
    #[must_use]
    pub const fn offset(self, max_root_block_size: usize) -> u64 {
        match self {
            Self::First => 0,
            Self::Second => max_root_block_size as u64,
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// Pick the slot to adopt from the decode results of both slots.
///
/// The newer valid block wins. On equal timestamps the first slot is
/// adopted, so the next write goes to the second.
pub fn choose_slot(
    first: Result<RootBlock, BlockRejection>,
    second: Result<RootBlock, BlockRejection>,
) -> Option<(Slot, RootBlock)> {
    match (first, second) {
        (Ok(a), Ok(b)) if b.timestamp > a.timestamp => Some((Slot::Second, b)),
        (Ok(a), _) => Some((Slot::First, a)),
        (Err(_), Ok(b)) => Some((Slot::Second, b)),
        (Err(_), Err(_)) => None,
    }
}

/// Size a fresh file to both slots and write `block` into each.
fn write_initial_slots(mut file: File, max: usize, block: &[u8], sync: bool) -> DbResult<File> {
    file.set_len(2 * max as u64)?;
    for slot in [Slot::First, Slot::Second] {
        file.seek(SeekFrom::Start(slot.offset(max)))?;
        file.write_all(block)?;
    }
    if sync {
        file.sync_all()?;
    }
    Ok(file)
}

/// Remove a file this process just created when initializing it failed.
fn discard_on_error<T>(path: &Path, result: DbResult<T>) -> DbResult<T> {
    if result.is_err() {
        let removed = fs::remove_file(path);
        if let Err(e) = removed {
            tracing::warn!("Failed to remove partial database {}: {e}", path.display());
        }
    }
    result
}

#[derive(Debug, Clone, Default)]
struct Committed {
    root: VersionedMap,
    timestamp: Timestamp,
}

/// Shared read access to the live root.
///
/// Readers clone the handle and load the root whenever they want; they see
/// either the previous or the new root, never a partially written one.
#[derive(Debug, Clone, Default)]
pub struct RootHandle {
    inner: Arc<RwLock<Committed>>,
}

impl RootHandle {
    /// The live root.
    #[must_use]
    pub fn load(&self) -> VersionedMap {
        self.inner.read().root.clone()
    }

    /// Timestamp of the block holding the live root.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.inner.read().timestamp
    }

    /// The live root together with its timestamp.
    #[must_use]
    pub fn snapshot(&self) -> (VersionedMap, Timestamp) {
        let committed = self.inner.read();
        (committed.root.clone(), committed.timestamp)
    }

    fn store(&self, root: VersionedMap, timestamp: Timestamp) {
        *self.inner.write() = Committed { root, timestamp };
    }
}

/// A versioned map persisted in a crash-safe dual-slot file.
///
/// Writes must be serialized by the caller (`&mut self`); readers use a
/// [`RootHandle`] from [`root_handle`](Self::root_handle) and need no
/// coordination with the writer.
#[derive(Debug)]
pub struct Db {
    registry: Registry,
    config: DbConfig,
    state: DbState,
    file: Option<File>,
    clock: Clock,
    next_root_offset: u64,
    live: RootHandle,
}

impl Db {
    /// A closed database for `config.path`.
    #[must_use]
    pub fn new(registry: Registry, config: DbConfig) -> Self {
        Self::with_clock(registry, config, Clock::new())
    }

    /// Like [`new`](Self::new), taking timestamps from `clock`.
    #[must_use]
    pub fn with_clock(registry: Registry, config: DbConfig, clock: Clock) -> Self {
        Self {
            registry,
            config,
            state: DbState::Closed,
            file: None,
            clock,
            next_root_offset: 0,
            live: RootHandle::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn state(&self) -> &DbState {
        &self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == DbState::Open
    }

    fn path(&self) -> &Path {
        &self.config.path
    }

    fn max(&self) -> usize {
        self.config.max_root_block_size
    }

    /// Create the file and write an empty root into both slots.
    ///
    /// Fails if a file already exists at the path.
    pub fn create_new(&mut self) -> DbResult<()> {
        self.close();
        self.config.validate()?;

        let root = VersionedMap::new();
        let timestamp = self.clock.next();
        let block = block::encode(&self.registry, self.max(), timestamp, &Value::Map(root.clone()))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.path())
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => DbError::AlreadyExists(self.path().to_path_buf()),
                _ => DbError::Io(e),
            })?;
        let written = write_initial_slots(file, self.max(), &block, self.config.sync_on_write);
        let file = discard_on_error(self.path(), written)?;

        self.file = Some(file);
        self.next_root_offset = Slot::First.offset(self.max());
        self.live.store(root, timestamp);
        self.state = DbState::Open;

        tracing::info!(
            "Created database {} with {} byte slots at timestamp {timestamp}",
            self.path().display(),
            self.max()
        );
        Ok(())
    }

    /// Open an existing file and adopt its newest valid root block.
    pub fn open_existing(&mut self) -> DbResult<()> {
        self.close();
        match self.try_open() {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Failed to open database {}: {e}", self.path().display());
                self.state = DbState::Error(e.to_string());
                Err(e)
            }
        }
    }

    fn unusable(&self, reason: impl Into<String>) -> DbError {
        DbError::Unusable {
            path: self.path().to_path_buf(),
            reason: reason.into(),
        }
    }

    fn try_open(&mut self) -> DbResult<()> {
        self.config.validate()?;

        let metadata = match fs::metadata(self.path()) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(self.unusable("file does not exist"));
            }
            Err(e) => return Err(self.unusable(e.to_string())),
        };
        if !metadata.is_file() {
            return Err(self.unusable("not a regular file"));
        }
        if metadata.permissions().readonly() {
            return Err(self.unusable("file is not writable"));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path())
            .map_err(|e| self.unusable(e.to_string()))?;

        let first = self.read_slot(&mut file, Slot::First)?;
        let second = self.read_slot(&mut file, Slot::Second)?;
        for block in [&first, &second].into_iter().flatten() {
            self.clock.observe(block.timestamp);
        }
        if first.is_err() != second.is_err() {
            tracing::warn!(
                "Root block in {} slot is invalid, recovering from the other slot",
                if first.is_err() { "first" } else { "second" }
            );
        }

        let (slot, block) = choose_slot(first, second)
            .ok_or_else(|| DbError::NoValidRootBlock(self.path().to_path_buf()))?;
        let Value::Map(root) = block.root else {
            return Err(DbError::NoValidRootBlock(self.path().to_path_buf()));
        };

        self.file = Some(file);
        self.next_root_offset = slot.other().offset(self.max());
        self.live.store(root, block.timestamp);
        self.state = DbState::Open;

        tracing::info!(
            "Opened database {} from {slot:?} slot at timestamp {}",
            self.path().display(),
            block.timestamp
        );
        Ok(())
    }

    fn read_slot(&self, file: &mut File, slot: Slot) -> DbResult<Result<RootBlock, BlockRejection>> {
        let max = self.max();
        file.seek(SeekFrom::Start(slot.offset(max)))?;
        let mut bytes = Vec::with_capacity(max);
        std::io::Read::by_ref(file).take(max as u64).read_to_end(&mut bytes)?;

        let decoded = block::decode(&self.registry, &bytes, max).and_then(|block| {
            if matches!(block.root, Value::Map(_)) {
                Ok(block)
            } else {
                Err(BlockRejection::Root(format!(
                    "expected a map, found {:?}",
                    block.root.kind()
                )))
            }
        });
        if let Err(rejection) = &decoded {
            tracing::debug!("Rejected root block in {slot:?} slot: {rejection}");
        }
        Ok(decoded)
    }

    /// Release the file. Safe to call in any state.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::info!("Closed database {}", self.path().display());
        }
        self.state = DbState::Closed;
    }

    fn require_open(&self) -> DbResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DbError::NotOpen)
        }
    }

    /// The live root.
    pub fn root(&self) -> DbResult<VersionedMap> {
        self.require_open()?;
        Ok(self.live.load())
    }

    /// Timestamp of the live root block.
    pub fn timestamp(&self) -> DbResult<Timestamp> {
        self.require_open()?;
        Ok(self.live.timestamp())
    }

    /// A handle for readers on other threads.
    #[must_use]
    pub fn root_handle(&self) -> RootHandle {
        self.live.clone()
    }

    /// Offset of the slot the next write goes to.
    #[must_use]
    pub const fn next_root_offset(&self) -> u64 {
        self.next_root_offset
    }

    /// Persist `root` under a fresh timestamp and adopt it.
    pub fn write(&mut self, root: VersionedMap) -> DbResult<Timestamp> {
        self.require_open()?;
        let timestamp = self.clock.next();
        self.commit(root, timestamp)?;
        Ok(timestamp)
    }

    /// Run `transaction` against the live root and persist the result.
    ///
    /// The transaction and the block share one timestamp. A transaction
    /// that overruns its duration hint is reported, not aborted.
    pub fn apply<T>(&mut self, transaction: &T, payload: &VersionedMap) -> DbResult<VersionedMap>
    where
        T: Transaction + ?Sized,
    {
        self.require_open()?;
        let timestamp = self.clock.next();
        let current = self.live.load();

        let started = Instant::now();
        let root = transaction.transform(&current, timestamp, payload)?;
        let elapsed = started.elapsed();
        if let Some(limit) = transaction.max_duration().filter(|limit| elapsed > *limit) {
            tracing::warn!(
                "Transaction {} took {elapsed:?}, over its {limit:?} limit",
                transaction.name()
            );
        }

        self.commit(root.clone(), timestamp)?;
        Ok(root)
    }

    fn commit(&mut self, root: VersionedMap, timestamp: Timestamp) -> DbResult<()> {
        let max = self.max();
        let block = block::encode(&self.registry, max, timestamp, &Value::Map(root.clone()))?;
        let offset = self.next_root_offset;
        let file = self.file.as_mut().ok_or(DbError::NotOpen)?;

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&block)?;
        if self.config.sync_on_write {
            file.sync_data()?;
        }

        self.next_root_offset = if offset == 0 { max as u64 } else { 0 };
        self.live.store(root, timestamp);
        tracing::debug!(
            "Committed {} byte root block at offset {offset}, timestamp {timestamp}",
            block.len()
        );
        Ok(())
    }

    /// Whether a file exists at the configured path.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Close the database and delete its file. Returns whether a file was
    /// deleted.
    pub fn delete_if_exists(&mut self) -> DbResult<bool> {
        self.close();
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Size of the database file in bytes.
    pub fn file_size(&self) -> DbResult<u64> {
        Ok(fs::metadata(self.path())?.len())
    }
}
