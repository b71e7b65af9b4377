//! Shared helpers for database integration tests.

#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::TempDir;
use vcow_db::{Db, DbConfig};
use vcow_immutable::Registry;

pub const MAX: usize = 1000;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A closed database for a fresh path inside `dir`.
pub fn db_in(dir: &TempDir) -> Db {
    init_tracing();
    let config = DbConfig::new(dir.path().join("test.vcow")).with_max_root_block_size(MAX);
    Db::new(Registry::standard(), config)
}

pub fn read_at(path: &Path, offset: u64, len: usize) -> Vec<u8> {
    let mut file = OpenOptions::new().read(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes).unwrap();
    bytes
}

pub fn write_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

/// Flip one bit of the byte at `offset`.
pub fn flip_bit(path: &Path, offset: u64, bit: u8) {
    let mut byte = read_at(path, offset, 1);
    byte[0] ^= 1 << bit;
    write_at(path, offset, &byte);
}
