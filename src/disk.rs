//! Backing store adapter: a host file accessed as an array of
//! fixed-size blocks.
//!
//! The adapter is purely positional. It has no knowledge of block
//! contents, performs no buffering or caching, and every call is one
//! seek plus one read or write against the host file.

use crate::{BLOCK_SIZE, TfsError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A fixed-size-block random-access byte store over a host file.
///
/// The underlying file is closed when the device is dropped.
#[derive(Debug)]
pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Opens the emulated disk at `path`.
    ///
    /// With `n_bytes == 0` an existing file is opened for read/write and
    /// the call fails if it does not exist. With
    /// `n_bytes >= BLOCK_SIZE` the file is created (or reopened) and
    /// truncated to `n_bytes` rounded down to a multiple of
    /// [`BLOCK_SIZE`]. Any size in between is rejected.
    ///
    /// # Returns
    /// - `Ok(BlockDevice)`: the disk is ready for block I/O.
    /// - `Err(TfsError::InvalidDisk)`: the file cannot be opened or the
    ///   requested size is below one block.
    pub fn open(path: impl AsRef<Path>, n_bytes: usize) -> Result<Self, TfsError> {
        if n_bytes == 0 {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|_| TfsError::InvalidDisk)?;
            Ok(Self { file })
        } else if n_bytes < BLOCK_SIZE {
            Err(TfsError::InvalidDisk)
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .map_err(|_| TfsError::InvalidDisk)?;
            let rounded = n_bytes - n_bytes % BLOCK_SIZE;
            file.set_len(rounded as u64)
                .map_err(|_| TfsError::InvalidDisk)?;
            Ok(Self { file })
        }
    }

    /// Reads block `bnum` into `buf`.
    ///
    /// Fails with [`TfsError::ReadError`] if fewer than [`BLOCK_SIZE`]
    /// bytes are available at that position.
    pub fn read_block(&mut self, bnum: u8, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), TfsError> {
        self.file
            .seek(SeekFrom::Start(bnum as u64 * BLOCK_SIZE as u64))
            .map_err(|_| TfsError::ReadError)?;
        self.file.read_exact(buf).map_err(|_| TfsError::ReadError)
    }

    /// Writes all of `buf` to block `bnum`.
    ///
    /// Fails with [`TfsError::WriteError`] if the write comes up short.
    pub fn write_block(&mut self, bnum: u8, buf: &[u8; BLOCK_SIZE]) -> Result<(), TfsError> {
        self.file
            .seek(SeekFrom::Start(bnum as u64 * BLOCK_SIZE as u64))
            .map_err(|_| TfsError::WriteError)?;
        self.file.write_all(buf).map_err(|_| TfsError::WriteError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_owned()
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            BlockDevice::open(scratch(&dir, "absent"), 0).err(),
            Some(TfsError::InvalidDisk)
        );
    }

    #[test]
    fn open_rejects_sub_block_size() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            BlockDevice::open(scratch(&dir, "tiny"), BLOCK_SIZE - 1).err(),
            Some(TfsError::InvalidDisk)
        );
    }

    #[test]
    fn create_truncates_to_block_multiple() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch(&dir, "disk");
        BlockDevice::open(&path, 1000).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 768);
    }

    #[test]
    fn block_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut dev = BlockDevice::open(scratch(&dir, "disk"), 4 * BLOCK_SIZE).unwrap();
        let mut block = [0u8; BLOCK_SIZE];
        for (i, b) in block.iter_mut().enumerate() {
            *b = i as u8;
        }
        dev.write_block(2, &block).unwrap();
        let mut back = [0u8; BLOCK_SIZE];
        dev.read_block(2, &mut back).unwrap();
        assert_eq!(block, back);
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut dev = BlockDevice::open(scratch(&dir, "disk"), 2 * BLOCK_SIZE).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(dev.read_block(5, &mut buf).err(), Some(TfsError::ReadError));
    }
}
