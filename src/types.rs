//! Core type definitions for the file system.
//!
//! Most types here are thin wrappers around single bytes, following the
//! on-disk convention that every address and discriminant fits in one
//! byte. They exist to keep the sentinel handling (0xFF for "none") and
//! the sign-extension pitfalls of the raw format out of the rest of the
//! code.

use crate::{MAX_FILENAME_LEN, TfsError};
use core::fmt;
use core::num::NonZeroU8;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The discriminant stored in byte 0 of every typed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BlockKind {
    /// Block 0, entry point of the disk.
    Superblock = 1,
    /// Metadata block for one file.
    Inode = 2,
    /// Unallocated block on the free list.
    Free = 3,
    /// Payload block of a file.
    Extent = 4,
}

impl BlockKind {
    /// Converts a raw block-type byte, mapping unknown discriminants to
    /// the format error.
    pub(crate) fn parse(byte: u8) -> Result<Self, TfsError> {
        Self::try_from(byte).map_err(|_| TfsError::NotTinyFsFormat)
    }
}

/// A block number on the mounted disk.
///
/// Stored on disk as a single byte. Block 0 is always the superblock and
/// is never the target of a chain link, so the zero niche is reserved
/// and `Option<BlockId>` is itself one byte.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct BlockId(NonZeroU8);

const _: () = assert!(core::mem::size_of::<Option<BlockId>>() == 1);

impl BlockId {
    /// Creates a [`BlockId`] if the given value is not zero.
    pub const fn new(n: u8) -> Option<Self> {
        match NonZeroU8::new(n) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns the contained block number as a u8.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Block number of the root inode sentinel.
pub const ROOT_INODE_BLOCK: BlockId = BlockId::new(1).unwrap();

/// A file name as stored in an inode: up to [`MAX_FILENAME_LEN`] bytes
/// in a 9-byte NUL-terminated field. Longer input is truncated.
#[derive(Clone, Copy)]
pub struct FileName([u8; 9]);

impl FileName {
    /// Builds a file name from caller input, truncating to
    /// [`MAX_FILENAME_LEN`] bytes.
    pub fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_FILENAME_LEN);
        let mut raw = [0u8; 9];
        raw[..len].copy_from_slice(&bytes[..len]);
        Self(raw)
    }

    /// Rebuilds a file name from its on-disk field. The final byte is
    /// forced to NUL so the name is always terminated.
    pub(crate) fn from_raw(mut raw: [u8; 9]) -> Self {
        raw[MAX_FILENAME_LEN] = 0;
        Self(raw)
    }

    pub(crate) fn raw(&self) -> &[u8; 9] {
        &self.0
    }

    /// The name's bytes up to the terminating NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_FILENAME_LEN);
        &self.0[..end]
    }
}

// Names compare byte-exact up to the NUL, not over the whole field.
impl PartialEq for FileName {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for FileName {}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileName({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// A file descriptor handed out by [`TinyFs::open_file`] and accepted by
/// the other file operations. Unique within one mount.
///
/// [`TinyFs::open_file`]: crate::TinyFs::open_file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fd(u32);

impl Fd {
    pub(crate) const fn new(n: u32) -> Self {
        Self(n)
    }

    /// Returns the descriptor's numeric value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_rejects_zero() {
        assert!(BlockId::new(0).is_none());
        assert_eq!(BlockId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn block_kind_rejects_unknown_discriminant() {
        assert_eq!(BlockKind::parse(2), Ok(BlockKind::Inode));
        assert_eq!(BlockKind::parse(0), Err(TfsError::NotTinyFsFormat));
        assert_eq!(BlockKind::parse(9), Err(TfsError::NotTinyFsFormat));
    }

    #[test]
    fn file_name_truncates_to_eight_bytes() {
        let name = FileName::new("averylongname");
        assert_eq!(name.as_bytes(), b"averylon");
        assert_eq!(name, FileName::new("averylongest"));
    }

    #[test]
    fn file_name_compares_up_to_nul() {
        let mut raw = [0u8; 9];
        raw[..2].copy_from_slice(b"hi");
        // Garbage after the terminator must not affect equality.
        raw[4] = 0x7f;
        assert_eq!(FileName::from_raw(raw), FileName::new("hi"));
        assert_ne!(FileName::new("hi"), FileName::new("hip"));
    }
}
