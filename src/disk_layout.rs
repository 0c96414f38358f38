//! On-disk layout of the file system's typed blocks.
//!
//! This module is the sole owner of the byte layout. Every block is
//! exactly [`BLOCK_SIZE`] bytes and opens with the [`BlockKind`]
//! discriminant followed by the 0x44 format fingerprint. The codec
//! zero-fills padding on encode and validates both lead bytes on
//! decode, so a block read through the wrong type surfaces as
//! [`TfsError::NotTinyFsFormat`] instead of misparsed data.
//!
//! Layout summary (byte offsets):
//!
//! | Block      | 0 | 1    | payload                                      |
//! |------------|---|------|----------------------------------------------|
//! | Superblock | 1 | 0x44 | 2: root inode, 3: free-list head             |
//! | Inode      | 2 | 0x44 | 2..11: name, 11..13: size (u16 LE), 13: self,|
//! |            |   |      | 14: next inode, 15: first extent             |
//! | FreeBlock  | 3 | 0x44 | 2: next free block                           |
//! | FileExtent | 4 | 0x44 | 2: next data block, 3..256: payload          |
//!
//! A link byte of 0xFF means "none"; the in-memory form of every link is
//! `Option<BlockId>` and the translation happens only here.

use crate::types::{BlockId, BlockKind, FileName};
use crate::{BLOCK_SIZE, EXTENT_CAPACITY, MAGIC_NUMBER, TfsError};

/// On-disk byte for "no block".
const NO_LINK: u8 = 0xFF;

const OFF_KIND: usize = 0;
const OFF_MAGIC: usize = 1;
// Superblock fields.
const OFF_ROOT_INODE: usize = 2;
const OFF_FREE_HEAD: usize = 3;
// Inode fields.
const OFF_NAME: usize = 2;
const OFF_SIZE: usize = 11;
const OFF_SELF: usize = 13;
const OFF_NEXT_INODE: usize = 14;
const OFF_FIRST_EXTENT: usize = 15;
// FreeBlock and FileExtent fields.
const OFF_NEXT_FREE: usize = 2;
const OFF_NEXT_DATA: usize = 2;
const OFF_DATA: usize = 3;

fn encode_link(link: Option<BlockId>) -> u8 {
    link.map(BlockId::get).unwrap_or(NO_LINK)
}

fn decode_link(byte: u8) -> Option<BlockId> {
    if byte == NO_LINK { None } else { BlockId::new(byte) }
}

/// A zeroed block carrying the discriminant and fingerprint for `kind`.
fn header(kind: BlockKind) -> [u8; BLOCK_SIZE] {
    let mut raw = [0u8; BLOCK_SIZE];
    raw[OFF_KIND] = kind.into();
    raw[OFF_MAGIC] = MAGIC_NUMBER;
    raw
}

fn check_header(raw: &[u8; BLOCK_SIZE], expected: BlockKind) -> Result<(), TfsError> {
    if raw[OFF_MAGIC] != MAGIC_NUMBER || BlockKind::parse(raw[OFF_KIND])? != expected {
        return Err(TfsError::NotTinyFsFormat);
    }
    Ok(())
}

/// Whether a raw block carries the TinyFS fingerprint byte.
///
/// The mount verification walk checks only this; full decoding happens
/// lazily when a block is actually used.
pub fn has_magic(raw: &[u8; BLOCK_SIZE]) -> bool {
    raw[OFF_MAGIC] == MAGIC_NUMBER
}

/// Block 0: the entry point of the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    /// Block of the root inode sentinel, always block 1.
    pub root_inode: BlockId,
    /// Head of the free-block list.
    pub free_head: Option<BlockId>,
}

impl Superblock {
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut raw = header(BlockKind::Superblock);
        raw[OFF_ROOT_INODE] = self.root_inode.get();
        raw[OFF_FREE_HEAD] = encode_link(self.free_head);
        raw
    }

    pub fn decode(raw: &[u8; BLOCK_SIZE]) -> Result<Self, TfsError> {
        check_header(raw, BlockKind::Superblock)?;
        Ok(Self {
            root_inode: BlockId::new(raw[OFF_ROOT_INODE]).ok_or(TfsError::NotTinyFsFormat)?,
            free_head: decode_link(raw[OFF_FREE_HEAD]),
        })
    }
}

/// Metadata block for one file: name, size, and the heads of its chain
/// links.
///
/// For the root sentinel, `size` holds the total number of blocks on the
/// disk rather than a byte count. It is written once by mkfs and trusted
/// by the mount verification walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub name: FileName,
    /// File length in bytes (block count for the root sentinel).
    pub size: u16,
    /// Block number of this inode itself.
    pub self_block: BlockId,
    /// Next inode in the chain hanging off the root sentinel.
    pub next_inode: Option<BlockId>,
    /// First block of the file's extent chain.
    pub first_extent: Option<BlockId>,
}

impl Inode {
    /// A fresh zero-length inode for `name` living at `self_block`.
    pub fn new(name: FileName, self_block: BlockId) -> Self {
        Self {
            name,
            size: 0,
            self_block,
            next_inode: None,
            first_extent: None,
        }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut raw = header(BlockKind::Inode);
        raw[OFF_NAME..OFF_NAME + 9].copy_from_slice(self.name.raw());
        raw[OFF_SIZE..OFF_SIZE + 2].copy_from_slice(&self.size.to_le_bytes());
        raw[OFF_SELF] = self.self_block.get();
        raw[OFF_NEXT_INODE] = encode_link(self.next_inode);
        raw[OFF_FIRST_EXTENT] = encode_link(self.first_extent);
        raw
    }

    pub fn decode(raw: &[u8; BLOCK_SIZE]) -> Result<Self, TfsError> {
        check_header(raw, BlockKind::Inode)?;
        let mut name = [0u8; 9];
        name.copy_from_slice(&raw[OFF_NAME..OFF_NAME + 9]);
        Ok(Self {
            name: FileName::from_raw(name),
            size: u16::from_le_bytes([raw[OFF_SIZE], raw[OFF_SIZE + 1]]),
            self_block: BlockId::new(raw[OFF_SELF]).ok_or(TfsError::NotTinyFsFormat)?,
            next_inode: decode_link(raw[OFF_NEXT_INODE]),
            first_extent: decode_link(raw[OFF_FIRST_EXTENT]),
        })
    }
}

/// Payload block carrying up to [`EXTENT_CAPACITY`] file bytes.
#[derive(Clone)]
pub struct FileExtent {
    /// Next extent of the same file.
    pub next: Option<BlockId>,
    pub data: [u8; EXTENT_CAPACITY],
}

impl FileExtent {
    /// Builds an extent from one chunk of file content, zero-padding the
    /// rest of the block.
    ///
    /// `chunk` must not exceed [`EXTENT_CAPACITY`] bytes.
    pub fn from_chunk(chunk: &[u8], next: Option<BlockId>) -> Self {
        let mut data = [0u8; EXTENT_CAPACITY];
        data[..chunk.len()].copy_from_slice(chunk);
        Self { next, data }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut raw = header(BlockKind::Extent);
        raw[OFF_NEXT_DATA] = encode_link(self.next);
        raw[OFF_DATA..].copy_from_slice(&self.data);
        raw
    }

    pub fn decode(raw: &[u8; BLOCK_SIZE]) -> Result<Self, TfsError> {
        check_header(raw, BlockKind::Extent)?;
        let mut data = [0u8; EXTENT_CAPACITY];
        data.copy_from_slice(&raw[OFF_DATA..]);
        Ok(Self {
            next: decode_link(raw[OFF_NEXT_DATA]),
            data,
        })
    }
}

/// Unallocated block linked into the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Next block on the free list.
    pub next: Option<BlockId>,
}

impl FreeBlock {
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut raw = header(BlockKind::Free);
        raw[OFF_NEXT_FREE] = encode_link(self.next);
        raw
    }

    pub fn decode(raw: &[u8; BLOCK_SIZE]) -> Result<Self, TfsError> {
        check_header(raw, BlockKind::Free)?;
        Ok(Self {
            next: decode_link(raw[OFF_NEXT_FREE]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_missing_magic() {
        let mut raw = Superblock {
            root_inode: BlockId::new(1).unwrap(),
            free_head: None,
        }
        .encode();
        raw[OFF_MAGIC] = 0;
        assert_eq!(Superblock::decode(&raw), Err(TfsError::NotTinyFsFormat));
    }

    #[test]
    fn decode_rejects_wrong_kind() {
        let raw = FreeBlock { next: None }.encode();
        assert_eq!(Inode::decode(&raw).err(), Some(TfsError::NotTinyFsFormat));
        assert!(FreeBlock::decode(&raw).is_ok());
    }

    #[test]
    fn link_sentinel_is_0xff() {
        let raw = FreeBlock { next: None }.encode();
        assert_eq!(raw[OFF_NEXT_FREE], 0xFF);
        let raw = FreeBlock {
            next: BlockId::new(9),
        }
        .encode();
        assert_eq!(FreeBlock::decode(&raw).unwrap().next, BlockId::new(9));
    }

    #[test]
    fn inode_round_trip_keeps_every_field() {
        let mut inode = Inode::new(FileName::new("notes"), BlockId::new(5).unwrap());
        inode.size = 517;
        inode.next_inode = BlockId::new(8);
        inode.first_extent = BlockId::new(12);
        let decoded = Inode::decode(&inode.encode()).unwrap();
        assert_eq!(decoded, inode);
    }

    #[test]
    fn extent_pads_short_chunks_with_zeros() {
        let extent = FileExtent::from_chunk(b"abc", None);
        let raw = extent.encode();
        assert_eq!(&raw[OFF_DATA..OFF_DATA + 3], b"abc");
        assert!(raw[OFF_DATA + 3..].iter().all(|&b| b == 0));
    }
}
