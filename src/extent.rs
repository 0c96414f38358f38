//! File extent chains: the per-file linked list of payload blocks.
//!
//! A file's bytes live in [`EXTENT_CAPACITY`]-sized chunks, one chunk
//! per extent block, chained through `nextDataBlock`. Byte `i` of the
//! file sits in extent `i / EXTENT_CAPACITY` at offset
//! `i % EXTENT_CAPACITY`, on both the read and the write path.

use crate::disk_layout::{FileExtent, Inode};
use crate::fs::Volume;
use crate::{EXTENT_CAPACITY, TfsError};
use log::debug;

impl Volume {
    /// Frees the file's extent chain and resets it to zero length.
    ///
    /// A file without extents is left untouched on disk.
    pub(crate) fn truncate_extents(&mut self, inode: &mut Inode) -> Result<(), TfsError> {
        let Some(head) = inode.first_extent.take() else {
            inode.size = 0;
            return Ok(());
        };
        let freed = self.release_extent_chain(head)?;
        debug!("freed {freed} extent block(s) of {}", inode.name);
        inode.size = 0;
        self.write_inode(inode)
    }

    /// Replaces the file's content with `data`.
    ///
    /// The previous extents are freed first, then one block per chunk
    /// is claimed from the free list. Blocks are claimed up front so
    /// each extent can be written with its successor link already
    /// known. If the list runs dry part-way, the claimed blocks go back
    /// to the free list and the error propagates; the old content is
    /// gone by then.
    pub(crate) fn write_extents(&mut self, inode: &mut Inode, data: &[u8]) -> Result<(), TfsError> {
        self.truncate_extents(inode)?;

        let needed = data.len().div_ceil(EXTENT_CAPACITY);
        let mut blocks = Vec::with_capacity(needed);
        for _ in 0..needed {
            match self.allocate() {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    for block in blocks {
                        let _ = self.release(block);
                    }
                    return Err(e);
                }
            }
        }

        for (i, chunk) in data.chunks(EXTENT_CAPACITY).enumerate() {
            let next = blocks.get(i + 1).copied();
            let extent = FileExtent::from_chunk(chunk, next);
            self.dev.write_block(blocks[i].get(), &extent.encode())?;
        }

        inode.first_extent = blocks.first().copied();
        inode.size = data.len() as u16;
        self.write_inode(inode)
    }

    /// Reads the byte at `offset` of the file.
    ///
    /// # Returns
    /// - `Ok(byte)`: the requested byte.
    /// - `Err(TfsError::EofError)`: `offset` is at or past the file end.
    pub(crate) fn read_byte_at(&mut self, inode: &Inode, offset: usize) -> Result<u8, TfsError> {
        if offset >= inode.size as usize {
            return Err(TfsError::EofError);
        }
        // A chain shorter than the recorded size is a corrupt disk.
        let mut cur = inode.first_extent.ok_or(TfsError::NotTinyFsFormat)?;
        for _ in 0..offset / EXTENT_CAPACITY {
            let raw = self.read_raw(cur)?;
            let extent = FileExtent::decode(&raw)?;
            cur = extent.next.ok_or(TfsError::NotTinyFsFormat)?;
        }
        let raw = self.read_raw(cur)?;
        let extent = FileExtent::decode(&raw)?;
        Ok(extent.data[offset % EXTENT_CAPACITY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileName;
    use crate::TinyFs;

    fn fresh_file(blocks: usize) -> (tempfile::TempDir, Volume, Inode) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk").to_str().unwrap().to_owned();
        TinyFs::mkfs(&path, blocks * crate::BLOCK_SIZE).unwrap();
        let mut vol = Volume::open(&path).unwrap();
        let inode = vol.create_inode(FileName::new("f")).unwrap();
        (dir, vol, inode)
    }

    #[test]
    fn bytes_land_across_the_extent_boundary() {
        let (_dir, mut vol, mut inode) = fresh_file(10);
        let data: Vec<u8> = (0..EXTENT_CAPACITY as u32 + 5).map(|i| i as u8).collect();
        vol.write_extents(&mut inode, &data).unwrap();
        assert_eq!(inode.size as usize, data.len());

        // Last byte of the first extent and first byte of the second.
        assert_eq!(
            vol.read_byte_at(&inode, EXTENT_CAPACITY - 1).unwrap(),
            data[EXTENT_CAPACITY - 1]
        );
        assert_eq!(
            vol.read_byte_at(&inode, EXTENT_CAPACITY).unwrap(),
            data[EXTENT_CAPACITY]
        );
        assert_eq!(
            vol.read_byte_at(&inode, data.len()).err(),
            Some(TfsError::EofError)
        );
    }

    #[test]
    fn overwrite_returns_surplus_blocks() {
        let (_dir, mut vol, mut inode) = fresh_file(10);
        vol.write_extents(&mut inode, &[7u8; 3 * EXTENT_CAPACITY])
            .unwrap();
        let free_after_big = free_len(&mut vol);
        vol.write_extents(&mut inode, b"small").unwrap();
        assert_eq!(free_len(&mut vol), free_after_big + 2);
        assert_eq!(vol.read_byte_at(&inode, 0).unwrap(), b's');
    }

    #[test]
    fn failed_write_releases_claimed_blocks_and_empties_the_file() {
        // 5 blocks: superblock, root, inode, and only 2 free.
        let (_dir, mut vol, mut inode) = fresh_file(5);
        let too_big = vec![1u8; 3 * EXTENT_CAPACITY];
        assert_eq!(
            vol.write_extents(&mut inode, &too_big).err(),
            Some(TfsError::OutOfBlocks)
        );
        // Both free blocks are back on the list and the file is empty.
        assert_eq!(free_len(&mut vol), 2);
        assert_eq!(inode.size, 0);
        assert_eq!(
            vol.read_byte_at(&inode, 0).err(),
            Some(TfsError::EofError)
        );
    }

    #[test]
    fn truncate_on_an_empty_file_is_a_no_op() {
        let (_dir, mut vol, mut inode) = fresh_file(5);
        let free_before = free_len(&mut vol);
        vol.truncate_extents(&mut inode).unwrap();
        assert_eq!(free_len(&mut vol), free_before);
    }

    fn free_len(vol: &mut Volume) -> usize {
        let mut n = 0;
        let mut cur = vol.sb.free_head;
        while let Some(block) = cur {
            let raw = vol.read_raw(block).unwrap();
            cur = crate::disk_layout::FreeBlock::decode(&raw).unwrap().next;
            n += 1;
        }
        n
    }
}
