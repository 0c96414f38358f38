//! Free-list management.
//!
//! Unallocated blocks form a singly linked list headed in the
//! superblock. Allocation pops the head, deallocation pushes one block,
//! and a whole extent chain can be spliced back in a single walk. Every
//! head change is persisted to block 0 immediately, before the freed or
//! claimed block is touched by anyone else.

use crate::disk_layout::{FileExtent, FreeBlock};
use crate::fs::Volume;
use crate::types::BlockId;
use crate::TfsError;

impl Volume {
    /// Pops the head of the free list.
    ///
    /// The superblock is persisted before the block number is returned,
    /// so the block is already off the list when the caller overwrites
    /// it with its intended content.
    ///
    /// # Returns
    /// - `Ok(block)`: the claimed block.
    /// - `Err(TfsError::OutOfBlocks)`: the free list is empty.
    pub(crate) fn allocate(&mut self) -> Result<BlockId, TfsError> {
        let head = self.sb.free_head.ok_or(TfsError::OutOfBlocks)?;
        let raw = self.read_raw(head)?;
        let free = FreeBlock::decode(&raw)?;
        self.sb.free_head = free.next;
        self.sync_superblock()?;
        Ok(head)
    }

    /// Returns `block` to the free list by prepending it.
    pub(crate) fn release(&mut self, block: BlockId) -> Result<(), TfsError> {
        let free = FreeBlock {
            next: self.sb.free_head,
        };
        self.dev.write_block(block.get(), &free.encode())?;
        self.sb.free_head = Some(block);
        self.sync_superblock()
    }

    /// Splices a whole extent chain onto the free list.
    ///
    /// The chain is walked once; every extent is rewritten as a free
    /// block that keeps its successor link, the tail is pointed at the
    /// current list head, and only then does the superblock head swing
    /// to the chain's first block.
    ///
    /// Returns the number of blocks freed.
    pub(crate) fn release_extent_chain(&mut self, head: BlockId) -> Result<usize, TfsError> {
        let mut freed = 0;
        let mut cur = Some(head);
        while let Some(block) = cur {
            let raw = self.read_raw(block)?;
            let extent = FileExtent::decode(&raw)?;
            let next_free = extent.next.or(self.sb.free_head);
            self.dev
                .write_block(block.get(), &FreeBlock { next: next_free }.encode())?;
            cur = extent.next;
            freed += 1;
        }
        self.sb.free_head = Some(head);
        self.sync_superblock()?;
        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TinyFs;

    fn fresh_volume(blocks: usize) -> (tempfile::TempDir, Volume) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk").to_str().unwrap().to_owned();
        TinyFs::mkfs(&path, blocks * crate::BLOCK_SIZE).unwrap();
        let vol = Volume::open(&path).unwrap();
        (dir, vol)
    }

    #[test]
    fn allocation_pops_blocks_in_mkfs_order() {
        let (_dir, mut vol) = fresh_volume(6);
        assert_eq!(vol.allocate().unwrap().get(), 2);
        assert_eq!(vol.allocate().unwrap().get(), 3);
        assert_eq!(vol.allocate().unwrap().get(), 4);
        assert_eq!(vol.allocate().unwrap().get(), 5);
        assert_eq!(vol.allocate().err(), Some(TfsError::OutOfBlocks));
    }

    #[test]
    fn release_prepends_to_the_list() {
        let (_dir, mut vol) = fresh_volume(5);
        let a = vol.allocate().unwrap();
        let _b = vol.allocate().unwrap();
        vol.release(a).unwrap();
        // The released block is handed out again first.
        assert_eq!(vol.allocate().unwrap(), a);
    }

    #[test]
    fn extent_chain_splices_in_front_of_the_free_list() {
        let (_dir, mut vol) = fresh_volume(8);
        // Build a two-extent chain by hand on claimed blocks.
        let first = vol.allocate().unwrap();
        let second = vol.allocate().unwrap();
        vol.dev
            .write_block(
                first.get(),
                &FileExtent::from_chunk(b"x", Some(second)).encode(),
            )
            .unwrap();
        vol.dev
            .write_block(second.get(), &FileExtent::from_chunk(b"y", None).encode())
            .unwrap();
        let old_head = vol.sb.free_head.unwrap();

        assert_eq!(vol.release_extent_chain(first).unwrap(), 2);
        assert_eq!(vol.sb.free_head, Some(first));
        // Chain order: first, second, then the previous free head.
        assert_eq!(vol.allocate().unwrap(), first);
        assert_eq!(vol.allocate().unwrap(), second);
        assert_eq!(vol.allocate().unwrap(), old_head);
    }
}
