//! Inode directory: the singly linked chain of inodes that forms the
//! flat namespace.
//!
//! The chain starts at the root sentinel in block 1 and is terminated by
//! a missing link. The sentinel carries no user data and is never
//! unlinked; its name is skipped during lookup so it can never shadow a
//! user file.

use crate::disk_layout::Inode;
use crate::fs::Volume;
use crate::types::{BlockId, FileName, ROOT_INODE_BLOCK};
use crate::TfsError;

impl Volume {
    /// Reads and decodes the inode stored in `block`.
    pub(crate) fn read_inode(&mut self, block: BlockId) -> Result<Inode, TfsError> {
        let raw = self.read_raw(block)?;
        Inode::decode(&raw)
    }

    /// Persists `inode` to its own block.
    pub(crate) fn write_inode(&mut self, inode: &Inode) -> Result<(), TfsError> {
        self.dev.write_block(inode.self_block.get(), &inode.encode())
    }

    /// Finds the inode for `name`, walking the chain from the root
    /// sentinel. The sentinel itself never matches.
    pub(crate) fn lookup(&mut self, name: &FileName) -> Result<Option<Inode>, TfsError> {
        let root = self.read_inode(ROOT_INODE_BLOCK)?;
        let mut next = root.next_inode;
        while let Some(block) = next {
            let inode = self.read_inode(block)?;
            if inode.name == *name {
                return Ok(Some(inode));
            }
            next = inode.next_inode;
        }
        Ok(None)
    }

    /// Creates the inode for a new file and links it at the tail of the
    /// chain.
    ///
    /// The fresh inode's block is written before the previous tail's
    /// link is persisted; if anything fails after allocation, the block
    /// goes back to the free list and the chain is left untouched.
    pub(crate) fn create_inode(&mut self, name: FileName) -> Result<Inode, TfsError> {
        let block = self.allocate()?;
        let inode = Inode::new(name, block);
        if let Err(e) = self.link_new_inode(&inode) {
            let _ = self.release(block);
            return Err(e);
        }
        Ok(inode)
    }

    fn link_new_inode(&mut self, inode: &Inode) -> Result<(), TfsError> {
        self.write_inode(inode)?;
        let mut tail = self.read_inode(ROOT_INODE_BLOCK)?;
        while let Some(block) = tail.next_inode {
            tail = self.read_inode(block)?;
        }
        tail.next_inode = Some(inode.self_block);
        self.write_inode(&tail)
    }

    /// Splices `target` out of the inode chain and pushes its block onto
    /// the free list. The predecessor's link is persisted before the
    /// block is freed.
    pub(crate) fn unlink_inode(&mut self, target: &Inode) -> Result<(), TfsError> {
        let mut prev = self.read_inode(ROOT_INODE_BLOCK)?;
        loop {
            let Some(block) = prev.next_inode else {
                return Err(TfsError::NoInodeMatchingFd);
            };
            if block == target.self_block {
                prev.next_inode = target.next_inode;
                self.write_inode(&prev)?;
                return self.release(target.self_block);
            }
            prev = self.read_inode(block)?;
        }
    }
}
