//! Mount state, the open-file table, and the public file-system API.
//!
//! [`TinyFs`] owns at most one mounted disk. The mounted state bundles
//! the backing store, a cached copy of the superblock, and the open-file
//! table; all of it is dropped together on unmount, so descriptors never
//! outlive the mount that issued them.

use crate::disk::BlockDevice;
use crate::disk_layout::{self, FreeBlock, Inode, Superblock};
use crate::types::{BlockId, Fd, FileName, ROOT_INODE_BLOCK};
use crate::{BLOCK_SIZE, MAX_BLOCKS, ROOT_NAME, TfsError};
use log::{debug, info};
use std::collections::BTreeMap;

/// A mounted disk: the backing store plus the cached superblock.
///
/// The cached superblock is the authoritative copy; every mutation of
/// the free-list head goes through [`Volume::sync_superblock`] so the
/// on-disk block 0 stays in step.
pub(crate) struct Volume {
    pub(crate) dev: BlockDevice,
    pub(crate) sb: Superblock,
    /// Total number of blocks, as recorded in the root sentinel by mkfs.
    pub(crate) block_count: u16,
}

impl Volume {
    /// Opens and verifies a TinyFS disk.
    ///
    /// Block 0 must decode as a superblock, block 1 as the root inode
    /// sentinel named "root", and every block up to the recorded block
    /// count must carry the format fingerprint byte.
    ///
    /// # Returns
    /// - `Ok(Volume)`: the disk passed verification.
    /// - `Err(TfsError::InvalidDisk)`: the host file cannot be opened.
    /// - `Err(TfsError::NotTinyFsFormat)`: the content is not a TinyFS
    ///   disk.
    pub(crate) fn open(path: &str) -> Result<Self, TfsError> {
        let mut dev = BlockDevice::open(path, 0)?;
        let mut raw = [0u8; BLOCK_SIZE];
        dev.read_block(0, &mut raw)?;
        let sb = Superblock::decode(&raw)?;

        dev.read_block(ROOT_INODE_BLOCK.get(), &mut raw)?;
        let root = Inode::decode(&raw)?;
        if root.name != FileName::new(ROOT_NAME) {
            return Err(TfsError::NotTinyFsFormat);
        }
        let block_count = root.size;
        if !(2..=MAX_BLOCKS as u16).contains(&block_count) {
            return Err(TfsError::NotTinyFsFormat);
        }
        for bnum in 1..block_count {
            dev.read_block(bnum as u8, &mut raw)?;
            if !disk_layout::has_magic(&raw) {
                return Err(TfsError::NotTinyFsFormat);
            }
        }
        Ok(Self {
            dev,
            sb,
            block_count,
        })
    }

    /// Reads one raw block.
    pub(crate) fn read_raw(&mut self, block: BlockId) -> Result<[u8; BLOCK_SIZE], TfsError> {
        let mut raw = [0u8; BLOCK_SIZE];
        self.dev.read_block(block.get(), &mut raw)?;
        Ok(raw)
    }

    /// Persists the cached superblock to block 0.
    pub(crate) fn sync_superblock(&mut self) -> Result<(), TfsError> {
        self.dev.write_block(0, &self.sb.encode())
    }
}

/// An open-file table entry: the file's name and its read cursor.
#[derive(Debug, Clone)]
struct OpenFile {
    name: FileName,
    offset: usize,
}

/// State scoped to one mount.
struct Mounted {
    name: String,
    vol: Volume,
    table: BTreeMap<Fd, OpenFile>,
    next_fd: u32,
}

impl Mounted {
    fn entry(&self, fd: Fd) -> Result<&OpenFile, TfsError> {
        self.table.get(&fd).ok_or(TfsError::InvalidFd)
    }
}

/// The TinyFS entry point: at most one mounted disk plus the open-file
/// table scoped to that mount.
///
/// # Example
/// ```no_run
/// use tinyfs::TinyFs;
///
/// TinyFs::mkfs("disk.img", 2560)?;
/// let mut fs = TinyFs::new();
/// fs.mount("disk.img")?;
/// let fd = fs.open_file("notes")?;
/// fs.write_file(fd, b"hi")?;
/// assert_eq!(fs.read_byte(fd)?, b'h');
/// fs.unmount()?;
/// # Ok::<(), tinyfs::TfsError>(())
/// ```
#[derive(Default)]
pub struct TinyFs {
    mounted: Option<Mounted>,
}

impl TinyFs {
    /// First descriptor handed out after a mount.
    const FIRST_FD: u32 = 3;

    /// A file system with nothing mounted yet.
    pub fn new() -> Self {
        Self { mounted: None }
    }

    /// Formats a blank TinyFS disk of `n_bytes` on the host file at
    /// `path`.
    ///
    /// Writes the superblock and the root inode sentinel, then chains
    /// every remaining block into the free list. The disk must hold at
    /// least two blocks (superblock and root) and at most
    /// [`MAX_BLOCKS`]; `n_bytes` is rounded down to a block multiple.
    ///
    /// # Returns
    /// - `Ok(())`: the disk is mountable.
    /// - `Err(TfsError::InvalidDisk)`: unusable size or host file.
    /// - `Err(TfsError::WriteError)`: a block write failed.
    pub fn mkfs(path: &str, n_bytes: usize) -> Result<(), TfsError> {
        let block_count = n_bytes / BLOCK_SIZE;
        if !(2..=MAX_BLOCKS).contains(&block_count) {
            return Err(TfsError::InvalidDisk);
        }
        let mut dev = BlockDevice::open(path, n_bytes)?;

        let sb = Superblock {
            root_inode: ROOT_INODE_BLOCK,
            free_head: if block_count >= 3 { BlockId::new(2) } else { None },
        };
        dev.write_block(0, &sb.encode())?;

        let mut root = Inode::new(FileName::new(ROOT_NAME), ROOT_INODE_BLOCK);
        root.size = block_count as u16;
        dev.write_block(ROOT_INODE_BLOCK.get(), &root.encode())?;

        for bnum in 2..block_count {
            let next = if bnum + 1 < block_count {
                BlockId::new(bnum as u8 + 1)
            } else {
                None
            };
            dev.write_block(bnum as u8, &FreeBlock { next }.encode())?;
        }
        info!("formatted {path}: {block_count} blocks of {BLOCK_SIZE} bytes");
        Ok(())
    }

    /// Mounts the TinyFS disk stored in `diskname`, verifying the
    /// format first. A disk that is already mounted is unmounted before
    /// the new one is opened. On failure nothing ends up mounted.
    pub fn mount(&mut self, diskname: &str) -> Result<(), TfsError> {
        if self.mounted.is_some() {
            self.unmount()?;
        }
        let vol = Volume::open(diskname)?;
        info!("mounted {diskname}: {} blocks", vol.block_count);
        self.mounted = Some(Mounted {
            name: diskname.to_owned(),
            vol,
            table: BTreeMap::new(),
            next_fd: Self::FIRST_FD,
        });
        Ok(())
    }

    /// Unmounts the current disk, dropping every open-file entry and
    /// closing the backing store. Unmounting when nothing is mounted is
    /// a no-op.
    pub fn unmount(&mut self) -> Result<(), TfsError> {
        if let Some(m) = self.mounted.take() {
            debug!("unmounted {}", m.name);
        }
        Ok(())
    }

    /// Name of the currently mounted disk, if any.
    pub fn mounted_disk(&self) -> Option<&str> {
        self.mounted.as_ref().map(|m| m.name.as_str())
    }

    fn mounted_mut(&mut self) -> Result<&mut Mounted, TfsError> {
        self.mounted.as_mut().ok_or(TfsError::NoFsMounted)
    }

    /// Opens `name` for reading and writing, creating the file if it
    /// does not exist yet.
    ///
    /// Opening a name that is already in the open-file table returns
    /// the existing descriptor. Names longer than
    /// [`MAX_FILENAME_LEN`](crate::MAX_FILENAME_LEN) bytes are
    /// truncated.
    ///
    /// # Returns
    /// - `Ok(fd)`: descriptor for the (possibly fresh) file.
    /// - `Err(TfsError::OutOfBlocks)`: no block left for a new inode.
    pub fn open_file(&mut self, name: &str) -> Result<Fd, TfsError> {
        let m = self.mounted_mut()?;
        let name = FileName::new(name);
        if let Some((&fd, _)) = m.table.iter().find(|(_, entry)| entry.name == name) {
            return Ok(fd);
        }
        if m.vol.lookup(&name)?.is_none() {
            m.vol.create_inode(name)?;
            debug!("created {name}");
        }
        let fd = Fd::new(m.next_fd);
        m.next_fd += 1;
        m.table.insert(fd, OpenFile { name, offset: 0 });
        Ok(fd)
    }

    /// Removes `fd` from the open-file table.
    pub fn close_file(&mut self, fd: Fd) -> Result<(), TfsError> {
        let m = self.mounted_mut()?;
        m.table.remove(&fd).map(|_| ()).ok_or(TfsError::InvalidFd)
    }

    /// Replaces the whole content of the open file with `data` and
    /// resets its cursor to the start of the file.
    ///
    /// The previous extents are freed before the new ones are written,
    /// so on failure part-way through the old content is already gone;
    /// the error propagates and the open-file entry is left untouched.
    pub fn write_file(&mut self, fd: Fd, data: &[u8]) -> Result<(), TfsError> {
        let m = self.mounted_mut()?;
        let name = m.entry(fd)?.name;
        let mut inode = m.vol.lookup(&name)?.ok_or(TfsError::NoInodeMatchingFd)?;
        m.vol.write_extents(&mut inode, data)?;
        debug!("wrote {} byte(s) to {name}", data.len());
        if let Some(entry) = m.table.get_mut(&fd) {
            entry.offset = 0;
        }
        Ok(())
    }

    /// Deletes the open file: frees its extent chain, unlinks its inode
    /// from the inode chain, and drops its open-file entry.
    pub fn delete_file(&mut self, fd: Fd) -> Result<(), TfsError> {
        let m = self.mounted_mut()?;
        let name = m.entry(fd)?.name;
        let mut inode = m.vol.lookup(&name)?.ok_or(TfsError::NoInodeMatchingFd)?;
        m.vol.truncate_extents(&mut inode)?;
        m.vol.unlink_inode(&inode)?;
        m.table.remove(&fd);
        debug!("deleted {name}");
        Ok(())
    }

    /// Reads the byte at the file's cursor and advances the cursor.
    ///
    /// # Returns
    /// - `Ok(byte)`: the byte at the old cursor position.
    /// - `Err(TfsError::EofError)`: the cursor sits at or past the end
    ///   of the file; the cursor does not move.
    pub fn read_byte(&mut self, fd: Fd) -> Result<u8, TfsError> {
        let m = self.mounted_mut()?;
        let entry = m.entry(fd)?;
        let (name, offset) = (entry.name, entry.offset);
        let inode = m.vol.lookup(&name)?.ok_or(TfsError::NoInodeMatchingFd)?;
        let byte = m.vol.read_byte_at(&inode, offset)?;
        if let Some(entry) = m.table.get_mut(&fd) {
            entry.offset += 1;
        }
        Ok(byte)
    }

    /// Moves the file's cursor to the absolute `offset`.
    ///
    /// No bounds check happens here; a cursor past the end surfaces as
    /// [`TfsError::EofError`] on the next [`TinyFs::read_byte`].
    pub fn seek(&mut self, fd: Fd, offset: usize) -> Result<(), TfsError> {
        let m = self.mounted_mut()?;
        let entry = m.table.get_mut(&fd).ok_or(TfsError::InvalidFd)?;
        entry.offset = offset;
        Ok(())
    }
}
