//! A whole image held in memory.
//!
//! Images are small and bounded, so every operation loads the complete file,
//! validates it, mutates the private copy and writes it back in one piece.

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::bitmap;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::record::{DirEntry, FileType, Inode, InodeNumber, Superblock};
use crate::{BLOCK_SIZE, DIR_ENTRY_SIZE, ENTRIES_PER_BLOCK, INODE_SIZE, ROOT_INODE};

#[derive(Debug, Clone)]
pub struct Image {
    bytes: Vec<u8>,
    superblock: Superblock,
    layout: Layout,
}

impl Image {
    /// Wrap an already-initialised buffer. Used by the formatter, which
    /// builds a consistent image from scratch.
    pub(crate) fn from_parts(bytes: Vec<u8>, superblock: Superblock, layout: Layout) -> Self {
        Self {
            bytes,
            superblock,
            layout,
        }
    }

    /// Validate `bytes` as an image: superblock identity and checksum, file
    /// length against the declared block count, region geometry and the
    /// root inode.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let actual = bytes.len() as u64;
        if bytes.len() < BLOCK_SIZE {
            return Err(Error::Truncated {
                expected: BLOCK_SIZE as u64,
                actual,
            });
        }

        let superblock = Superblock::decode(&bytes[..BLOCK_SIZE])?;
        let expected = superblock
            .total_blocks
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or_else(|| {
                Error::Format(format!(
                    "block count {} overflows",
                    superblock.total_blocks
                ))
            })?;
        if actual < expected {
            return Err(Error::Truncated { expected, actual });
        }
        if actual != expected {
            return Err(Error::Format(format!(
                "image is {actual} bytes but the superblock declares {expected}"
            )));
        }
        let layout = Layout::from_superblock(&superblock)?;
        if superblock.root_inode != ROOT_INODE.0 as u64 {
            return Err(Error::Format(format!(
                "root inode is {}, expected {}",
                superblock.root_inode, ROOT_INODE.0
            )));
        }

        let image = Self {
            bytes,
            superblock,
            layout,
        };

        if !bitmap::is_set(image.inode_bitmap(), ROOT_INODE.index()) {
            return Err(Error::Format("root inode is not marked allocated".into()));
        }
        let root = image.root()?;
        if !root.verify_checksum()? {
            return Err(Error::Format("root inode checksum mismatch".into()));
        }
        if root.file_type() != Some(FileType::Directory) {
            return Err(Error::Format(format!(
                "root inode mode {:#o} is not a directory",
                root.mode
            )));
        }
        Ok(image)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        debug!("read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(bytes)
    }

    /// Write the image to `path` through a sibling temporary file that is
    /// renamed into place, so a failed write never leaves partial output.
    /// An existing target keeps its permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path).map_err(|e| Error::io(path, e))?;
        let permissions = fs::metadata(path).ok().map(|m| m.permissions());
        let result = write_synced(&tmp, &self.bytes, permissions)
            .and_then(|()| fs::rename(&tmp, path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(Error::io(path, e));
        }
        debug!("wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Re-sign `superblock` and store it at block 0.
    pub fn write_superblock(&mut self, mut superblock: Superblock) -> Result<()> {
        superblock.finalize_checksum()?;
        let block = superblock.encode()?;
        self.bytes[..BLOCK_SIZE].copy_from_slice(&block);
        self.superblock = superblock;
        Ok(())
    }

    pub fn block(&self, block: u64) -> &[u8] {
        let start = block as usize * BLOCK_SIZE;
        &self.bytes[start..start + BLOCK_SIZE]
    }

    pub fn block_mut(&mut self, block: u64) -> &mut [u8] {
        let start = block as usize * BLOCK_SIZE;
        &mut self.bytes[start..start + BLOCK_SIZE]
    }

    /// A block referenced by a direct pointer, checked to lie in the data
    /// region.
    pub fn data_block(&self, block: u32) -> Result<&[u8]> {
        if !self.layout.data_region.contains(block as u64) {
            return Err(Error::Format(format!(
                "block {} is outside the data region {:?}",
                block, self.layout.data_region
            )));
        }
        Ok(self.block(block as u64))
    }

    pub fn inode_bitmap(&self) -> &[u8] {
        self.block(self.layout.inode_bitmap.start)
    }

    pub fn inode_bitmap_mut(&mut self) -> &mut [u8] {
        self.block_mut(self.layout.inode_bitmap.start)
    }

    pub fn data_bitmap(&self) -> &[u8] {
        self.block(self.layout.data_bitmap.start)
    }

    pub fn data_bitmap_mut(&mut self) -> &mut [u8] {
        self.block_mut(self.layout.data_bitmap.start)
    }

    fn inode_range(&self, inode: InodeNumber) -> Result<std::ops::Range<usize>> {
        if inode.0 == 0 || inode.0 as u64 > self.layout.inode_count {
            return Err(Error::Format(format!(
                "inode {} is outside 1..={}",
                inode, self.layout.inode_count
            )));
        }
        let start = self.layout.inode_offset(inode.index() as u64);
        Ok(start..start + INODE_SIZE)
    }

    pub fn read_inode(&self, inode: InodeNumber) -> Result<Inode> {
        let range = self.inode_range(inode)?;
        Inode::decode(&self.bytes[range])
    }

    /// Store `record` as given; callers finalize its checksum first.
    pub fn write_inode(&mut self, inode: InodeNumber, record: &Inode) -> Result<()> {
        let range = self.inode_range(inode)?;
        let encoded = record.encode()?;
        self.bytes[range].copy_from_slice(&encoded);
        Ok(())
    }

    pub fn root(&self) -> Result<Inode> {
        self.read_inode(ROOT_INODE)
    }

    /// Every slot of every block the directory owns, in on-disk order, as
    /// `(slot, entry)` where `slot` counts across blocks.
    pub fn dir_slots(&self, dir: &Inode) -> Result<Vec<(usize, DirEntry)>> {
        let mut slots = Vec::new();
        for (d, block) in dir.blocks().enumerate() {
            let data = self.data_block(block)?;
            for (i, raw) in data.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
                slots.push((d * ENTRIES_PER_BLOCK + i, DirEntry::decode(raw)?));
            }
        }
        Ok(slots)
    }

    /// Occupied entries of the root directory.
    pub fn root_entries(&self) -> Result<Vec<(usize, DirEntry)>> {
        let root = self.root()?;
        Ok(self
            .dir_slots(&root)?
            .into_iter()
            .filter(|(_, e)| !e.is_free())
            .collect())
    }

    pub(crate) fn write_dir_entry(&mut self, block: u32, slot: usize, entry: &DirEntry) {
        let start = block as usize * BLOCK_SIZE + slot * DIR_ENTRY_SIZE;
        self.bytes[start..start + DIR_ENTRY_SIZE].copy_from_slice(&entry.encode());
    }
}

fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "image path has no file name")
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

fn write_synced(path: &Path, bytes: &[u8], permissions: Option<Permissions>) -> io::Result<()> {
    let mut file = File::create(path)?;
    if let Some(permissions) = permissions {
        file.set_permissions(permissions)?;
    }
    file.write_all(bytes)?;
    file.sync_all()
}
