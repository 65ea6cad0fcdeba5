use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::bitmap;
use crate::error::{Error, Resource, Result};
use crate::image::Image;
use crate::record::{DirEntry, FileType, Inode, InodeNumber};
use crate::{
    now_epoch, BLOCK_SIZE, DIR_ENTRY_SIZE, ENTRIES_PER_BLOCK, INODE_DIRECT_POINTERS,
    MAX_FILE_SIZE, NAME_LEN, ROOT_INODE,
};

/// Add `source_path` to the root of the image at `image_path`, in place.
pub fn add_file(image_path: &Path, source_path: &Path) -> Result<InodeNumber> {
    add_file_to(image_path, image_path, source_path)
}

/// Read the image at `input`, add `source_path` under its base name and
/// write the result to `output`. On failure nothing is written.
pub fn add_file_to(input: &Path, output: &Path, source_path: &Path) -> Result<InodeNumber> {
    let mut image = Image::open(input)?;
    let name = source_name(source_path)?;
    let data = read_source(source_path)?;

    let inode = image.add_file(name, &data, now_epoch())?;
    image.save(output)?;

    info!(
        "added {} ({} bytes) as inode {} into {} -> {}",
        source_path.display(),
        data.len(),
        inode,
        input.display(),
        output.display()
    );
    Ok(inode)
}

fn source_name(path: &Path) -> Result<&[u8]> {
    path.file_name()
        .map(|name| name.as_encoded_bytes())
        .ok_or_else(|| Error::InvalidSource {
            path: path.to_path_buf(),
            reason: "path has no file name",
        })
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    if !meta.is_file() {
        return Err(Error::InvalidSource {
            path: path.to_path_buf(),
            reason: "not a regular file",
        });
    }
    let too_large = |size: u64| Error::FileTooLarge {
        path: path.to_path_buf(),
        size,
        max: MAX_FILE_SIZE,
    };
    if meta.len() > MAX_FILE_SIZE {
        return Err(too_large(meta.len()));
    }
    let data = fs::read(path).map_err(|e| Error::io(path, e))?;
    if data.len() as u64 > MAX_FILE_SIZE {
        return Err(too_large(data.len() as u64));
    }
    Ok(data)
}

/// Where the new directory entry goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// A free slot in a block the root already owns.
    Existing { block: u32, slot: usize },
    /// A fresh block registered at root direct pointer `pointer`.
    Extend { pointer: usize },
}

impl Image {
    /// Link `data` into the root directory as `name` (truncated to the name
    /// field). Everything that can fail is checked before the image changes.
    pub fn add_file(&mut self, name: &[u8], data: &[u8], now: u64) -> Result<InodeNumber> {
        let name = &name[..name.len().min(NAME_LEN)];
        let display_name = || String::from_utf8_lossy(name).into_owned();

        let blocks_needed = data.len().div_ceil(BLOCK_SIZE);
        if blocks_needed > INODE_DIRECT_POINTERS {
            return Err(Error::EntryTooLarge {
                name: display_name(),
                size: data.len() as u64,
                max: MAX_FILE_SIZE,
            });
        }
        if name.is_empty() {
            return Err(Error::InvalidName {
                name: display_name(),
                reason: "name is empty",
            });
        }

        let mut root = self.root()?;
        let placement = self.plan_entry(&root, name)?;

        let inode_limit = self.layout().inode_count as u32;
        let inode_index = bitmap::find_free(self.inode_bitmap(), inode_limit).ok_or(
            Error::NoSpace {
                resource: Resource::Inodes,
                needed: 1,
                available: 0,
            },
        )?;

        // Claim data blocks on a scratch copy so a shortfall leaves the
        // bitmap as it was.
        let wanted = blocks_needed + matches!(placement, Placement::Extend { .. }) as usize;
        let data_limit = self.layout().data_block_limit() as u32;
        let mut data_bits = self.data_bitmap().to_vec();
        let Some(indices) = bitmap::allocate(&mut data_bits, data_limit, wanted) else {
            return Err(Error::NoSpace {
                resource: Resource::DataBlocks,
                needed: wanted as u64,
                available: (data_limit - bitmap::count_set(self.data_bitmap(), data_limit))
                    as u64,
            });
        };
        let blocks: Vec<u32> = indices[..blocks_needed]
            .iter()
            .map(|&i| self.layout().data_block(i) as u32)
            .collect();

        let number = InodeNumber::from_index(inode_index);
        let mut inode = Inode::file(data.len() as u64, &blocks, now);
        inode.finalize_checksum()?;
        debug!(
            "{:?}: inode {}, blocks {:?}, entry {:?}",
            display_name(),
            number,
            blocks,
            placement
        );

        self.data_bitmap_mut().copy_from_slice(&data_bits);
        bitmap::set(self.inode_bitmap_mut(), inode_index);
        self.write_inode(number, &inode)?;

        for (chunk, &block) in data.chunks(BLOCK_SIZE).zip(&blocks) {
            let dst = self.block_mut(block as u64);
            dst[..chunk.len()].copy_from_slice(chunk);
            dst[chunk.len()..].fill(0);
        }

        let (dir_block, slot) = match placement {
            Placement::Existing { block, slot } => (block, slot),
            Placement::Extend { pointer } => {
                let block = self.layout().data_block(indices[blocks_needed]) as u32;
                self.block_mut(block as u64).fill(0);
                root.direct[pointer] = block;
                (block, 0)
            }
        };
        let entry = DirEntry::new(number, FileType::File, name);
        self.write_dir_entry(dir_block, slot, &entry);

        // Root keeps its two links; only size and times move.
        root.size_bytes += DIR_ENTRY_SIZE as u64;
        root.mtime = now;
        root.ctime = now;
        root.finalize_checksum()?;
        self.write_inode(ROOT_INODE, &root)?;

        let mut superblock = *self.superblock();
        superblock.mtime_epoch = now;
        self.write_superblock(superblock)?;

        Ok(number)
    }

    fn plan_entry(&self, root: &Inode, name: &[u8]) -> Result<Placement> {
        let slots = self.dir_slots(root)?;
        if slots
            .iter()
            .any(|(_, e)| !e.is_free() && e.name_bytes() == name)
        {
            return Err(Error::NameExists(String::from_utf8_lossy(name).into_owned()));
        }

        if let Some(&(slot, _)) = slots.iter().find(|(_, e)| e.is_free()) {
            return Ok(Placement::Existing {
                block: root.direct[slot / ENTRIES_PER_BLOCK],
                slot: slot % ENTRIES_PER_BLOCK,
            });
        }

        root.direct
            .iter()
            .position(|&b| b == 0)
            .map(|pointer| Placement::Extend { pointer })
            .ok_or(Error::DirectoryFull)
    }
}
