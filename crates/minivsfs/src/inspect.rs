//! Read-only views of an image: the listing report, file content
//! reassembly and a consistency check.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::warn;

use crate::bitmap;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::Extent;
use crate::record::{FileType, Inode, InodeNumber};
use crate::{BLOCK_SIZE, DIR_ENTRY_SIZE, MAX_FILE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Slot index counted across all root blocks.
    pub slot: usize,
    pub inode: InodeNumber,
    pub file_type: Option<FileType>,
    pub name: String,
    /// `None` when the entry points outside the inode table.
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub total_blocks: u64,
    pub inode_count: u64,
    pub inode_table: Extent,
    pub data_region_start: u64,
    pub root_links: u16,
    pub root_size: u64,
    pub entries: Vec<EntryInfo>,
}

/// Open and validate the image at `path` and describe it.
pub fn inspect(path: &Path) -> Result<Report> {
    Report::from_image(&Image::open(path)?)
}

impl Report {
    pub fn from_image(image: &Image) -> Result<Self> {
        let layout = image.layout();
        let root = image.root()?;
        let entries = image
            .root_entries()?
            .into_iter()
            .map(|(slot, entry)| EntryInfo {
                slot,
                inode: entry.inode,
                file_type: entry.file_type(),
                name: entry.name_lossy(),
                size: image.read_inode(entry.inode).ok().map(|i| i.size_bytes),
            })
            .collect();

        Ok(Self {
            total_blocks: layout.total_blocks,
            inode_count: layout.inode_count,
            inode_table: layout.inode_table,
            data_region_start: layout.data_region.start,
            root_links: root.links,
            root_size: root.size_bytes,
            entries,
        })
    }

    pub fn entry(&self, name: &str) -> Option<&EntryInfo> {
        self.entries.iter().find(|e| e.name == name)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "MiniVSFS: blocks={}, inodes={}, inode_tbl=[{}..{}), data_region_start={}",
            self.total_blocks,
            self.inode_count,
            self.inode_table.start,
            self.inode_table.end(),
            self.data_region_start
        )?;
        writeln!(
            f,
            "root: links={}, size={} bytes, entries={}",
            self.root_links,
            self.root_size,
            self.entries.len()
        )?;
        for e in &self.entries {
            let kind = e.file_type.map_or("?", FileType::label);
            let size = e.size.map_or_else(|| "?".to_string(), |s| s.to_string());
            writeln!(
                f,
                "entry[{:03}]: ino={} type={} size={} name='{}'",
                e.slot, e.inode.0, kind, size, e.name
            )?;
        }
        Ok(())
    }
}

impl Image {
    /// Content of the root entry called `name`.
    pub fn read_file(&self, name: &[u8]) -> Result<Vec<u8>> {
        let (_, entry) = self
            .root_entries()?
            .into_iter()
            .find(|(_, e)| e.name_bytes() == name)
            .ok_or_else(|| Error::NotFound(String::from_utf8_lossy(name).into_owned()))?;
        let inode = self.read_inode(entry.inode)?;
        self.read_inode_data(&inode)
    }

    /// Reassemble `size_bytes` of content from the inode's direct blocks.
    pub fn read_inode_data(&self, inode: &Inode) -> Result<Vec<u8>> {
        if inode.size_bytes > MAX_FILE_SIZE {
            return Err(Error::Format(format!(
                "inode size {} exceeds direct block capacity",
                inode.size_bytes
            )));
        }
        let size = inode.size_bytes as usize;
        let mut out = Vec::with_capacity(size);
        for block in inode.blocks() {
            if out.len() == size {
                break;
            }
            let take = (size - out.len()).min(BLOCK_SIZE);
            out.extend_from_slice(&self.data_block(block)?[..take]);
        }
        if out.len() != size {
            return Err(Error::Format(format!(
                "inode claims {} bytes but its blocks hold {}",
                size,
                out.len()
            )));
        }
        Ok(out)
    }
}

/// An inconsistency found by [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    InodeChecksum(InodeNumber),
    EntryChecksum { slot: usize },
    DanglingEntry { slot: usize, inode: InodeNumber },
    BlockOutsideData { inode: InodeNumber, block: u32 },
    BlockNotAllocated { inode: InodeNumber, block: u32 },
    BlockShared { block: u32, first: InodeNumber, second: InodeNumber },
    UnreferencedBlock { block: u64 },
    SizeMismatch { inode: InodeNumber, size: u64, blocks: usize },
    RootSizeMismatch { size: u64, entries: usize },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::InodeChecksum(ino) => write!(f, "inode {ino}: checksum mismatch"),
            Problem::EntryChecksum { slot } => write!(f, "root entry {slot}: checksum mismatch"),
            Problem::DanglingEntry { slot, inode } => {
                write!(f, "root entry {slot}: inode {inode} is not allocated")
            }
            Problem::BlockOutsideData { inode, block } => {
                write!(f, "inode {inode}: block {block} is outside the data region")
            }
            Problem::BlockNotAllocated { inode, block } => {
                write!(f, "inode {inode}: block {block} is not marked in the data bitmap")
            }
            Problem::BlockShared {
                block,
                first,
                second,
            } => write!(f, "block {block} is used by inodes {first} and {second}"),
            Problem::UnreferencedBlock { block } => {
                write!(f, "block {block} is marked allocated but unreferenced")
            }
            Problem::SizeMismatch {
                inode,
                size,
                blocks,
            } => write!(f, "inode {inode}: {size} bytes but {blocks} direct blocks"),
            Problem::RootSizeMismatch { size, entries } => {
                write!(f, "root: size {size} but {entries} entries")
            }
        }
    }
}

/// Cross-check bitmaps, inodes and root entries. The image has already
/// passed the structural validation done when it was loaded.
pub fn check(image: &Image) -> Result<Vec<Problem>> {
    let layout = *image.layout();
    let mut problems = Vec::new();
    let mut owners: HashMap<u32, InodeNumber> = HashMap::new();

    for index in 0..layout.inode_count as u32 {
        if !bitmap::is_set(image.inode_bitmap(), index) {
            continue;
        }
        let number = InodeNumber::from_index(index);
        let inode = image.read_inode(number)?;
        if !inode.verify_checksum()? {
            problems.push(Problem::InodeChecksum(number));
        }

        let blocks: Vec<u32> = inode.blocks().collect();
        if inode.file_type() == Some(FileType::File) && blocks.len() != inode.block_count() {
            problems.push(Problem::SizeMismatch {
                inode: number,
                size: inode.size_bytes,
                blocks: blocks.len(),
            });
        }
        for block in blocks {
            if !layout.data_region.contains(block as u64) {
                problems.push(Problem::BlockOutsideData {
                    inode: number,
                    block,
                });
                continue;
            }
            let data_index = (block as u64 - layout.data_region.start) as u32;
            if !bitmap::is_set(image.data_bitmap(), data_index) {
                problems.push(Problem::BlockNotAllocated {
                    inode: number,
                    block,
                });
            }
            if let Some(first) = owners.insert(block, number) {
                problems.push(Problem::BlockShared {
                    block,
                    first,
                    second: number,
                });
            }
        }
    }

    for index in 0..layout.data_block_limit() as u32 {
        let block = layout.data_block(index);
        if bitmap::is_set(image.data_bitmap(), index) && !owners.contains_key(&(block as u32)) {
            problems.push(Problem::UnreferencedBlock { block });
        }
    }

    let root = image.root()?;
    let mut occupied = 0;
    for (slot, entry) in image.dir_slots(&root)? {
        if entry.is_free() {
            continue;
        }
        occupied += 1;
        if !entry.verify_checksum() {
            problems.push(Problem::EntryChecksum { slot });
        }
        let allocated = entry.inode.0 as u64 <= layout.inode_count
            && bitmap::is_set(image.inode_bitmap(), entry.inode.index());
        if !allocated {
            problems.push(Problem::DanglingEntry {
                slot,
                inode: entry.inode,
            });
        }
    }
    if root.size_bytes != occupied as u64 * DIR_ENTRY_SIZE as u64 {
        problems.push(Problem::RootSizeMismatch {
            size: root.size_bytes,
            entries: occupied,
        });
    }

    for problem in &problems {
        warn!("{problem}");
    }
    Ok(problems)
}
