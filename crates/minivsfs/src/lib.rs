//! MiniVSFS: a minimal flat-directory file system image format.
//!
//! An image is a flat sequence of [`BLOCK_SIZE`] blocks laid out as
//! superblock, inode bitmap, data bitmap, inode table and data region. Every
//! multi-byte integer on disk is little-endian.

pub mod add;
pub mod bitmap;
pub mod checksum;
pub mod config;
pub mod error;
pub mod format;
pub mod image;
pub mod inspect;
pub mod layout;
pub mod record;

pub use add::{add_file, add_file_to};
pub use config::{Geometry, Limits};
pub use error::{Error, Resource, Result};
pub use format::{format, format_with_limits};
pub use image::Image;
pub use inspect::{check, inspect, EntryInfo, Problem, Report};
pub use layout::{Extent, Layout};
pub use record::{DirEntry, FileType, Inode, InodeNumber, Superblock};

pub const BLOCK_SIZE: usize = 4096;
pub const MAGIC: u32 = 0x4D56_5346; // "MVSF"
pub const VERSION: u32 = 1;
pub const INODE_SIZE: usize = 128;
pub const DIR_ENTRY_SIZE: usize = 64;
pub const NAME_LEN: usize = 58;
pub const INODE_DIRECT_POINTERS: usize = 12;
pub const ROOT_INODE: InodeNumber = InodeNumber(1);

/// Largest file the direct pointers can address.
pub const MAX_FILE_SIZE: u64 = (INODE_DIRECT_POINTERS * BLOCK_SIZE) as u64;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
/// Resources a single bitmap block can track.
pub const BITS_PER_BLOCK: u64 = (BLOCK_SIZE * 8) as u64;

/// Seconds since the Unix epoch, as stored in every timestamp field.
pub fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
