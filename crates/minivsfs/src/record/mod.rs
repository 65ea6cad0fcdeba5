//! Fixed-size on-disk records.
//!
//! `Superblock` and `Inode` go through `bincode` with fixed-width
//! little-endian integers: fields are written back to back in declaration
//! order, arrays without a length prefix, no padding. `DirEntry` carries a
//! 58-byte name and is laid out by hand.

mod dir_entry;
mod inode;
mod superblock;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use dir_entry::DirEntry;
pub use inode::Inode;
pub use superblock::{Superblock, SUPERBLOCK_SIZE};

pub const MODE_TYPE_MASK: u16 = 0o170000;
pub const MODE_DIR: u16 = 0o040000;
pub const MODE_FILE: u16 = 0o100000;

/// 1-based inode number. Number `n` occupies inode table slot and bitmap
/// bit `n - 1`; 0 marks a free directory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    pub fn from_index(index: u32) -> Self {
        Self(index + 1)
    }

    /// Table slot of a non-zero inode number.
    pub fn index(self) -> u32 {
        self.0 - 1
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    File = 1,
    Directory = 2,
}

impl FileType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(FileType::File),
            2 => Some(FileType::Directory),
            _ => None,
        }
    }

    pub fn from_mode(mode: u16) -> Option<Self> {
        match mode & MODE_TYPE_MASK {
            MODE_FILE => Some(FileType::File),
            MODE_DIR => Some(FileType::Directory),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn mode(self) -> u16 {
        match self {
            FileType::File => MODE_FILE,
            FileType::Directory => MODE_DIR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Directory => "dir",
        }
    }
}

fn codec_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Serialize `value` at the start of `dst`, returning the encoded length.
pub(crate) fn encode_record<T: Serialize>(value: &T, dst: &mut [u8]) -> Result<usize> {
    bincode::serde::encode_into_slice(value, dst, codec_config())
        .map_err(|e| Error::Format(format!("record encoding failed: {e}")))
}

/// Deserialize a record of exactly `size` bytes from the start of `src`.
pub(crate) fn decode_record<T: DeserializeOwned>(src: &[u8], size: usize) -> Result<T> {
    if src.len() < size {
        return Err(Error::Truncated {
            expected: size as u64,
            actual: src.len() as u64,
        });
    }
    let (value, read) = bincode::serde::decode_from_slice(&src[..size], codec_config())
        .map_err(|e| Error::Format(format!("record decoding failed: {e}")))?;
    if read != size {
        return Err(Error::Format(format!(
            "record decoded from {read} bytes, expected {size}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_numbers_are_one_based() {
        assert_eq!(InodeNumber::from_index(0), InodeNumber(1));
        assert_eq!(InodeNumber(7).index(), 6);
        assert_eq!(InodeNumber(3).to_string(), "#3");
    }

    #[test]
    fn file_type_tags_and_modes() {
        assert_eq!(FileType::from_tag(1), Some(FileType::File));
        assert_eq!(FileType::from_tag(2), Some(FileType::Directory));
        assert_eq!(FileType::from_tag(0), None);
        assert_eq!(FileType::from_mode(0o100644), Some(FileType::File));
        assert_eq!(FileType::from_mode(MODE_DIR), Some(FileType::Directory));
        assert_eq!(FileType::from_mode(0o120000), None);
    }
}
