use serde::{Deserialize, Serialize};

use super::{decode_record, encode_record, FileType};
use crate::checksum::crc32;
use crate::error::Result;
use crate::{BLOCK_SIZE, DIR_ENTRY_SIZE, INODE_DIRECT_POINTERS, INODE_SIZE};

/// Bytes covered by `inode_crc`; the trailing 8-byte checksum is excluded.
const CRC_COVERED: usize = INODE_SIZE - 8;

/// 128-byte inode table record.
///
/// | off | width | field |
/// |----:|------:|-------|
/// |   0 | 2 | mode |
/// |   2 | 2 | links |
/// |   4 | 4 | uid |
/// |   8 | 4 | gid |
/// |  12 | 8 | size_bytes |
/// |  20 | 8 | atime |
/// |  28 | 8 | mtime |
/// |  36 | 8 | ctime |
/// |  44 | 48 | direct[12] |
/// |  92 | 4 | reserved_0 |
/// |  96 | 4 | reserved_1 |
/// | 100 | 4 | reserved_2 |
/// | 104 | 4 | proj_id |
/// | 108 | 4 | uid16_gid16 |
/// | 112 | 8 | xattr_ptr |
/// | 120 | 8 | inode_crc |
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub mode: u16,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub size_bytes: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    /// Absolute block numbers, 0 = unused.
    pub direct: [u32; INODE_DIRECT_POINTERS],
    pub reserved_0: u32,
    pub reserved_1: u32,
    pub reserved_2: u32,
    pub proj_id: u32,
    pub uid16_gid16: u32,
    pub xattr_ptr: u64,
    pub inode_crc: u64,
}

impl Inode {
    /// Root directory holding only `.` and `..`.
    pub fn root(first_block: u32, now: u64) -> Self {
        let mut direct = [0; INODE_DIRECT_POINTERS];
        direct[0] = first_block;
        Self {
            mode: FileType::Directory.mode(),
            links: 2,
            size_bytes: 2 * DIR_ENTRY_SIZE as u64,
            atime: now,
            mtime: now,
            ctime: now,
            direct,
            ..Self::default()
        }
    }

    pub fn file(size_bytes: u64, blocks: &[u32], now: u64) -> Self {
        let mut direct = [0; INODE_DIRECT_POINTERS];
        direct[..blocks.len()].copy_from_slice(blocks);
        Self {
            mode: FileType::File.mode(),
            links: 1,
            size_bytes,
            atime: now,
            mtime: now,
            ctime: now,
            direct,
            ..Self::default()
        }
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mode(self.mode)
    }

    /// Blocks `size_bytes` occupies.
    pub fn block_count(&self) -> usize {
        self.size_bytes.div_ceil(BLOCK_SIZE as u64) as usize
    }

    /// Direct pointers in use, in order, stopping at the first unused one.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct.iter().copied().take_while(|&b| b != 0)
    }

    pub fn encode(&self) -> Result<[u8; INODE_SIZE]> {
        let mut buf = [0u8; INODE_SIZE];
        encode_record(self, &mut buf)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_record(bytes, INODE_SIZE)
    }

    pub fn compute_checksum(&self) -> Result<u64> {
        let buf = self.encode()?;
        Ok(crc32(&buf[..CRC_COVERED]) as u64)
    }

    pub fn finalize_checksum(&mut self) -> Result<u64> {
        self.inode_crc = self.compute_checksum()?;
        Ok(self.inode_crc)
    }

    pub fn verify_checksum(&self) -> Result<bool> {
        Ok(self.inode_crc == self.compute_checksum()?)
    }
}
