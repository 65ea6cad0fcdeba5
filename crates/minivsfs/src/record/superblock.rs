use serde::{Deserialize, Serialize};

use super::{decode_record, encode_record};
use crate::checksum::crc32;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::{BLOCK_SIZE, MAGIC, ROOT_INODE, VERSION};

pub const SUPERBLOCK_SIZE: usize = 116;

/// Byte offset of `checksum` inside the encoded record.
const CHECKSUM_OFFSET: usize = SUPERBLOCK_SIZE - 4;

/// Block 0 of every image.
///
/// | off | width | field |
/// |----:|------:|-------|
/// |   0 | 4 | magic |
/// |   4 | 4 | version |
/// |   8 | 4 | block_size |
/// |  12 | 8 | total_blocks |
/// |  20 | 8 | inode_count |
/// |  28 | 8 | inode_bitmap_start |
/// |  36 | 8 | inode_bitmap_blocks |
/// |  44 | 8 | data_bitmap_start |
/// |  52 | 8 | data_bitmap_blocks |
/// |  60 | 8 | inode_table_start |
/// |  68 | 8 | inode_table_blocks |
/// |  76 | 8 | data_region_start |
/// |  84 | 8 | data_region_blocks |
/// |  92 | 8 | root_inode |
/// | 100 | 8 | mtime_epoch |
/// | 108 | 4 | flags |
/// | 112 | 4 | checksum |
///
/// The checksum is the CRC32 of the first `BLOCK_SIZE - 4` bytes of the
/// zero-padded block encoding with `checksum` itself zeroed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    pub version: u32,
    pub block_size: u32,
    pub total_blocks: u64,
    pub inode_count: u64,
    pub inode_bitmap_start: u64,
    pub inode_bitmap_blocks: u64,
    pub data_bitmap_start: u64,
    pub data_bitmap_blocks: u64,
    pub inode_table_start: u64,
    pub inode_table_blocks: u64,
    pub data_region_start: u64,
    pub data_region_blocks: u64,
    pub root_inode: u64,
    pub mtime_epoch: u64,
    pub flags: u32,
    pub checksum: u32,
}

impl Superblock {
    /// Superblock for a freshly planned image. The checksum is left at zero;
    /// call [`Superblock::finalize_checksum`] once every field is final.
    pub fn new(layout: &Layout, now: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            block_size: BLOCK_SIZE as u32,
            total_blocks: layout.total_blocks,
            inode_count: layout.inode_count,
            inode_bitmap_start: layout.inode_bitmap.start,
            inode_bitmap_blocks: layout.inode_bitmap.blocks,
            data_bitmap_start: layout.data_bitmap.start,
            data_bitmap_blocks: layout.data_bitmap.blocks,
            inode_table_start: layout.inode_table.start,
            inode_table_blocks: layout.inode_table.blocks,
            data_region_start: layout.data_region.start,
            data_region_blocks: layout.data_region.blocks,
            root_inode: ROOT_INODE.0 as u64,
            mtime_epoch: now,
            flags: 0,
            checksum: 0,
        }
    }

    /// Encode into a zero-padded block, exactly as stored at block 0.
    pub fn encode(&self) -> Result<[u8; BLOCK_SIZE]> {
        let mut block = [0u8; BLOCK_SIZE];
        encode_record(self, &mut block)?;
        Ok(block)
    }

    pub fn compute_checksum(&self) -> Result<u32> {
        let zeroed = Self {
            checksum: 0,
            ..*self
        };
        let block = zeroed.encode()?;
        Ok(crc32(&block[..BLOCK_SIZE - 4]))
    }

    pub fn finalize_checksum(&mut self) -> Result<u32> {
        self.checksum = self.compute_checksum()?;
        Ok(self.checksum)
    }

    /// Decode and validate block 0. Any identity or checksum mismatch is a
    /// [`Error::Format`]; input shorter than the record is
    /// [`Error::Truncated`].
    ///
    /// Given a whole block, the checksum is verified against the bytes as
    /// stored, padding included.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let sb: Self = decode_record(bytes, SUPERBLOCK_SIZE)?;

        if sb.magic != MAGIC {
            return Err(Error::Format(format!(
                "bad magic {:#010x}, expected {:#010x}",
                sb.magic, MAGIC
            )));
        }
        if sb.version != VERSION {
            return Err(Error::Format(format!(
                "unsupported version {}, expected {}",
                sb.version, VERSION
            )));
        }
        if sb.block_size as usize != BLOCK_SIZE {
            return Err(Error::Format(format!(
                "block size {} does not match {}",
                sb.block_size, BLOCK_SIZE
            )));
        }
        let expected = match bytes.get(..BLOCK_SIZE) {
            Some(block) => stored_checksum(block),
            None => sb.compute_checksum()?,
        };
        if sb.checksum != expected {
            return Err(Error::Format(format!(
                "superblock checksum {:#010x} does not match computed {:#010x}",
                sb.checksum, expected
            )));
        }
        Ok(sb)
    }
}

/// CRC of a stored block 0 with its checksum field zeroed.
fn stored_checksum(block: &[u8]) -> u32 {
    let mut raw = [0u8; BLOCK_SIZE];
    raw.copy_from_slice(block);
    raw[CHECKSUM_OFFSET..SUPERBLOCK_SIZE].fill(0);
    crc32(&raw[..BLOCK_SIZE - 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Superblock {
        let layout = Layout::plan(256, 128).unwrap();
        let mut sb = Superblock::new(&layout, 1_700_000_000);
        sb.finalize_checksum().unwrap();
        sb
    }

    #[test]
    fn encodes_to_documented_offsets() {
        let sb = sample();
        let block = sb.encode().unwrap();
        let u32_at = |off: usize| u32::from_le_bytes(block[off..off + 4].try_into().unwrap());
        let u64_at = |off: usize| u64::from_le_bytes(block[off..off + 8].try_into().unwrap());

        assert_eq!(u32_at(0), MAGIC);
        assert_eq!(u32_at(4), VERSION);
        assert_eq!(u32_at(8), BLOCK_SIZE as u32);
        assert_eq!(u64_at(12), 256);
        assert_eq!(u64_at(20), 128);
        assert_eq!(u64_at(60), 3);
        assert_eq!(u64_at(68), 4);
        assert_eq!(u64_at(76), 7);
        assert_eq!(u64_at(84), 249);
        assert_eq!(u64_at(92), 1);
        assert_eq!(u64_at(100), 1_700_000_000);
        assert_eq!(u32_at(108), 0);
        assert_eq!(u32_at(CHECKSUM_OFFSET), sb.checksum);
        assert!(block[SUPERBLOCK_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn round_trips_byte_exact() {
        let sb = sample();
        let block = sb.encode().unwrap();
        let decoded = Superblock::decode(&block).unwrap();
        assert_eq!(decoded, sb);
        assert_eq!(decoded.encode().unwrap(), block);
    }

    #[test]
    fn checksum_covers_block_minus_four() {
        let sb = sample();
        let mut block = sb.encode().unwrap();
        block[CHECKSUM_OFFSET..SUPERBLOCK_SIZE].fill(0);
        assert_eq!(crc32(&block[..BLOCK_SIZE - 4]), sb.checksum);
    }

    #[test]
    fn rejects_flipped_bit() {
        let mut block = sample().encode().unwrap();
        block[14] ^= 0x01;
        assert!(matches!(Superblock::decode(&block), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_flipped_padding_bit() {
        let mut block = sample().encode().unwrap();
        block[200] ^= 0x01;
        assert!(matches!(Superblock::decode(&block), Err(Error::Format(_))));

        let mut block = sample().encode().unwrap();
        block[BLOCK_SIZE - 5] ^= 0x80;
        assert!(matches!(Superblock::decode(&block), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_wrong_identity() {
        for (off, value) in [(0usize, 0xDEAD_BEEFu32), (4, 2), (8, 512)] {
            let mut sb = sample();
            let mut block = sb.encode().unwrap();
            block[off..off + 4].copy_from_slice(&value.to_le_bytes());
            // Re-sign so only the identity field is wrong.
            sb = decode_record(&block, SUPERBLOCK_SIZE).unwrap();
            sb.finalize_checksum().unwrap();
            let block = sb.encode().unwrap();
            assert!(matches!(Superblock::decode(&block), Err(Error::Format(_))));
        }
    }

    #[test]
    fn short_input_is_truncated() {
        let block = sample().encode().unwrap();
        assert!(matches!(
            Superblock::decode(&block[..100]),
            Err(Error::Truncated { expected: 116, actual: 100 })
        ));
    }
}
