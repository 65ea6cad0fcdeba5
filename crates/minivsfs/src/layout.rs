//! Region planning.
//!
//! Layout:
//! 0: Superblock
//! 1: Inode Bitmap
//! 2: Data Bitmap
//! 3..3+N: Inode Table
//! Rest: Data

use log::debug;

use crate::error::{Error, Result};
use crate::record::Superblock;
use crate::{BITS_PER_BLOCK, BLOCK_SIZE, INODE_SIZE};

/// A run of whole blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: u64,
    pub blocks: u64,
}

impl Extent {
    pub fn new(start: u64, blocks: u64) -> Self {
        Self { start, blocks }
    }

    /// One past the last block.
    pub fn end(&self) -> u64 {
        self.start + self.blocks
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.start && block < self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub total_blocks: u64,
    pub inode_count: u64,
    pub inode_bitmap: Extent,
    pub data_bitmap: Extent,
    pub inode_table: Extent,
    pub data_region: Extent,
}

impl Layout {
    pub fn plan(total_blocks: u64, inode_count: u64) -> Result<Self> {
        if inode_count == 0 {
            return Err(Error::Capacity("inode count must be at least 1".into()));
        }
        if inode_count > BITS_PER_BLOCK {
            return Err(Error::Capacity(format!(
                "{} inodes exceed the {} a single bitmap block can track",
                inode_count, BITS_PER_BLOCK
            )));
        }

        let inode_table_blocks = (inode_count * INODE_SIZE as u64).div_ceil(BLOCK_SIZE as u64);
        let inode_bitmap = Extent::new(1, 1);
        let data_bitmap = Extent::new(inode_bitmap.end(), 1);
        let inode_table = Extent::new(data_bitmap.end(), inode_table_blocks);
        let data_start = inode_table.end();

        if total_blocks < data_start + 1 {
            return Err(Error::Capacity(format!(
                "{} inodes need {} inode table blocks; {} blocks cannot hold metadata plus one data block",
                inode_count, inode_table_blocks, total_blocks
            )));
        }

        let layout = Self {
            total_blocks,
            inode_count,
            inode_bitmap,
            data_bitmap,
            inode_table,
            data_region: Extent::new(data_start, total_blocks - data_start),
        };
        debug!("planned layout: {:?}", layout);
        Ok(layout)
    }

    /// Re-derive the layout recorded in an existing superblock and check it
    /// against what [`Layout::plan`] would produce for the same geometry.
    pub fn from_superblock(sb: &Superblock) -> Result<Self> {
        let recorded = Self {
            total_blocks: sb.total_blocks,
            inode_count: sb.inode_count,
            inode_bitmap: Extent::new(sb.inode_bitmap_start, sb.inode_bitmap_blocks),
            data_bitmap: Extent::new(sb.data_bitmap_start, sb.data_bitmap_blocks),
            inode_table: Extent::new(sb.inode_table_start, sb.inode_table_blocks),
            data_region: Extent::new(sb.data_region_start, sb.data_region_blocks),
        };

        let expected = Self::plan(sb.total_blocks, sb.inode_count)
            .map_err(|e| Error::Format(format!("superblock geometry is unusable: {e}")))?;
        if recorded != expected {
            return Err(Error::Format(format!(
                "superblock regions are inconsistent: recorded {:?}, expected {:?}",
                recorded, expected
            )));
        }
        Ok(recorded)
    }

    /// Data blocks the data bitmap can actually hand out.
    pub fn data_block_limit(&self) -> u64 {
        self.data_region.blocks.min(BITS_PER_BLOCK)
    }

    /// Absolute block number of data-region index `index`.
    pub fn data_block(&self, index: u32) -> u64 {
        self.data_region.start + index as u64
    }

    /// Byte offset of inode table slot `index` within the image.
    pub fn inode_offset(&self, index: u64) -> usize {
        self.inode_table.start as usize * BLOCK_SIZE + index as usize * INODE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_reference_geometry() {
        let layout = Layout::plan(256, 128).unwrap();
        assert_eq!(layout.inode_bitmap, Extent::new(1, 1));
        assert_eq!(layout.data_bitmap, Extent::new(2, 1));
        assert_eq!(layout.inode_table, Extent::new(3, 4));
        assert_eq!(layout.data_region, Extent::new(7, 249));
    }

    #[test]
    fn rounds_inode_table_up() {
        let layout = Layout::plan(256, 33).unwrap();
        assert_eq!(layout.inode_table.blocks, 2);
        assert_eq!(layout.data_region.start, 5);
    }

    #[test]
    fn regions_are_contiguous() {
        for inodes in [1, 32, 128, 200, 512] {
            let layout = Layout::plan(1024, inodes).unwrap();
            assert_eq!(layout.inode_bitmap.start, 1);
            assert_eq!(layout.inode_bitmap.end(), layout.data_bitmap.start);
            assert_eq!(layout.data_bitmap.end(), layout.inode_table.start);
            assert_eq!(layout.inode_table.end(), layout.data_region.start);
            assert_eq!(layout.data_region.end(), layout.total_blocks);
        }
    }

    #[test]
    fn needs_one_data_block() {
        // 3 fixed blocks + 4 table blocks = 7, no room for data.
        assert!(matches!(Layout::plan(7, 128), Err(Error::Capacity(_))));
        assert_eq!(Layout::plan(8, 128).unwrap().data_region.blocks, 1);
    }

    #[test]
    fn rejects_more_inodes_than_bitmap_bits() {
        assert!(matches!(
            Layout::plan(100_000, BITS_PER_BLOCK + 1),
            Err(Error::Capacity(_))
        ));
        assert!(matches!(Layout::plan(100, 0), Err(Error::Capacity(_))));
    }

    #[test]
    fn inode_offsets() {
        let layout = Layout::plan(256, 128).unwrap();
        assert_eq!(layout.inode_offset(0), 3 * BLOCK_SIZE);
        assert_eq!(layout.inode_offset(33), 4 * BLOCK_SIZE + INODE_SIZE);
        assert_eq!(layout.data_block(2), 9);
    }
}
