use std::path::Path;

use log::info;

use crate::bitmap;
use crate::config::{Geometry, Limits};
use crate::error::Result;
use crate::image::Image;
use crate::layout::Layout;
use crate::record::{DirEntry, FileType, Inode, Superblock};
use crate::{now_epoch, BLOCK_SIZE, ROOT_INODE};

/// Create an empty image of `size_kib` KiB with `inode_count` inodes at
/// `image_path`, using the default [`Limits`].
pub fn format(image_path: &Path, size_kib: u32, inode_count: u32) -> Result<()> {
    format_with_limits(
        image_path,
        Geometry::new(size_kib, inode_count),
        &Limits::default(),
    )
}

pub fn format_with_limits(image_path: &Path, geometry: Geometry, limits: &Limits) -> Result<()> {
    geometry.validate(limits)?;
    let layout = Layout::plan(geometry.total_blocks(), geometry.inode_count as u64)?;
    let image = Image::format(&layout, now_epoch())?;
    image.save(image_path)?;

    info!(
        "created MiniVSFS image {} ({} blocks, {} inodes)",
        image_path.display(),
        layout.total_blocks,
        layout.inode_count
    );
    Ok(())
}

impl Image {
    /// Build a fresh image in memory: superblock, bitmaps with the root's
    /// inode and first data block claimed, the root inode, and a root
    /// directory block holding `.` and `..`.
    pub fn format(layout: &Layout, now: u64) -> Result<Self> {
        let bytes = vec![0u8; layout.total_blocks as usize * BLOCK_SIZE];
        let superblock = Superblock::new(layout, now);
        let mut image = Image::from_parts(bytes, superblock, *layout);
        image.write_superblock(superblock)?;

        bitmap::set(image.inode_bitmap_mut(), ROOT_INODE.index());
        bitmap::set(image.data_bitmap_mut(), 0);

        let root_block = layout.data_block(0) as u32;
        let mut root = Inode::root(root_block, now);
        root.finalize_checksum()?;
        image.write_inode(ROOT_INODE, &root)?;

        let dot = DirEntry::new(ROOT_INODE, FileType::Directory, b".");
        let dotdot = DirEntry::new(ROOT_INODE, FileType::Directory, b"..");
        image.write_dir_entry(root_block, 0, &dot);
        image.write_dir_entry(root_block, 1, &dotdot);

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::{DIR_ENTRY_SIZE, INODE_SIZE};

    #[test]
    fn reference_image_shape() {
        let layout = Layout::plan(256, 128).unwrap();
        let image = Image::format(&layout, 77).unwrap();

        assert_eq!(image.as_bytes().len(), 256 * BLOCK_SIZE);
        assert_eq!(image.superblock().mtime_epoch, 77);
        assert!(bitmap::is_set(image.inode_bitmap(), 0));
        assert_eq!(bitmap::find_free(image.inode_bitmap(), 128), Some(1));
        assert!(bitmap::is_set(image.data_bitmap(), 0));
        assert_eq!(bitmap::find_free(image.data_bitmap(), 249), Some(1));

        let root = image.root().unwrap();
        assert_eq!(root.links, 2);
        assert_eq!(root.size_bytes, 2 * DIR_ENTRY_SIZE as u64);
        assert_eq!(root.direct[0], 7);
        assert!(root.verify_checksum().unwrap());

        let entries = image.root_entries().unwrap();
        let names: Vec<_> = entries.iter().map(|(_, e)| e.name_lossy()).collect();
        assert_eq!(names, [".", ".."]);
        for (_, e) in &entries {
            assert_eq!(e.inode, ROOT_INODE);
            assert_eq!(e.file_type(), Some(FileType::Directory));
            assert!(e.verify_checksum());
        }
    }

    #[test]
    fn only_metadata_blocks_are_written() {
        let layout = Layout::plan(64, 128).unwrap();
        let image = Image::format(&layout, 0).unwrap();
        // Inode table past the root record is zero.
        let table = layout.inode_table.start as usize * BLOCK_SIZE;
        let table_end = layout.inode_table.end() as usize * BLOCK_SIZE;
        assert!(image.as_bytes()[table + INODE_SIZE..table_end]
            .iter()
            .all(|&b| b == 0));
        // Data region past the root block is zero.
        let data = (layout.data_region.start as usize + 1) * BLOCK_SIZE;
        assert!(image.as_bytes()[data..].iter().all(|&b| b == 0));
    }

    #[test]
    fn format_writes_file_of_exact_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        format(&path, 1024, 128).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024 * 1024);
        assert!(Image::open(&path).is_ok());
    }

    #[test]
    fn invalid_geometry_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        assert!(matches!(format(&path, 100, 128), Err(Error::Config(_))));
        assert!(matches!(format(&path, 1024, 9999), Err(Error::Config(_))));
        assert!(!path.exists());
    }

    #[test]
    fn capacity_is_checked_after_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.img");
        let limits = Limits {
            min_size_kib: 4,
            max_inodes: 4096,
            ..Limits::default()
        };
        // 8 blocks cannot hold 3 fixed blocks + 32 inode table blocks.
        let result = format_with_limits(&path, Geometry::new(32, 1024), &limits);
        assert!(matches!(result, Err(Error::Capacity(_))));
        assert!(!path.exists());
    }
}
