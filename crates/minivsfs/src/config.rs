//! Requested image geometry and the bounds it is checked against.

use crate::error::{Error, Result};
use crate::BLOCK_SIZE;

/// Size and inode count requested for a new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub size_kib: u32,
    pub inode_count: u32,
}

/// Accepted ranges for [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min_size_kib: u32,
    pub max_size_kib: u32,
    /// Size must be a multiple of this (one block).
    pub size_step_kib: u32,
    pub min_inodes: u32,
    pub max_inodes: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_size_kib: 180,
            max_size_kib: 4096,
            size_step_kib: (BLOCK_SIZE / 1024) as u32,
            min_inodes: 128,
            max_inodes: 512,
        }
    }
}

impl Geometry {
    pub fn new(size_kib: u32, inode_count: u32) -> Self {
        Self {
            size_kib,
            inode_count,
        }
    }

    pub fn validate(&self, limits: &Limits) -> Result<()> {
        if self.size_kib < limits.min_size_kib
            || self.size_kib > limits.max_size_kib
            || limits.size_step_kib == 0
            || self.size_kib % limits.size_step_kib != 0
        {
            return Err(Error::Config(format!(
                "size must be in [{}..{}] KiB and a multiple of {} KiB, got {}",
                limits.min_size_kib, limits.max_size_kib, limits.size_step_kib, self.size_kib
            )));
        }
        if (self.size_kib as u64 * 1024) % BLOCK_SIZE as u64 != 0 {
            return Err(Error::Config(format!(
                "size {} KiB is not a whole number of {}-byte blocks",
                self.size_kib, BLOCK_SIZE
            )));
        }
        if self.inode_count < limits.min_inodes || self.inode_count > limits.max_inodes {
            return Err(Error::Config(format!(
                "inode count must be in [{}..{}], got {}",
                limits.min_inodes, limits.max_inodes, self.inode_count
            )));
        }
        Ok(())
    }

    pub fn total_blocks(&self) -> u64 {
        self.size_kib as u64 * 1024 / BLOCK_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        let limits = Limits::default();
        assert!(Geometry::new(180, 128).validate(&limits).is_ok());
        assert!(Geometry::new(4096, 512).validate(&limits).is_ok());
        assert!(Geometry::new(1024, 200).validate(&limits).is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        let limits = Limits::default();
        for g in [
            Geometry::new(176, 128),
            Geometry::new(4100, 128),
            Geometry::new(1026, 128),
            Geometry::new(1024, 127),
            Geometry::new(1024, 513),
        ] {
            assert!(
                matches!(g.validate(&limits), Err(Error::Config(_))),
                "{g:?} should be rejected"
            );
        }
    }

    #[test]
    fn total_blocks_from_kib() {
        assert_eq!(Geometry::new(1024, 128).total_blocks(), 256);
        assert_eq!(Geometry::new(180, 128).total_blocks(), 45);
    }
}
