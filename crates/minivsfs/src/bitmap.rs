//! First-fit allocation over a bitmap block.
//!
//! Bit `i` lives in byte `i / 8` at position `i % 8`; a set bit marks the
//! resource as allocated. `limit` bounds every scan so bits past the end of
//! the tracked table are never handed out.

fn locate(index: u32) -> (usize, u8) {
    ((index / 8) as usize, 1 << (index % 8))
}

pub fn is_set(bits: &[u8], index: u32) -> bool {
    let (byte, mask) = locate(index);
    bits.get(byte).is_some_and(|b| b & mask != 0)
}

pub fn set(bits: &mut [u8], index: u32) {
    let (byte, mask) = locate(index);
    bits[byte] |= mask;
}

pub fn clear(bits: &mut [u8], index: u32) {
    let (byte, mask) = locate(index);
    bits[byte] &= !mask;
}

/// Lowest clear bit below `limit`.
pub fn find_free(bits: &[u8], limit: u32) -> Option<u32> {
    free_indices(bits, limit).next()
}

pub fn count_set(bits: &[u8], limit: u32) -> u32 {
    (0..limit).filter(|&i| is_set(bits, i)).count() as u32
}

fn free_indices(bits: &[u8], limit: u32) -> impl Iterator<Item = u32> + '_ {
    let limit = limit.min((bits.len() * 8) as u32);
    (0..limit).filter(move |&i| !is_set(bits, i))
}

/// Claim the `count` lowest free bits. Either every bit is claimed and the
/// indices come back in ascending order, or the bitmap is left untouched.
pub fn allocate(bits: &mut [u8], limit: u32, count: usize) -> Option<Vec<u32>> {
    let picked: Vec<u32> = free_indices(bits, limit).take(count).collect();
    if picked.len() < count {
        return None;
    }
    for &index in &picked {
        set(bits, index);
    }
    Some(picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bit_order_is_lsb_first() {
        let mut bits = [0u8; 4];
        set(&mut bits, 0);
        set(&mut bits, 9);
        assert_eq!(bits, [0b0000_0001, 0b0000_0010, 0, 0]);
        assert!(is_set(&bits, 9));
        assert!(!is_set(&bits, 8));
    }

    #[test]
    fn set_and_clear_are_idempotent() {
        let mut bits = [0u8; 2];
        set(&mut bits, 3);
        set(&mut bits, 3);
        assert_eq!(bits[0], 0b1000);
        clear(&mut bits, 3);
        clear(&mut bits, 3);
        assert_eq!(bits[0], 0);
    }

    #[test]
    fn find_free_respects_limit() {
        let mut bits = [0xFFu8, 0x00];
        assert_eq!(find_free(&bits, 8), None);
        assert_eq!(find_free(&bits, 16), Some(8));
        bits[0] = 0b1111_1011;
        assert_eq!(find_free(&bits, 8), Some(2));
    }

    #[test]
    fn out_of_range_is_unset() {
        assert!(!is_set(&[0xFF], 8));
        assert_eq!(find_free(&[0xFF], 100), None);
    }

    #[test]
    fn allocate_skips_used_bits() {
        let mut bits = [0b0000_0101u8, 0];
        assert_eq!(allocate(&mut bits, 16, 3), Some(vec![1, 3, 4]));
        assert_eq!(bits[0], 0b0001_1111);
    }

    #[test]
    fn allocate_is_all_or_nothing() {
        let mut bits = [0b1110_1110u8];
        let before = bits;
        assert_eq!(allocate(&mut bits, 8, 3), None);
        assert_eq!(bits, before);
        assert_eq!(allocate(&mut bits, 8, 0), Some(vec![]));
    }

    proptest! {
        #[test]
        fn allocation_is_ascending_first_fit(
            seed in proptest::collection::vec(any::<u8>(), 8),
            count in 0usize..20,
        ) {
            let mut bits = seed.clone();
            let limit = 64;
            let free_before = limit - count_set(&seed, limit);
            match allocate(&mut bits, limit, count) {
                Some(picked) => {
                    prop_assert_eq!(picked.len(), count);
                    prop_assert!(picked.windows(2).all(|w| w[0] < w[1]));
                    // Nothing free was skipped below the highest pick.
                    if let Some(&last) = picked.last() {
                        for i in 0..last {
                            prop_assert!(is_set(&bits, i));
                        }
                    }
                    prop_assert_eq!(count_set(&bits, limit), limit - free_before + count as u32);
                }
                None => {
                    prop_assert!((free_before as usize) < count);
                    prop_assert_eq!(bits, seed);
                }
            }
        }
    }
}
