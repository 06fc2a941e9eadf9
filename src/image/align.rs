//! Round-up helpers for image offsets.

/// Round `value` up to a multiple of `align`, which must be a power of two.
pub const fn align_pow2(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

pub const fn align4(value: usize) -> usize {
    align_pow2(value, 4)
}

pub const fn align8(value: usize) -> usize {
    align_pow2(value, 8)
}

/// Round `value` up to a multiple of `page`; `page` need not be a power of two.
pub const fn round_up(value: usize, page: usize) -> usize {
    value.div_ceil(page) * page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align8() {
        assert_eq!(align8(0), 0);
        assert_eq!(align8(1), 8);
        assert_eq!(align8(8), 8);
        assert_eq!(align8(561), 568);
    }

    #[test]
    fn test_align4() {
        assert_eq!(align4(5), 8);
        assert_eq!(align4(12), 12);
    }

    #[test]
    fn test_round_up_non_power_of_two() {
        assert_eq!(round_up(0, 24), 0);
        assert_eq!(round_up(1, 24), 24);
        assert_eq!(round_up(715, 4096), 4096);
        assert_eq!(round_up(4097, 4096), 8192);
    }
}
