//! BKDR string hash used to place ROFS entries into buckets.

/// Multiplier of the rolling hash.
const SEED: u32 = 131;

/// Mask applied after every step; keeps the accumulator within 31 bits.
const MASK: u32 = 0x7fff_ffff;

/// Hash a name with the BKDR rolling hash.
///
/// The accumulator is masked after every character, so wrapping arithmetic
/// on `u32` yields the same low 31 bits as unbounded arithmetic would.
pub fn bkdr(name: &str) -> u32 {
    name.bytes().fold(0u32, |hash, byte| {
        hash.wrapping_mul(SEED).wrapping_add(u32::from(byte)) & MASK
    })
}

/// Bucket index of `name` in a table of `bucket_count` slots.
pub fn bucket_of(name: &str, bucket_count: usize) -> usize {
    bkdr(name) as usize % bucket_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_hashes_to_zero() {
        assert_eq!(bkdr(""), 0);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(bkdr("a"), 97);
        assert_eq!(bkdr("a.js"), 218_868_234);
        assert_eq!(bkdr("b/c.json"), 1_538_296_200);
        assert_eq!(bkdr("index.js"), 1_513_211_289);
    }

    #[test]
    fn test_bucket_placement() {
        assert_eq!(bucket_of("a.js", 64), 10);
        assert_eq!(bucket_of("b/c.json", 64), 8);
        // Collides with b/c.json
        assert_eq!(bucket_of("package.json", 64), 8);
    }

    #[test]
    fn test_long_names_stay_within_31_bits() {
        let name = "ruff_modules/some-driver/src/very/deep/path/index.js".repeat(8);
        assert!(bkdr(&name) <= MASK);
    }
}
