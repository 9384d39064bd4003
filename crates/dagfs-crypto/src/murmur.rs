//! MurmurHash3, x64 128-bit variant.
//!
//! Used to place directory entries into HAMT slots. The 64-bit form is the
//! first half of the 128-bit output, which is what the `murmur3-x64-64`
//! multihash (code 0x22) names.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// MurmurHash3 x64 128-bit digest, `h1` then `h2`, each big-endian.
pub fn murmur3_x64_128(data: &[u8], seed: u32) -> [u8; 16] {
    let len = data.len();
    let mut h1 = u64::from(seed);
    let mut h2 = u64::from(seed);

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        let mut k1 = read_u64_le(&block[..8]);
        let mut k2 = read_u64_le(&block[8..]);

        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    if tail.len() > 8 {
        let mut k2 = 0u64;
        for (i, byte) in tail[8..].iter().enumerate() {
            k2 ^= u64::from(*byte) << (i * 8);
        }
        h2 ^= k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
    }
    if !tail.is_empty() {
        let mut k1 = 0u64;
        for (i, byte) in tail.iter().take(8).enumerate() {
            k1 ^= u64::from(*byte) << (i * 8);
        }
        h1 ^= k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
    }

    h1 ^= len as u64;
    h2 ^= len as u64;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&h1.to_be_bytes());
    out[8..].copy_from_slice(&h2.to_be_bytes());
    out
}

/// First eight bytes of [`murmur3_x64_128`].
pub fn murmur3_x64_64(data: &[u8], seed: u32) -> [u8; 8] {
    let full = murmur3_x64_128(data, seed);
    let mut out = [0u8; 8];
    out.copy_from_slice(&full[..8]);
    out
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input_seed_zero_is_zero() {
        assert_eq!(murmur3_x64_128(b"", 0), [0u8; 16]);
    }

    #[test]
    fn seed_changes_output() {
        assert_ne!(murmur3_x64_128(b"name", 0), murmur3_x64_128(b"name", 1));
    }

    #[test]
    fn tail_lengths_all_distinct() {
        // Exercise every tail length including a full second block.
        let data: Vec<u8> = (0u8..40).collect();
        let digests: Vec<[u8; 16]> = (0..=data.len())
            .map(|n| murmur3_x64_128(&data[..n], 0))
            .collect();
        for (i, a) in digests.iter().enumerate() {
            for b in &digests[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn sixty_four_bit_is_prefix() {
        let full = murmur3_x64_128(b"file-0001.txt", 0);
        assert_eq!(&murmur3_x64_64(b"file-0001.txt", 0)[..], &full[..8]);
    }

    proptest! {
        #[test]
        fn deterministic(data in proptest::collection::vec(any::<u8>(), 0..100), seed in any::<u32>()) {
            prop_assert_eq!(murmur3_x64_128(&data, seed), murmur3_x64_128(&data, seed));
        }
    }
}
