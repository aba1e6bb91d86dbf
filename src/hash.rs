//! String hashing used to place keys into slots.

/// Hashes a string key to a 32-bit value. Slots are chosen by masking the
/// result, so the low bits should carry as much of the key as possible.
pub trait StrHasher {
    fn hash_str(&self, key: &str) -> u32;
}

/// The classic ELF/PJW string hash: shift in a nibble per byte and fold the
/// top nibble back into the low bits whenever it fills.
///
/// Deterministic and unseeded. Adversarial key sets can force every key
/// into one slot; use a different `StrHasher` if keys are untrusted.
#[derive(Copy, Clone, Debug, Default)]
pub struct ElfHasher;

impl StrHasher for ElfHasher {
    #[inline]
    fn hash_str(&self, key: &str) -> u32 {
        let mut h: u32 = 0;
        for &b in key.as_bytes() {
            h = (h << 4).wrapping_add(u32::from(b));
            let g = h & 0xf000_0000;
            if g != 0 {
                h ^= g >> 24;
            }
            h &= !g;
        }
        h
    }
}

impl<T: StrHasher + ?Sized> StrHasher for &T {
    #[inline]
    fn hash_str(&self, key: &str) -> u32 {
        (**self).hash_str(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn empty_key_hashes_to_zero() {
        assert_eq!(ElfHasher.hash_str(""), 0);
    }

    #[test]
    fn short_keys_shift_in_nibbles() {
        assert_eq!(ElfHasher.hash_str("a"), 0x61);
        assert_eq!(ElfHasher.hash_str("ab"), (0x61 << 4) + 0x62);
        assert_eq!(
            ElfHasher.hash_str("abc"),
            (((0x61 << 4) + 0x62) << 4) + 0x63
        );
    }

    /// Invariant: the top nibble is always cleared, so hashes fit in 28 bits.
    #[test]
    fn top_nibble_is_folded_away() {
        for key in ["", "x", "probe_entry", "a_much_longer_function_name_here"] {
            let h = ElfHasher.hash_str(key);
            assert_eq!(h & 0xf000_0000, 0, "key {key:?} hashed to {h:#x}");
        }
    }

    /// Eight bytes is where the first fold happens: byte 0 reaches the top
    /// nibble and is xor-ed back into bits 4..8 before being masked out.
    #[test]
    fn eighth_byte_triggers_fold() {
        let mut expected: u32 = 0;
        for b in *b"zzzzzzzz" {
            expected = (expected << 4).wrapping_add(u32::from(b));
            let g = expected & 0xf000_0000;
            expected ^= g >> 24;
            expected &= !g;
        }
        assert_eq!(ElfHasher.hash_str("zzzzzzzz"), expected);
        assert_ne!(expected, 0);
    }

    #[test]
    fn case_sensitive() {
        assert_ne!(ElfHasher.hash_str("Key"), ElfHasher.hash_str("key"));
    }

    #[test]
    fn hasher_by_reference() {
        let h = ElfHasher;
        assert_eq!((&h).hash_str("abc"), h.hash_str("abc"));
    }
}
