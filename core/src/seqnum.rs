//! Serial number arithmetic (RFC 1982) for AODV sequence numbers and OLSRv2 ANSNs.

/// `a` is newer than `b`.
///
/// The unsigned difference is read as a two's-complement value, so
/// `seq_greater(0, 0xFFFF_FFFF)` holds and equal numbers are never greater.
pub fn seq_greater(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// `a` is the same as or older than `b`.
pub fn seq_less_or_equal(a: u32, b: u32) -> bool {
    !seq_greater(a, b)
}

/// The 16-bit variant used by RFC 5444 message sequence numbers and ANSNs.
pub fn seq_greater_u16(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_is_greater_even_at_wraparound() {
        for &a in &[0u32, 1, 0x7FFF_FFFF, 0x8000_0000, 0xFFFF_FFFE, 0xFFFF_FFFF] {
            assert!(seq_greater(a.wrapping_add(1), a), "a = {:#x}", a);
            assert!(!seq_greater(a, a.wrapping_add(1)), "a = {:#x}", a);
        }
    }

    #[test]
    fn equal_is_not_greater() {
        for &a in &[0u32, 42, 0xFFFF_FFFF] {
            assert!(!seq_greater(a, a));
            assert!(seq_less_or_equal(a, a));
        }
    }

    #[test]
    fn comparison_is_antisymmetric() {
        let pairs = [(1u32, 2u32), (0xFFFF_FFF0, 0x10), (100, 0x8000_0010)];
        for &(a, b) in pairs.iter() {
            assert_ne!(seq_greater(a, b), seq_greater(b, a), "{} vs {}", a, b);
        }
    }

    #[test]
    fn short_numbers_wrap() {
        assert!(seq_greater_u16(0, 0xFFFF));
        assert!(!seq_greater_u16(7, 7));
        assert!(seq_greater_u16(0x8000, 1));
    }
}
