//! Jenkins one-at-a-time hashing for structural reference keys.
//!
//! The pool indexes references by their structural key (variant tag plus
//! coordinates or folded name bytes). Every integer is fed little-endian so the
//! resulting 32-bit value is identical on every platform, which keeps
//! serialized hashes comparable across machines.

use std::hash::{BuildHasherDefault, Hash, Hasher};

/// One-at-a-time mixer. `finish` widens the 32-bit state so that hash tables
/// keyed on the high bits still see entropy.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneAtATimeHasher {
    state: u32,
}

impl OneAtATimeHasher {
    #[inline]
    fn mix(&mut self, byte: u8) {
        let mut h = self.state;
        h = h.wrapping_add(byte as u32);
        h = h.wrapping_add(h << 10);
        h ^= h >> 6;
        self.state = h;
    }

    /// Final avalanche, returning the canonical 32-bit hash.
    #[inline]
    pub fn finish32(&self) -> u32 {
        let mut h = self.state;
        h = h.wrapping_add(h << 3);
        h ^= h >> 11;
        h = h.wrapping_add(h << 15);
        h
    }
}

impl Hasher for OneAtATimeHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.mix(b);
        }
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.mix(i);
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.write(&i.to_le_bytes());
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        let h = self.finish32() as u64;
        h | (h << 32)
    }
}

pub type StructuralBuildHasher = BuildHasherDefault<OneAtATimeHasher>;

/// Hash any value with the one-at-a-time mixer.
pub fn structural_hash<T: Hash + ?Sized>(value: &T) -> u32 {
    let mut hasher = OneAtATimeHasher::default();
    value.hash(&mut hasher);
    hasher.finish32()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bytes: &[u8]) -> u32 {
        let mut h = OneAtATimeHasher::default();
        h.write(bytes);
        h.finish32()
    }

    #[test]
    fn matches_published_vectors() {
        assert_eq!(raw(b"a"), 0xca2e_9442);
        assert_eq!(
            raw(b"The quick brown fox jumps over the lazy dog"),
            0x519e_91f5
        );
    }

    #[test]
    fn integers_are_little_endian() {
        let mut a = OneAtATimeHasher::default();
        a.write_u32(0x0102_0304);
        assert_eq!(a.finish32(), raw(&[4, 3, 2, 1]));
    }

    #[test]
    fn finish_fills_high_bits() {
        let mut h = OneAtATimeHasher::default();
        h.write_u8(7);
        let wide = h.finish();
        assert_eq!(wide >> 32, wide & 0xffff_ffff);
    }
}
