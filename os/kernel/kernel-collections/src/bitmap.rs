/// A fixed-length bit array over borrowed storage.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`. A clear bit means
/// "free", a set bit means "in use". The length is counted in bits, so pools
/// whose size is not a multiple of eight still get every page.
///
/// Every accessor checks the index against the length and panics when it is
/// out of range.
pub struct Bitmap {
    bits: &'static mut [u8],
    len: usize,
}

impl Bitmap {
    /// Wraps `bits` as a bitmap of `len` bits. The contents are left as they
    /// are; call [`init`](Self::init) to clear them.
    ///
    /// # Panics
    /// If `bits` holds fewer than `len` bits.
    pub fn new(bits: &'static mut [u8], len: usize) -> Self {
        assert!(
            len.div_ceil(8) <= bits.len(),
            "bitmap storage of {} bytes cannot hold {len} bits",
            bits.len()
        );
        Self { bits, len }
    }

    /// Marks every bit free.
    pub fn init(&mut self) {
        self.bits.fill(0);
    }

    /// Number of bits.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether bit `index` is set.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[inline]
    #[must_use]
    pub fn test(&self, index: usize) -> bool {
        self.check(index);
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    /// Sets bit `index` to `value`.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        self.check(index);
        let mask = 1 << (index % 8);
        if value {
            self.bits[index / 8] |= mask;
        } else {
            self.bits[index / 8] &= !mask;
        }
    }

    /// Sets `count` bits starting at `start` to `value`.
    ///
    /// # Panics
    /// If the range reaches past the end.
    pub fn set_range(&mut self, start: usize, count: usize, value: bool) {
        for index in start..start + count {
            self.set(index, value);
        }
    }

    /// Finds the first run of `run` consecutive free bits and returns the
    /// index of its first bit.
    ///
    /// Leading bytes that are completely in use are skipped without looking
    /// at individual bits. The bitmap is never modified.
    ///
    /// # Panics
    /// If `run` is zero.
    #[must_use]
    pub fn scan(&self, run: usize) -> Option<usize> {
        assert!(run > 0, "cannot scan for an empty run");

        let full_bytes = self.bits.iter().take_while(|&&b| b == 0xFF).count();
        let mut start = 0;
        let mut found = 0;
        for index in (full_bytes * 8)..self.len {
            if self.test(index) {
                found = 0;
                continue;
            }
            if found == 0 {
                start = index;
            }
            found += 1;
            if found == run {
                return Some(start);
            }
        }
        None
    }

    /// Number of bits currently in use.
    #[must_use]
    pub fn count_used(&self) -> usize {
        (0..self.len).filter(|&i| self.test(i)).count()
    }

    #[inline]
    fn check(&self, index: usize) {
        assert!(
            index < self.len,
            "bit index {index} out of range for bitmap of {} bits",
            self.len
        );
    }
}

impl core::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bitmap")
            .field("len", &self.len)
            .field("used", &self.count_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(bits: usize) -> Bitmap {
        let storage = Box::leak(vec![0xAA_u8; bits.div_ceil(8)].into_boxed_slice());
        let mut b = Bitmap::new(storage, bits);
        b.init();
        b
    }

    #[test]
    fn init_clears_everything() {
        let b = bitmap(20);
        assert_eq!(b.count_used(), 0);
        assert_eq!(b.len(), 20);
    }

    #[test]
    fn scan_skips_full_bytes_and_finds_first_run() {
        let mut b = bitmap(32);
        b.set_range(0, 9, true);
        assert_eq!(b.scan(1), Some(9));

        b.set(11, true);
        assert_eq!(b.scan(2), Some(9));
        assert_eq!(b.scan(3), Some(12));
    }

    #[test]
    fn scan_does_not_modify() {
        let b = bitmap(8);
        assert_eq!(b.scan(8), Some(0));
        assert_eq!(b.count_used(), 0);
    }

    #[test]
    fn scan_respects_bit_length() {
        let mut b = bitmap(10);
        b.set_range(0, 8, true);
        assert_eq!(b.scan(2), Some(8));
        assert_eq!(b.scan(3), None);

        b.set_range(8, 2, true);
        assert_eq!(b.scan(1), None);
    }

    #[test]
    fn set_and_clear() {
        let mut b = bitmap(16);
        b.set(5, true);
        assert!(b.test(5));
        b.set(5, false);
        assert!(!b.test(5));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_access_panics() {
        let b = bitmap(10);
        let _ = b.test(10);
    }
}
