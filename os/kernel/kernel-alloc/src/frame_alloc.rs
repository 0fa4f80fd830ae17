//! # Physical Memory Pools
//!
//! A [`MemoryPool`] hands out 4 KiB frames from one contiguous physical
//! range, tracking them with one bit per frame.
//!
//! ```text
//!  base                                           base + frames * 4K
//!   │                                                      │
//!   ▼                                                      ▼
//!   ┌────┬────┬────┬────┬────┬────┬─────────────────────────┐
//!   │ 1  │ 1  │ 0  │ 1  │ 0  │ 0  │ ...                     │  bitmap
//!   └────┴────┴────┴────┴────┴────┴─────────────────────────┘
//!             ▲
//!             └── next alloc_frame()
//! ```
//!
//! Two pools partition all memory above the reserved low region: the
//! kernel pool first, the user pool right after it.

use kernel_collections::Bitmap;
use kernel_info::boot::FrameRange;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalFrame};
use log::trace;

/// Errors of [`MemoryPool::alloc_frame`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PoolError {
    #[error("physical pool exhausted")]
    OutOfMemory,
}

/// Bitmap-tracked pool of physical frames.
pub struct MemoryPool {
    name: &'static str,
    bitmap: Bitmap,
    base: PhysicalFrame,
}

impl MemoryPool {
    /// A pool over `range` with every frame free. `storage` receives the
    /// bitmap and is cleared.
    ///
    /// # Panics
    /// If `storage` is too small for `range.frames` bits.
    pub fn new(name: &'static str, storage: &'static mut [u8], range: FrameRange) -> Self {
        let mut bitmap = Bitmap::new(storage, range.frames as usize);
        bitmap.init();
        Self {
            name,
            bitmap,
            base: range.base,
        }
    }

    /// Allocates the lowest free frame.
    ///
    /// # Errors
    /// [`PoolError::OutOfMemory`] if every frame is in use.
    pub fn alloc_frame(&mut self) -> Result<PhysicalFrame, PoolError> {
        let index = self.bitmap.scan(1).ok_or(PoolError::OutOfMemory)?;
        self.bitmap.set(index, true);
        let frame = self.base.add_frames(Self::to_u32(index));
        trace!("{} pool: allocated {frame:?}", self.name);
        Ok(frame)
    }

    /// Returns `frame` to the pool.
    ///
    /// # Panics
    /// If `frame` does not belong to this pool or is not allocated.
    pub fn free_frame(&mut self, frame: PhysicalFrame) {
        assert!(
            self.contains(frame),
            "{frame:?} does not belong to the {} pool",
            self.name
        );
        let index = (frame.number() - self.base.number()) as usize;
        assert!(
            self.bitmap.test(index),
            "{frame:?} freed twice in the {} pool",
            self.name
        );
        self.bitmap.set(index, false);
        trace!("{} pool: freed {frame:?}", self.name);
    }

    /// Whether `frame` lies inside this pool's range.
    #[must_use]
    pub fn contains(&self, frame: PhysicalFrame) -> bool {
        frame >= self.base && frame < self.end()
    }

    /// First frame of the pool.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalFrame {
        self.base
    }

    /// First frame past the pool.
    #[must_use]
    pub fn end(&self) -> PhysicalFrame {
        self.base.add_frames(Self::to_u32(self.bitmap.len()))
    }

    #[must_use]
    pub fn frames(&self) -> usize {
        self.bitmap.len()
    }

    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.bitmap.len() - self.bitmap.count_used()
    }

    /// Pool size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bitmap.len() * PAGE_SIZE as usize
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn to_u32(index: usize) -> u32 {
        index as u32
    }
}

impl core::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("frames", &self.frames())
            .field("free", &self.free_frames())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(frames: u32) -> MemoryPool {
        let storage = vec![0xFF_u8; frames.div_ceil(8) as usize].leak();
        MemoryPool::new(
            "test",
            storage,
            FrameRange {
                base: PhysicalFrame::from_number(0x200),
                frames,
            },
        )
    }

    #[test]
    fn four_frame_pool() {
        let mut pool = pool(4);
        let frames: Vec<_> = (0..4).map(|_| pool.alloc_frame().unwrap()).collect();
        assert_eq!(frames[0], PhysicalFrame::from_number(0x200));
        assert_eq!(frames[3], PhysicalFrame::from_number(0x203));
        assert_eq!(pool.alloc_frame(), Err(PoolError::OutOfMemory));

        pool.free_frame(frames[1]);
        assert_eq!(pool.free_frames(), 1);
        assert_eq!(pool.alloc_frame(), Ok(frames[1]));
    }

    #[test]
    fn contains_and_size() {
        let pool = pool(12);
        assert!(pool.contains(PhysicalFrame::from_number(0x200)));
        assert!(pool.contains(PhysicalFrame::from_number(0x20B)));
        assert!(!pool.contains(PhysicalFrame::from_number(0x20C)));
        assert!(!pool.contains(PhysicalFrame::from_number(0x1FF)));
        assert_eq!(pool.size_bytes(), 12 * 4096);
        assert_eq!(pool.free_frames(), 12);
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn freeing_a_foreign_frame_panics() {
        let mut pool = pool(4);
        pool.free_frame(PhysicalFrame::from_number(0x100));
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn double_free_panics() {
        let mut pool = pool(4);
        let frame = pool.alloc_frame().unwrap();
        pool.free_frame(frame);
        pool.free_frame(frame);
    }
}
