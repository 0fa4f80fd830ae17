use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FULL: u8 = 2;

/// A `static` slot written once during boot and read-only afterwards.
///
/// The kernel keeps its `System` and the IDT in one, so interrupt handlers
/// can reach them without `static mut`.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety: the value is written exactly once before `FULL` is published and
// only shared afterwards.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// The value, if it has been set.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        (self.state.load(Ordering::Acquire) == FULL).then(|| unsafe { self.value_unchecked() })
    }

    /// Stores `value` unless the cell is already set, in which case `value`
    /// is handed back.
    ///
    /// # Errors
    /// If the cell was set before or is being set right now.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }
        unsafe { (*self.value.get()).write(value) };
        self.state.store(FULL, Ordering::Release);
        Ok(())
    }

    /// The value, running `init` to create it if the cell is empty.
    ///
    /// If another thread is running its `init`, waits for that instead.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            unsafe { (*self.value.get()).write(init()) };
            self.state.store(FULL, Ordering::Release);
        } else {
            while self.state.load(Ordering::Acquire) != FULL {
                spin_loop();
            }
        }
        unsafe { self.value_unchecked() }
    }

    /// # Safety
    /// The state must be `FULL`.
    unsafe fn value_unchecked(&self) -> &T {
        unsafe { (*self.value.get()).assume_init_ref() }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FULL {
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn set_only_once() {
        let cell = SyncOnceCell::new();
        assert_eq!(cell.get(), None);
        assert_eq!(cell.set(1), Ok(()));
        assert_eq!(cell.set(2), Err(2));
        assert_eq!(cell.get_or_init(|| 3), &1);
    }

    #[test]
    fn value_is_dropped_with_the_cell() {
        let shared = Rc::new(());
        let cell = SyncOnceCell::new();
        cell.get_or_init(|| Rc::clone(&shared));
        assert_eq!(Rc::strong_count(&shared), 2);
        drop(cell);
        assert_eq!(Rc::strong_count(&shared), 1);
    }
}
