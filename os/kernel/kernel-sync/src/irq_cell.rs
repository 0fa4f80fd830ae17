use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::irq::interrupts_enabled;

/// A cell whose contents may only be touched with interrupts disabled.
///
/// On a single CPU, disabling interrupts already excludes every other thread
/// of control, so no lock is needed. What remains is making sure the
/// discipline is actually followed: [`IrqCell::with`] panics if interrupts
/// are enabled or if the cell is re-entered from inside its own closure.
///
/// Unlike a mutex guard, access never outlives the closure, so a thread can
/// be switched away right after using the cell without leaving it "held".
pub struct IrqCell<T> {
    borrowed: AtomicBool,
    value: UnsafeCell<T>,
}

// Safety: access is serialized by the interrupt flag on a single CPU and the
// borrow flag catches re-entry.
unsafe impl<T: Send> Sync for IrqCell<T> {}

impl<T> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Runs `f` with exclusive access to the contents.
    ///
    /// # Panics
    /// If interrupts are enabled or the cell is already borrowed.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        assert!(
            !interrupts_enabled(),
            "IrqCell accessed with interrupts enabled"
        );
        assert!(
            !self.borrowed.swap(true, Ordering::Acquire),
            "IrqCell borrowed twice"
        );
        let _release = Release(&self.borrowed);
        f(unsafe { &mut *self.value.get() })
    }

    /// Mutable access when you have `&mut self` (no contention possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

struct Release<'a>(&'a AtomicBool);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IrqGuard;
    use std::panic;

    #[test]
    fn access_with_interrupts_disabled() {
        let cell = IrqCell::new(1_u32);
        let _g = IrqGuard::new();
        cell.with(|v| *v += 1);
        assert_eq!(cell.with(|v| *v), 2);
    }

    #[test]
    #[should_panic(expected = "interrupts enabled")]
    fn access_with_interrupts_enabled_panics() {
        let cell = IrqCell::new(());
        cell.with(|()| ());
    }

    #[test]
    fn reentry_panics_and_releases() {
        let cell = IrqCell::new(0_u8);
        let _g = IrqGuard::new();
        let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            cell.with(|_| cell.with(|_| ()));
        }));
        assert!(res.is_err());
        assert_eq!(cell.with(|v| *v), 0);
    }
}
