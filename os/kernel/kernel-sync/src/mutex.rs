use crate::{RawLock, RawUnlock};
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

/// A value guarded by the raw lock `R`.
///
/// The memory manager keeps each pool, virtual space, heap and the page
/// mapper in its own `Mutex` and always locks through
/// [`lock_irq`](Self::lock_irq), so the timer interrupt can never find one
/// of them held by the task it preempted.
pub struct Mutex<T, R> {
    raw: R,
    cell: UnsafeCell<T>,
}

// Safety: the raw lock serializes all access to `cell`.
unsafe impl<T: Send, R: Sync> Sync for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    pub const fn from_raw(raw: R, value: T) -> Self {
        Self {
            raw,
            cell: UnsafeCell::new(value),
        }
    }

    /// Access without locking; `&mut self` proves there is no other user.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.cell.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.cell.into_inner()
    }
}

impl<T, R> Mutex<T, R>
where
    R: RawLock + RawUnlock,
{
    /// Spins until the lock is free. Interrupts are left as they are; see
    /// [`lock_irq`](Self::lock_irq).
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.raw_lock();
        MutexGuard { m: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.raw_try_lock().then(|| MutexGuard { m: self })
    }
}

/// Releases the lock on drop.
pub struct MutexGuard<'a, T, R>
where
    R: RawUnlock,
{
    m: &'a Mutex<T, R>,
}

impl<T, R: RawUnlock> Deref for MutexGuard<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.m.cell.get() }
    }
}

impl<T, R: RawUnlock> DerefMut for MutexGuard<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.m.cell.get() }
    }
}

impl<T, R: RawUnlock> Drop for MutexGuard<'_, T, R> {
    fn drop(&mut self) {
        unsafe { self.m.raw.raw_unlock() }
    }
}

#[cfg(test)]
mod tests {
    use crate::SpinMutex;

    #[test]
    fn guard_releases_on_drop() {
        let m = SpinMutex::new(vec![1, 2]);
        {
            let mut g = m.lock();
            g.push(3);
            assert!(m.try_lock().is_none());
        }
        assert_eq!(*m.try_lock().unwrap(), [1, 2, 3]);
        assert_eq!(m.into_inner(), [1, 2, 3]);
    }

    #[test]
    fn get_mut_needs_no_lock() {
        let mut m = SpinMutex::new(1_u32);
        *m.get_mut() += 1;
        assert_eq!(*m.lock(), 2);
    }
}
