//! # Interrupt flag control
//!
//! [`IrqGuard`] and [`IrqMutex`] save the interrupt state, disable
//! interrupts and restore the saved state on drop. The free functions in
//! this module are the raw building blocks; prefer the guards.
//!
//! | Target | Backend |
//! |--------|---------|
//! | `x86` + `target_os = "none"` | `cli`/`sti` and `pushfd` on `EFLAGS.IF` |
//! | anything else | a per-thread flag, initially enabled |

use crate::{Mutex, MutexGuard, RawLock, RawUnlock};

/// A mutex guard that also disables interrupts while held.
///
/// `IrqMutex` combines an interrupt guard with a regular [`MutexGuard`].
/// When created via [`Mutex::lock_irq`], it:
///
/// 1. saves the current interrupt state and disables interrupts, and
/// 2. acquires the underlying mutex,
///
/// releasing them in reverse order on drop.
///
/// This prevents the timer interrupt from preempting the critical section
/// and re-entering code that uses the same lock.
///
/// # Examples
///
/// ```
/// use kernel_sync::{SpinMutex, interrupts_enabled};
///
/// static M: SpinMutex<u32> = SpinMutex::new(0);
///
/// {
///     let mut g = M.lock_irq();
///     *g += 1;
///     assert!(!interrupts_enabled());
/// }
/// assert!(interrupts_enabled());
/// ```
pub struct IrqMutex<'a, T, R: RawLock + RawUnlock> {
    // Field order matters: the lock is released before interrupts return.
    g: MutexGuard<'a, T, R>,
    _irq: IrqGuard,
}

impl<T, R: RawLock + RawUnlock> core::ops::Deref for IrqMutex<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.g
    }
}

impl<T, R: RawLock + RawUnlock> core::ops::DerefMut for IrqMutex<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.g
    }
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquires the mutex with interrupts disabled for the guard's lifetime.
    ///
    /// This constructs an [`IrqGuard`] to save/disable interrupts, then
    /// acquires the mutex and returns a paired [`IrqMutex`] guard. Dropping
    /// the guard releases the mutex and restores interrupts if they were
    /// previously enabled.
    #[inline]
    pub fn lock_irq(&self) -> IrqMutex<'_, T, R> {
        let ig = IrqGuard::new();
        let g = self.lock();
        IrqMutex { g, _irq: ig }
    }
}

/// Returns whether interrupts are currently enabled.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    backend::enabled()
}

/// Disables interrupts (`cli`).
///
/// # Safety & Privilege
///
/// On hardware this must only be called where `cli` is permitted.
#[inline]
pub fn disable_interrupts() {
    backend::disable();
}

/// Enables interrupts (`sti`).
///
/// # Safety & Privilege
///
/// On hardware this must only be called where `sti` is permitted. Typically
/// used to restore a previously disabled interrupt state.
#[inline]
pub fn enable_interrupts() {
    backend::enable();
}

/// Sets the interrupt state to `enabled` and returns the previous state.
#[inline]
pub fn set_interrupts(enabled: bool) -> bool {
    let was = interrupts_enabled();
    if enabled {
        enable_interrupts();
    } else {
        disable_interrupts();
    }
    was
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the interrupt flag. If interrupts were
/// enabled, it disables them. On drop, it re-enables them **only** if they
/// were previously enabled, so guards nest.
///
/// # Examples
///
/// ```
/// use kernel_sync::{IrqGuard, interrupts_enabled};
///
/// {
///     let _outer = IrqGuard::new();
///     {
///         let _inner = IrqGuard::new();
///     }
///     assert!(!interrupts_enabled());
/// }
/// assert!(interrupts_enabled());
/// ```
pub struct IrqGuard {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        if enabled {
            disable_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }

    /// Whether interrupts were enabled before this guard was taken.
    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    /// Restores interrupts only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            enable_interrupts();
        }
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod backend {
    use kernel_registers::{Eflags, LoadRegister};

    #[inline]
    pub fn enabled() -> bool {
        Eflags::load().if_interrupt_enable()
    }

    #[inline]
    pub fn disable() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    pub fn enable() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod backend {
    extern crate std;

    use core::cell::Cell;
    use kernel_registers::Eflags;

    std::thread_local! {
        static EFLAGS: Cell<Eflags> = Cell::new(Eflags::new().with_if_interrupt_enable(true));
    }

    #[inline]
    pub fn enabled() -> bool {
        EFLAGS.with(|f| f.get().if_interrupt_enable())
    }

    #[inline]
    pub fn disable() {
        EFLAGS.with(|f| f.set(f.get().with_if_interrupt_enable(false)));
    }

    #[inline]
    pub fn enable() {
        EFLAGS.with(|f| f.set(f.get().with_if_interrupt_enable(true)));
    }
}
