//! # Context Switching
//!
//! [`ContextSwitch`] is the seam between the scheduler's bookkeeping and
//! the CPU. On bare-metal x86, [`X86Switch`] saves the callee-saved
//! registers on the outgoing task's kernel stack, swaps stack pointers and
//! returns on the incoming task's stack:
//!
//! ```text
//!  saved stack pointer ─► ┌──────────┐
//!                         │ esi      │
//!                         │ edi      │
//!                         │ ebx      │
//!                         │ ebp      │
//!                         │ eip      │ ◄── `ret` lands here
//!                         ├──────────┤     (task_trampoline for a new task)
//!                         │ 0        │ fake return address
//!                         │ entry    │
//!                         │ arg      │
//!                         │ on_return│
//!                         └──────────┘
//! ```
//!
//! A new task's stack is primed with an [`InitialFrame`] so that the first
//! switch into it "returns" into [`task_trampoline`], which enables
//! interrupts and calls the entry function.

use crate::tcb::TaskEntry;
use core::mem::size_of;

/// Switches between kernel stacks.
pub trait ContextSwitch {
    /// Writes the first frame of a new task below `stack_top` and returns
    /// the stack pointer to store in its control block.
    ///
    /// # Safety
    /// `stack_top` must be the exclusive end of writable, unused stack
    /// memory with room for an [`InitialFrame`].
    unsafe fn prepare_stack(&self, stack_top: usize, entry: TaskEntry, arg: usize) -> usize;

    /// Saves the running context, stores its stack pointer to `*save` and
    /// resumes the context whose stack pointer is `resume`. Returns when the
    /// saved context is resumed again.
    ///
    /// # Safety
    /// Interrupts must be disabled; `resume` must come from
    /// [`prepare_stack`](Self::prepare_stack) or an earlier `switch`.
    unsafe fn switch(&self, save: *mut usize, resume: usize);
}

/// What a new task's stack holds before its first switch.
#[repr(C)]
pub struct InitialFrame {
    pub esi: usize,
    pub edi: usize,
    pub ebx: usize,
    pub ebp: usize,
    pub eip: extern "C" fn(TaskEntry, usize, fn() -> !) -> !,
    pub unused_return: usize,
    pub entry: TaskEntry,
    pub arg: usize,
    pub on_return: fn() -> !,
}

impl InitialFrame {
    /// Writes a frame just below `stack_top` and returns its address.
    ///
    /// # Safety
    /// See [`ContextSwitch::prepare_stack`].
    pub unsafe fn write(
        stack_top: usize,
        entry: TaskEntry,
        arg: usize,
        on_return: fn() -> !,
    ) -> usize {
        let sp = (stack_top - size_of::<Self>()) & !(size_of::<usize>() - 1);
        let frame = Self {
            esi: 0,
            edi: 0,
            ebx: 0,
            ebp: 0,
            eip: task_trampoline,
            unused_return: 0,
            entry,
            arg,
            on_return,
        };
        unsafe { core::ptr::with_exposed_provenance_mut::<Self>(sp).write(frame) };
        sp
    }
}

/// First code every kernel thread runs, entered by `ret` from a primed
/// [`InitialFrame`] with its arguments on the stack.
#[allow(improper_ctypes_definitions)]
pub extern "C" fn task_trampoline(entry: TaskEntry, arg: usize, on_return: fn() -> !) -> ! {
    run_task(entry, arg, on_return)
}

/// The switch into a new task happens with interrupts disabled, so they are
/// enabled here before `entry(arg)`. If the entry function returns,
/// `on_return` parks the task.
fn run_task(entry: TaskEntry, arg: usize, on_return: fn() -> !) -> ! {
    kernel_sync::irq::enable_interrupts();
    entry(arg);
    on_return()
}

/// Stack switching on 32-bit x86.
pub struct X86Switch {
    on_return: fn() -> !,
}

impl X86Switch {
    /// `on_return` runs on the task's own stack when its entry function
    /// returns and must never come back.
    #[must_use]
    pub const fn new(on_return: fn() -> !) -> Self {
        Self { on_return }
    }
}

impl ContextSwitch for X86Switch {
    unsafe fn prepare_stack(&self, stack_top: usize, entry: TaskEntry, arg: usize) -> usize {
        unsafe { InitialFrame::write(stack_top, entry, arg, self.on_return) }
    }

    #[cfg(all(target_arch = "x86", target_os = "none"))]
    unsafe fn switch(&self, save: *mut usize, resume: usize) {
        unsafe { switch_stacks(save, resume) }
    }

    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    unsafe fn switch(&self, _save: *mut usize, _resume: usize) {
        unimplemented!("stack switching needs bare-metal x86");
    }
}

/// `cdecl`: `save` at `[esp + 4]`, `resume` at `[esp + 8]` on entry.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[unsafe(naked)]
unsafe extern "C" fn switch_stacks(save: *mut usize, resume: usize) {
    core::arch::naked_asm!(
        "mov eax, [esp + 4]",
        "mov ecx, [esp + 8]",
        "push ebp",
        "push ebx",
        "push edi",
        "push esi",
        "mov [eax], esp",
        "mov esp, ecx",
        "pop esi",
        "pop edi",
        "pop ebx",
        "pop ebp",
        "ret",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(_: usize) {}

    fn park() -> ! {
        panic!("parked");
    }

    #[repr(C, align(16))]
    struct Stack([u8; 256]);

    #[test]
    fn initial_frame_sits_below_the_top() {
        let mut stack = Stack([0; 256]);
        let top = stack.0.as_mut_ptr().expose_provenance() + 256;

        let sp = unsafe { InitialFrame::write(top, entry, 42, park) };
        assert_eq!(sp, top - size_of::<InitialFrame>());

        let frame = unsafe { &*core::ptr::with_exposed_provenance::<InitialFrame>(sp) };
        assert_eq!(frame.arg, 42);
        assert_eq!(frame.unused_return, 0);
        assert_eq!(frame.esi | frame.edi | frame.ebx | frame.ebp, 0);
        let trampoline: extern "C" fn(TaskEntry, usize, fn() -> !) -> ! = task_trampoline;
        assert!(core::ptr::fn_addr_eq(frame.eip, trampoline));
    }

    #[test]
    fn new_task_runs_with_interrupts_enabled_then_parks() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        fn record(arg: usize) {
            assert!(kernel_sync::interrupts_enabled());
            SEEN.store(arg, Ordering::SeqCst);
        }

        kernel_sync::irq::disable_interrupts();
        let res = std::panic::catch_unwind(|| run_task(record, 7, park));
        assert!(res.is_err());
        assert_eq!(SEEN.load(Ordering::SeqCst), 7);
        assert!(kernel_sync::interrupts_enabled());
    }
}
