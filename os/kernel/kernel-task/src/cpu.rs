//! CPU helpers for the scheduler.

use crate::tcb::TaskControlBlock;
use core::ptr::NonNull;
use kernel_memory_addresses::PAGE_SIZE;

/// Enables interrupts and waits for the next one.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn halt() {
    // `sti` takes effect after the next instruction, so no interrupt can slip
    // in between the two.
    unsafe { core::arch::asm!("sti", "hlt", options(nomem, nostack)) };
}

/// Enables interrupts and waits for the next one.
#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub fn halt() {
    kernel_sync::irq::enable_interrupts();
    core::hint::spin_loop();
}

/// Control block owning the kernel stack `sp` points into.
///
/// Every kernel stack shares its page with the control block at the bottom,
/// so masking off the page offset finds it.
#[must_use]
pub fn tcb_of_stack(sp: usize) -> NonNull<TaskControlBlock> {
    let base = sp & !(PAGE_SIZE as usize - 1);
    let Some(tcb) = NonNull::new(core::ptr::with_exposed_provenance_mut(base)) else {
        panic!("stack pointer {sp:#x} in the null page");
    };
    tcb
}

/// The task whose kernel stack the CPU is on.
///
/// Unlike [`System::current`](crate::System::current) this needs no access
/// to the scheduler, so it works from any context running on a task stack.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[must_use]
pub fn running_task() -> crate::TaskRef {
    let sp: usize;
    unsafe { core::arch::asm!("mov {}, esp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    // SAFETY: every kernel stack lives in the page of its control block.
    unsafe { crate::TaskRef::from_raw(tcb_of_stack(sp)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_pointer_masks_to_its_page() {
        assert_eq!(tcb_of_stack(0xC009_EFF0).as_ptr().addr(), 0xC009_E000);
        assert_eq!(tcb_of_stack(0xC009_E000).as_ptr().addr(), 0xC009_E000);
        assert_eq!(tcb_of_stack(0xC010_0FFF).as_ptr().addr(), 0xC010_0000);
    }

    #[test]
    #[should_panic(expected = "null page")]
    fn null_page_stack_is_rejected() {
        let _ = tcb_of_stack(0x10);
    }

    #[test]
    fn halt_leaves_interrupts_enabled() {
        kernel_sync::irq::disable_interrupts();
        halt();
        assert!(kernel_sync::interrupts_enabled());
    }
}
