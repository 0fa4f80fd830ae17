//! # Interrupt Entry
//!
//! Assembly stubs for the two vectors the kernel handles, and the Rust
//! functions they call:
//!
//! | Vector | Source | Handler |
//! |--------|--------|---------|
//! | `0x20` | PIT via PIC (IRQ 0) | [`System::on_tick`](kernel_task::System::on_tick) |
//! | `0x80` | `int 0x80` | [`System::syscall`](kernel_task::System::syscall) |
//!
//! Both are interrupt gates, so handlers run with interrupts disabled. The
//! timer handler may switch tasks; the interrupted task's frame stays on
//! its own kernel stack and is resumed by `iretd` once the task is
//! scheduled again.

use crate::boot::system;
use crate::idt::{Dpl, Gate, Idt};
use crate::{pic, pit};
use kernel_info::scheduling::TIMER_FREQUENCY_HZ;
use kernel_sync::SyncOnceCell;
use log::info;

/// Vector of the system call trap.
pub const SYSCALL_VECTOR: u8 = 0x80;

static IDT: SyncOnceCell<Idt> = SyncOnceCell::new();

/// Installs the IDT, remaps the PICs and starts the timer.
///
/// # Safety
/// Interrupts must be disabled, and the [`System`](kernel_task::System)
/// must be initialized before they are enabled.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn init() {
    let idt = IDT.get_or_init(|| {
        let mut idt = Idt::new();
        idt.set(
            pic::TIMER_VECTOR,
            Gate::interrupt(timer_entry as usize as u32, Dpl::Kernel),
        )
        .set(
            SYSCALL_VECTOR,
            Gate::interrupt(syscall_entry as usize as u32, Dpl::User),
        );
        idt
    });
    unsafe {
        idt.load();
        pic::remap();
        pit::start(TIMER_FREQUENCY_HZ);
    }
    info!("Interrupts: timer on {:#x}, system calls on {SYSCALL_VECTOR:#x}", pic::TIMER_VECTOR);
}

#[unsafe(naked)]
extern "C" fn timer_entry() {
    core::arch::naked_asm!(
        "pushad",
        "cld",
        "call {handler}",
        "popad",
        "iretd",
        handler = sym timer_interrupt,
    )
}

extern "C" fn timer_interrupt() {
    // Acknowledge first: the tick may switch away for a long time.
    unsafe { pic::end_of_interrupt(0) };
    system().on_tick();
}

/// `eax` holds the number, `ebx`, `ecx`, `edx` the arguments; the result
/// replaces the saved `eax`.
#[unsafe(naked)]
extern "C" fn syscall_entry() {
    core::arch::naked_asm!(
        "pushad",
        "cld",
        "push edx",
        "push ecx",
        "push ebx",
        "push eax",
        "call {handler}",
        "add esp, 16",
        // Saved eax is the first register `pushad` wrote, 7 slots up.
        "mov [esp + 28], eax",
        "popad",
        "iretd",
        handler = sym syscall_interrupt,
    )
}

extern "C" fn syscall_interrupt(number: usize, a0: usize, a1: usize, a2: usize) -> usize {
    system().syscall(number, [a0, a1, a2])
}
