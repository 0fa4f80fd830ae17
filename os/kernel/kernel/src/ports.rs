//! # x86 I/O Port Access
//!
//! The legacy devices the kernel drives (the 8259 PIC pair and the 8253/8254
//! PIT) live in the 16-bit I/O port space:
//!
//! ```text
//! 0x0020-0x0021   PIC #1 (master)
//! 0x0040-0x0043   PIT
//! 0x0080          POST diagnostics, used as an I/O delay
//! 0x00A0-0x00A1   PIC #2 (slave)
//! 0x0402          QEMU debug console (see kernel-console)
//! ```
//!
//! All accessors are `unsafe`: writing the wrong register can wedge the
//! device or the machine.

/// Write one byte to an I/O port.
///
/// # Safety
/// Must run at CPL0, and `port` must be a register of a present device that
/// accepts `val` in its current state.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port.
///
/// # Safety
/// Must run at CPL0, and `port` must be a readable register of a present
/// device.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

/// Gives a slow device a moment between two writes.
#[inline]
pub fn io_wait() {
    // Nothing listens on the POST port after boot.
    unsafe { outb(0x80, 0) };
}
