use crate::Console;

/// QEMU's debug console port.
const QEMU_DEBUG_PORT: u16 = 0x402;

/// QEMU's `-debugcon` device. Writes are dropped on real hardware, where
/// nothing listens on the port.
#[derive(Debug, Default, Copy, Clone)]
pub struct QemuDebugPort;

impl Console for QemuDebugPort {
    #[inline]
    fn put_char(&self, c: u8) {
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[allow(clippy::inline_always)]
#[inline(always)]
unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
        );
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
#[inline]
unsafe fn outb(_port: u16, _val: u8) {}
