//! # 8259 Programmable Interrupt Controller
//!
//! The BIOS leaves the master PIC delivering IRQ 0-7 on vectors 0x08-0x0F,
//! which collide with CPU exceptions. [`remap`] moves both controllers
//! behind the exceptions:
//!
//! ```text
//! IRQ 0-7   (master) ─► vectors 0x20-0x27
//! IRQ 8-15  (slave)  ─► vectors 0x28-0x2F
//! ```
//!
//! and masks everything but the timer.

/// First vector of the master PIC after remapping.
pub const MASTER_OFFSET: u8 = 0x20;

/// First vector of the slave PIC after remapping.
pub const SLAVE_OFFSET: u8 = 0x28;

/// Vector of IRQ 0, the PIT.
pub const TIMER_VECTOR: u8 = MASTER_OFFSET;

// Vectors 0-31 belong to CPU exceptions.
const _: () = assert!(MASTER_OFFSET >= 32 && SLAVE_OFFSET == MASTER_OFFSET + 8);

const MASTER_COMMAND: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_COMMAND: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

/// ICW1: edge triggered, cascaded, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW4: 8086 mode, normal end of interrupt.
const ICW4_8086: u8 = 0x01;
/// OCW2: non-specific end of interrupt.
const EOI: u8 = 0x20;

/// Interrupt mask with only the given IRQ lines open.
#[must_use]
pub const fn mask_allowing(irqs: &[u8]) -> u16 {
    let mut mask = u16::MAX;
    let mut i = 0;
    while i < irqs.len() {
        assert!(irqs[i] < 16, "the PIC pair has 16 lines");
        mask &= !(1 << irqs[i]);
        i += 1;
    }
    mask
}

/// Reprograms both PICs to [`MASTER_OFFSET`]/[`SLAVE_OFFSET`] with only the
/// timer unmasked.
///
/// # Safety
/// Interrupts must be disabled and the IDT must have a gate for
/// [`TIMER_VECTOR`].
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe fn remap() {
    use crate::ports::{io_wait, outb};

    // The timer is IRQ 0; IRQ 2 cascades the slave.
    let [master_mask, slave_mask] = mask_allowing(&[0, 2]).to_le_bytes();
    unsafe {
        outb(MASTER_COMMAND, ICW1_INIT);
        io_wait();
        outb(SLAVE_COMMAND, ICW1_INIT);
        io_wait();
        outb(MASTER_DATA, MASTER_OFFSET);
        io_wait();
        outb(SLAVE_DATA, SLAVE_OFFSET);
        io_wait();
        // ICW3: slave on IRQ 2, slave identity 2.
        outb(MASTER_DATA, 1 << 2);
        io_wait();
        outb(SLAVE_DATA, 2);
        io_wait();
        outb(MASTER_DATA, ICW4_8086);
        io_wait();
        outb(SLAVE_DATA, ICW4_8086);
        io_wait();

        outb(MASTER_DATA, master_mask);
        outb(SLAVE_DATA, slave_mask);
    }
}

/// Acknowledges `irq` so the PIC delivers the next one.
///
/// # Safety
/// Only from the handler of `irq`.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe fn end_of_interrupt(irq: u8) {
    use crate::ports::outb;

    unsafe {
        if irq >= 8 {
            outb(SLAVE_COMMAND, EOI);
        }
        outb(MASTER_COMMAND, EOI);
    }
}
