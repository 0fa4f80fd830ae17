//! # Interrupt Descriptor Table (IDT)
//!
//! The IDT tells the CPU which handler to call for each interrupt vector.
//! In 32-bit protected mode every entry is an 8-byte gate:
//!
//! ```text
//!  63          48 47 46 45 44  40 39    32 31         16 15           0
//! ┌──────────────┬──┬─────┬──────┬────────┬─────────────┬──────────────┐
//! │ offset 31:16 │P │ DPL │ type │  zero  │  selector   │ offset 15:0  │
//! └──────────────┴──┴─────┴──────┴────────┴─────────────┴──────────────┘
//! ```
//!
//! The kernel installs interrupt gates (type `0xE`, interrupts disabled on
//! entry) for the timer and the system call vector. `int 0x80` must be
//! reachable from ring 3, so its gate has DPL 3.

/// Code segment selector the boot loader's GDT gives the kernel.
pub const KERNEL_CS: u16 = 0x08;

/// Privilege level a gate is callable from with `int n`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Dpl {
    Kernel = 0,
    User = 3,
}

/// A 32-bit interrupt gate.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Gate {
    offset_low: u16,
    selector: u16,
    zero: u8,
    attributes: u8,
    offset_high: u16,
}

const _: () = assert!(size_of::<Gate>() == 8);

impl Gate {
    /// A not-present gate; using its vector raises #NP.
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        zero: 0,
        attributes: 0,
        offset_high: 0,
    };

    /// Present 32-bit interrupt gate into `handler` on the kernel code
    /// segment.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn interrupt(handler: u32, dpl: Dpl) -> Self {
        Self {
            offset_low: handler as u16,
            selector: KERNEL_CS,
            zero: 0,
            attributes: 0x80 | ((dpl as u8) << 5) | 0x0E,
            offset_high: (handler >> 16) as u16,
        }
    }

    #[must_use]
    pub const fn handler(&self) -> u32 {
        ((self.offset_high as u32) << 16) | self.offset_low as u32
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.attributes & 0x80 != 0
    }

    #[must_use]
    pub const fn attributes(&self) -> u8 {
        self.attributes
    }
}

/// The full table of 256 gates.
#[repr(C, align(8))]
pub struct Idt {
    gates: [Gate; 256],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            gates: [Gate::MISSING; 256],
        }
    }

    pub const fn set(&mut self, vector: u8, gate: Gate) -> &mut Self {
        self.gates[vector as usize] = gate;
        self
    }

    #[must_use]
    pub const fn get(&self, vector: u8) -> &Gate {
        &self.gates[vector as usize]
    }

    /// Loads the table into IDTR.
    ///
    /// # Safety
    /// Every vector that can fire must have a valid gate.
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn load(&'static self) {
        #[repr(C, packed)]
        struct Idtr {
            limit: u16,
            base: u32,
        }

        let idtr = Idtr {
            limit: (size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self).expose_provenance() as u32,
        };
        unsafe {
            core::arch::asm!("lidt [{}]", in(reg) &raw const idtr, options(readonly, nostack, preserves_flags));
        }
    }
}
