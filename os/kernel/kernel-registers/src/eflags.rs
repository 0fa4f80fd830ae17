use bitfield_struct::bitfield;

/// The flags register, reduced to the bits the kernel looks at.
///
/// Everything else is kept in the two padding fields so a value
/// read with `pushfd` converts back to the same bits.
#[bitfield(u32)]
pub struct Eflags {
    /// Bits 0-8: arithmetic and trap flags. Bit 1 always reads as 1.
    #[bits(9, default = 0b10)]
    _low: u16,

    /// Bit 9: maskable interrupts are delivered.
    pub if_interrupt_enable: bool,

    /// Bit 10: string instructions count down.
    pub df_direction: bool,

    #[bits(21)]
    _high: u32,
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegister for Eflags {
    #[inline]
    fn load() -> Self {
        let bits: u32;
        unsafe {
            core::arch::asm!("pushfd", "pop {}", out(reg) bits, options(nomem, preserves_flags));
        }
        Self::from_bits(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_flag() {
        assert!(Eflags::from_bits(0x202).if_interrupt_enable());
        assert!(!Eflags::from_bits(0x002).if_interrupt_enable());
        assert_eq!(Eflags::new().with_if_interrupt_enable(true).into_bits(), 0x202);
    }

    #[test]
    fn other_bits_survive() {
        let raw = 0x0024_0ED7;
        let flags = Eflags::from_bits(raw).with_if_interrupt_enable(false);
        assert_eq!(flags.into_bits(), raw & !0x200);
        assert!(flags.df_direction());
    }
}
