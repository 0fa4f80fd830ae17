//! # 8253/8254 Programmable Interval Timer
//!
//! Channel 0 drives IRQ 0. In mode 2 (rate generator) it counts down from a
//! reload value at [`PIT_INPUT_HZ`] and fires every time it wraps, so the
//! interrupt rate is `PIT_INPUT_HZ / reload`.

/// Input clock of the PIT.
pub const PIT_INPUT_HZ: u32 = 1_193_182;

#[cfg(all(target_arch = "x86", target_os = "none"))]
const CHANNEL0_DATA: u16 = 0x40;
#[cfg(all(target_arch = "x86", target_os = "none"))]
const COMMAND: u16 = 0x43;
/// Channel 0, low byte then high byte, mode 2, binary.
#[cfg(all(target_arch = "x86", target_os = "none"))]
const CHANNEL0_RATE_GENERATOR: u8 = 0b0011_0100;

/// Reload value for `hz` interrupts per second.
///
/// # Panics
/// If `hz` is outside what the 16-bit counter can produce.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn reload_value(hz: u32) -> u16 {
    assert!(hz > 0, "timer frequency must not be zero");
    let reload = PIT_INPUT_HZ / hz;
    assert!(reload >= 1 && reload <= 0xFFFF, "timer frequency out of range");
    reload as u16
}

/// Starts channel 0 at `hz`.
///
/// # Safety
/// Interrupts should be disabled while the two reload bytes are written.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub unsafe fn start(hz: u32) {
    use crate::ports::outb;

    let [low, high] = reload_value(hz).to_le_bytes();
    unsafe {
        outb(COMMAND, CHANNEL0_RATE_GENERATOR);
        outb(CHANNEL0_DATA, low);
        outb(CHANNEL0_DATA, high);
    }
    log::info!("PIT running at {hz} Hz (reload {})", reload_value(hz));
}
