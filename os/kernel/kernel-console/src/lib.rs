//! # Kernel Console
//!
//! Byte-oriented text output for the kernel, with no allocation anywhere on
//! the path:
//!
//! ```text
//! info!(..) ──► ConsoleLogger ──┐
//!                               ├──► ConsoleWriter (fmt::Write) ──► Console::put_char
//! console_print!(..) ───────────┘
//! ```
//!
//! [`Console`] is the seam to the output device. With the `qemu` feature
//! (default) the crate provides [`QemuDebugPort`], which writes to QEMU's
//! debug console on I/O port `0x402`; run QEMU with `-debugcon stdio` to
//! see the output on the host.
//!
//! ```rust
//! use kernel_console::{Console, console_print};
//! use std::sync::Mutex;
//!
//! struct Buffer(Mutex<Vec<u8>>);
//!
//! impl Console for Buffer {
//!     fn put_char(&self, c: u8) {
//!         self.0.lock().unwrap().push(c);
//!     }
//! }
//!
//! let buf = Buffer(Mutex::new(Vec::new()));
//! console_print!(buf, "{} pages\n", 4);
//! assert_eq!(buf.0.lock().unwrap().as_slice(), b"4 pages\n");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
#[cfg(feature = "qemu")]
mod qemu;

pub use logger::ConsoleLogger;
#[cfg(feature = "qemu")]
pub use qemu::QemuDebugPort;

use core::fmt;

/// A character output device.
pub trait Console {
    /// Writes one byte.
    fn put_char(&self, c: u8);

    /// Writes every byte of `s`.
    fn put_str(&self, s: &str) {
        for b in s.bytes() {
            self.put_char(b);
        }
    }
}

impl<C: Console + ?Sized> Console for &C {
    fn put_char(&self, c: u8) {
        (**self).put_char(c);
    }

    fn put_str(&self, s: &str) {
        (**self).put_str(s);
    }
}

/// [`fmt::Write`] adapter for a [`Console`].
pub struct ConsoleWriter<'a, C: Console + ?Sized>(pub &'a C);

impl<C: Console + ?Sized> fmt::Write for ConsoleWriter<'_, C> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.put_str(s);
        Ok(())
    }
}

/// Formats `args` straight onto `console`.
#[inline]
pub fn write_to<C: Console + ?Sized>(console: &C, args: fmt::Arguments<'_>) {
    // Consoles cannot fail; only a broken `Display` impl could.
    let _ = fmt::write(&mut ConsoleWriter(console), args);
}

/// `print!` onto a [`Console`], without allocating.
#[macro_export]
macro_rules! console_print {
    ($console:expr, $($arg:tt)*) => {{
        $crate::write_to(&$console, core::format_args!($($arg)*));
    }};
}
