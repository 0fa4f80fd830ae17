//! # Scheduling Constants

/// Timer interrupts per second.
pub const TIMER_FREQUENCY_HZ: u32 = 1000;

/// Priority (time slice in ticks) of the boot thread.
pub const MAIN_THREAD_PRIORITY: u8 = 31;

/// Priority of the idle thread.
pub const IDLE_THREAD_PRIORITY: u8 = 10;

/// Value stored at the top of every task control block; anything else means
/// the kernel stack grew into the control block.
pub const STACK_GUARD: u32 = 0x7777_7777;

/// Bytes reserved for a task name, including the terminating NUL.
pub const TASK_NAME_LEN: usize = 16;

/// Number of entries in the system call table.
pub const SYSCALL_SLOTS: usize = 32;
