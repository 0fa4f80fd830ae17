//! Entry point, boot sequence and panic handler.

use crate::interrupts;
use core::ptr::NonNull;
use kernel_alloc::{BitmapStorage, MemoryManager};
use kernel_info::boot::{BootInfo, MemoryLayout};
use kernel_info::memory::{KERNEL_VIRTUAL_BASE, MAIN_THREAD_TCB, TOTAL_MEMORY_ADDR};
use kernel_memory_addresses::PAGE_SIZE;
use kernel_sync::SyncOnceCell;
use kernel_syscall::Sysno;
use kernel_task::{System, X86Switch, cpu};
use kernel_vmem::recursive::RecursiveMapper;
use log::{info, warn};

#[cfg(feature = "qemu")]
use kernel_console::{ConsoleLogger, QemuDebugPort};

type KernelSystem = System<RecursiveMapper, X86Switch>;

static SYSTEM: SyncOnceCell<KernelSystem> = SyncOnceCell::new();

#[cfg(feature = "qemu")]
static LOGGER: ConsoleLogger<QemuDebugPort> =
    ConsoleLogger::new(QemuDebugPort, log::LevelFilter::Debug);

/// The kernel's [`System`].
///
/// # Panics
/// Before `kernel_main` has created it.
pub fn system() -> &'static KernelSystem {
    let Some(system) = SYSTEM.get() else {
        panic!("system used before initialization");
    };
    system
}

/// The kernel entry point.
///
/// The boot loader jumps here with paging enabled and interrupts off. The
/// boot thread's stack is moved to the top of its control block page, so
/// it can be adopted as a regular task later.
#[unsafe(no_mangle)]
#[unsafe(naked)]
#[unsafe(link_section = ".text._start")]
pub extern "C" fn _start() {
    core::arch::naked_asm!(
        "cli",
        "mov esp, {stack_top}",
        "xor ebp, ebp",
        "jmp {main}",
        stack_top = const MAIN_THREAD_TCB + PAGE_SIZE,
        main = sym kernel_main,
    );
}

extern "C" fn kernel_main() -> ! {
    #[cfg(feature = "qemu")]
    if LOGGER.init().is_err() {
        kernel_console::console_print!(QemuDebugPort, "logger already installed\n");
    }
    info!("Kernel reporting");

    let boot = read_boot_info();
    let layout = match MemoryLayout::from_total_memory(boot.total_memory) {
        Ok(layout) => layout,
        Err(e) => panic!("cannot lay out {:#x} bytes of memory: {e}", boot.total_memory),
    };
    // SAFETY: the loader mapped the bitmap area and nothing else uses it.
    let bitmaps = unsafe { BitmapStorage::from_layout(&layout) };
    let memory = MemoryManager::new(layout, RecursiveMapper, bitmaps);
    let system = SYSTEM.get_or_init(|| System::new(memory, X86Switch::new(park_task)));

    let Some(main_tcb) = NonNull::new(core::ptr::with_exposed_provenance_mut(
        MAIN_THREAD_TCB as usize,
    )) else {
        unreachable!("the boot thread's page is not null");
    };
    // SAFETY: `_start` put the stack at the top of this page.
    unsafe { system.adopt_main_thread(main_tcb, "main") };

    if let Err(e) = system.start_idle() {
        panic!("no idle task: {e}");
    }
    spawn_demo_tasks(system);

    // SAFETY: interrupts are still off and the system is ready.
    unsafe { interrupts::init() };
    kernel_sync::irq::enable_interrupts();
    info!("Boot thread going idle");

    loop {
        cpu::halt();
    }
}

/// Reads what the loader left in low memory, through the kernel's mapping
/// of the first megabyte.
fn read_boot_info() -> BootInfo {
    let addr = (KERNEL_VIRTUAL_BASE + TOTAL_MEMORY_ADDR) as usize;
    let total = unsafe { core::ptr::with_exposed_provenance::<u32>(addr).read_volatile() };
    BootInfo::new(total)
}

fn spawn_demo_tasks(system: &'static KernelSystem) {
    for (name, arg) in [("worker_a", 3), ("worker_b", 5)] {
        if let Err(e) = system.create_task(name, 8, heap_worker, arg) {
            warn!("Cannot start {name}: {e}");
        }
    }
    if let Err(e) = system.create_process("user_a", 8, process_main, 0) {
        warn!("Cannot start user_a: {e}");
    }
}

/// Allocates and frees blocks of growing size on the kernel heap.
fn heap_worker(rounds: usize) {
    let system = system();
    let me = system.current();
    for round in 0..rounds {
        let sizes = [16 << round, 100, 2000];
        let mut blocks = [None; 3];
        for (slot, size) in blocks.iter_mut().zip(sizes) {
            match system.malloc(size) {
                Ok(ptr) => *slot = Some(ptr),
                Err(e) => warn!("{me:?}: malloc({size}) failed: {e}"),
            }
        }
        info!("{me:?} round {round}: {blocks:?}");
        for ptr in blocks.into_iter().flatten() {
            // SAFETY: allocated above and not used afterwards.
            unsafe { system.free(ptr) };
        }
        system.yield_now();
    }
}

/// Runs in its own address space and goes through the system call table
/// the way user code would.
fn process_main(_: usize) {
    let system = system();
    match system.alloc_user_stack() {
        Ok(page) => info!("User stack at {page:?}"),
        Err(e) => warn!("No user stack: {e}"),
    }

    let pid = system.syscall(Sysno::GetPid as usize, [0; 3]);
    let block = system.syscall(Sysno::Malloc as usize, [48, 0, 0]);
    info!("Process {pid}: malloc(48) = {block:#x}");
    system.syscall(Sysno::Free as usize, [block, 0, 0]);
}

/// Where a task's entry function returns to.
fn park_task() -> ! {
    system().park_current();
    panic!("parked task resumed");
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    kernel_sync::irq::disable_interrupts();
    #[cfg(feature = "qemu")]
    kernel_console::console_print!(QemuDebugPort, "\n[PANIC] {info}\n");
    loop {
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}
