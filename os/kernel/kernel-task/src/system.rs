use crate::TaskError;
use crate::cpu;
use crate::scheduler::Scheduler;
use crate::switch::{ContextSwitch, InitialFrame};
use crate::tcb::{Pid, Process, TaskControlBlock, TaskEntry, TaskRef, TaskStatus};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_alloc::{AllocError, MemoryManager, PageAllocError, Space};
use kernel_info::memory::{DEFAULT_PAGE_DIRECTORY, USER_STACK_PAGE};
use kernel_info::scheduling::{IDLE_THREAD_PRIORITY, MAIN_THREAD_PRIORITY};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_sync::{IrqCell, IrqGuard, interrupts_enabled};
use kernel_syscall::{SyscallArgs, SyscallTable, Sysno};
use kernel_vmem::PhysMapper;
use log::{debug, info};

const _: () = assert!(
    size_of::<TaskControlBlock>() + size_of::<InitialFrame>() < PAGE_SIZE as usize / 2,
    "task control block leaves too little kernel stack"
);

/// The kernel's memory manager, scheduler and system calls.
///
/// Created once at boot and then shared by every task and the timer
/// interrupt.
pub struct System<M: PhysMapper, S: ContextSwitch> {
    memory: MemoryManager<M>,
    switch: S,
    scheduler: IrqCell<Scheduler>,
    next_pid: AtomicU32,
    syscalls: SyscallTable<Self>,
    kernel_directory: PhysicalFrame,
}

impl<M: PhysMapper, S: ContextSwitch> System<M, S> {
    /// A system with no tasks yet and `getpid`, `malloc` and `free`
    /// registered as system calls.
    #[must_use]
    pub fn new(memory: MemoryManager<M>, switch: S) -> Self {
        let mut syscalls = SyscallTable::new();
        syscalls.register(Sysno::GetPid, sys_getpid::<M, S>);
        syscalls.register(Sysno::Malloc, sys_malloc::<M, S>);
        syscalls.register(Sysno::Free, sys_free::<M, S>);
        info!("System call table: getpid, malloc, free");

        Self {
            memory,
            switch,
            scheduler: IrqCell::new(Scheduler::new()),
            next_pid: AtomicU32::new(1),
            syscalls,
            kernel_directory: PhysicalFrame::from_number(DEFAULT_PAGE_DIRECTORY / PAGE_SIZE),
        }
    }

    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &MemoryManager<M> {
        &self.memory
    }

    /// Runs `f` on the scheduler with interrupts disabled.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&mut Scheduler) -> R) -> R {
        let _irq = IrqGuard::new();
        self.scheduler.with(f)
    }

    /// Turns the already running boot thread into a task.
    ///
    /// # Safety
    /// `tcb` must be the bottom of the page holding the boot thread's stack,
    /// unused below the stack, and never freed.
    pub unsafe fn adopt_main_thread(&self, tcb: NonNull<TaskControlBlock>, name: &str) -> TaskRef {
        let pid = self.allocate_pid();
        // The stack pointer is saved on the first switch away.
        unsafe { tcb.write(TaskControlBlock::new(name, MAIN_THREAD_PRIORITY, pid, 0)) };
        let task = unsafe { TaskRef::from_raw(tcb) };
        self.with_scheduler(|s| s.adopt(task));
        info!("Adopted boot thread as {task:?}");
        task
    }

    /// Creates a kernel thread that runs `entry(arg)` once scheduled.
    ///
    /// # Errors
    /// [`TaskError::OutOfMemory`] if no kernel page is left.
    pub fn create_task(
        &self,
        name: &str,
        priority: u8,
        entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskRef, TaskError> {
        let (_, task) = self.new_task(name, priority, entry, arg)?;
        self.with_scheduler(|s| s.add(task));
        debug!("Created {task:?} with priority {priority}");
        Ok(task)
    }

    /// Creates a task with its own page directory, user virtual space and
    /// heap.
    ///
    /// # Errors
    /// [`TaskError::OutOfMemory`] if the kernel pool cannot hold the task
    /// page, the directory or the space's bitmap. Nothing is leaked.
    pub fn create_process(
        &self,
        name: &str,
        priority: u8,
        entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskRef, TaskError> {
        let (task_page, task) = self.new_task(name, priority, entry, arg)?;
        let (directory_page, directory) = match self.memory.create_page_directory() {
            Ok(dir) => dir,
            Err(e) => {
                self.memory.free_pages(Space::Kernel, task_page, 1);
                return Err(e.into());
            }
        };
        let user = match self.memory.create_user_space() {
            Ok(user) => user,
            Err(e) => {
                self.memory.free_pages(Space::Kernel, directory_page, 1);
                self.memory.free_pages(Space::Kernel, task_page, 1);
                return Err(e.into());
            }
        };

        // SAFETY: the task is not known to the scheduler yet.
        unsafe { task.get_mut() }.process = Some(Process {
            directory,
            directory_page,
            user,
        });
        self.with_scheduler(|s| s.add(task));
        debug!("Created process {task:?} with directory {directory:?}");
        Ok(task)
    }

    /// Creates the idle task, which the scheduler wakes only when nothing
    /// else is ready.
    ///
    /// # Errors
    /// [`TaskError::OutOfMemory`] if no kernel page is left.
    pub fn start_idle(&'static self) -> Result<TaskRef, TaskError> {
        let arg = core::ptr::from_ref(self).expose_provenance();
        let (_, task) = self.new_task("idle", IDLE_THREAD_PRIORITY, idle_main::<M, S>, arg)?;
        self.with_scheduler(|s| s.set_idle(task));
        debug!("Created idle task {task:?}");
        Ok(task)
    }

    /// The running task.
    #[must_use]
    pub fn current(&self) -> TaskRef {
        self.with_scheduler(|s| s.current())
    }

    /// Switches to the next ready task, or returns right away if the
    /// current task is the only one that can run.
    ///
    /// # Panics
    /// If interrupts are enabled, or nothing can run and there is no idle
    /// task.
    pub fn schedule(&self) {
        assert!(!interrupts_enabled(), "schedule() with interrupts enabled");
        let Some((previous, next)) = self.scheduler.with(Scheduler::switch_next) else {
            return;
        };
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        debug_assert_eq!(cpu::running_task(), previous, "not on the stack of the current task");
        self.activate_space(next);
        // SAFETY: interrupts are off, `previous` is the task whose stack we
        // are on and `next` was saved by an earlier switch or primed by
        // `prepare_stack`.
        unsafe {
            let save = &raw mut (*previous.as_ptr().as_ptr()).kernel_stack;
            self.switch.switch(save, next.get().kernel_stack);
        }
    }

    /// Blocks the running task with `status` and schedules.
    ///
    /// # Panics
    /// If `status` is not a blocking state.
    pub fn block(&self, status: TaskStatus) {
        assert!(status.is_blocking(), "cannot block as {status:?}");
        let _irq = IrqGuard::new();
        self.scheduler.with(|s| s.set_current_status(status));
        self.schedule();
    }

    /// Puts a blocked task at the head of the ready queue.
    pub fn unblock(&self, task: TaskRef) {
        self.with_scheduler(|s| s.unblock(task));
    }

    /// Lets every ready task run before the running one continues.
    ///
    /// The ticks left in the running task's slice are kept for its next turn.
    pub fn yield_now(&self) {
        let _irq = IrqGuard::new();
        self.scheduler.with(Scheduler::requeue_current);
        self.schedule();
    }

    /// Timer interrupt hook, called once per tick with interrupts disabled.
    pub fn on_tick(&self) {
        if self.scheduler.with(Scheduler::tick) {
            self.schedule();
        }
    }

    /// Parks the running task for good after its entry function returned.
    ///
    /// On hardware this does not return; a parked task is never woken.
    pub fn park_current(&self) {
        debug!("{:?} finished", self.current());
        self.block(TaskStatus::Hanging);
    }

    /// Allocates `size` bytes on the running task's heap.
    ///
    /// # Errors
    /// See [`MemoryManager::malloc`].
    pub fn malloc(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let task = self.current();
        self.memory.malloc(space_of(&task), size)
    }

    /// Frees memory from [`malloc`](Self::malloc).
    ///
    /// # Safety
    /// `ptr` must come from `malloc` of the running task and must not be
    /// used afterwards.
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        let task = self.current();
        unsafe { self.memory.free(space_of(&task), ptr) };
    }

    /// Backs the page right below the kernel half in the running process,
    /// where its user stack lives.
    ///
    /// # Errors
    /// [`PageAllocError::OutOfVirtualSpace`] if the stack page is already
    /// taken, [`PageAllocError::OutOfPhysicalMemory`] if the user pool is
    /// empty.
    ///
    /// # Panics
    /// If the running task is a kernel thread.
    pub fn alloc_user_stack(&self) -> Result<VirtualPage, PageAllocError> {
        let task = self.current();
        let Some(process) = task.get().process() else {
            panic!("{task:?} has no user address space");
        };
        let page = VirtualPage::containing(VirtualAddress::new(USER_STACK_PAGE));
        self.memory.alloc_page_at(Space::User(process.user()), page)?;
        Ok(page)
    }

    /// Runs system call `number` for the running task.
    pub fn syscall(&self, number: usize, args: SyscallArgs) -> usize {
        self.syscalls.dispatch(self, number, args)
    }

    fn allocate_pid(&self) -> Pid {
        Pid(self.next_pid.fetch_add(1, Ordering::Relaxed))
    }

    /// One zeroed kernel page with a control block at the bottom and a
    /// primed stack at the top. Not yet known to the scheduler.
    fn new_task(
        &self,
        name: &str,
        priority: u8,
        entry: TaskEntry,
        arg: usize,
    ) -> Result<(VirtualPage, TaskRef), TaskError> {
        let page = self.memory.alloc_zeroed_pages(Space::Kernel, 1)?;
        let base = self.memory.mapped_ptr(page);
        let top = base.as_ptr().expose_provenance() + PAGE_SIZE as usize;
        // SAFETY: the page is ours and the control block ends far below the
        // frame `prepare_stack` writes.
        let sp = unsafe { self.switch.prepare_stack(top, entry, arg) };

        let tcb = base.cast::<TaskControlBlock>();
        unsafe {
            tcb.write(TaskControlBlock::new(name, priority, self.allocate_pid(), sp));
        }
        // SAFETY: task pages are never freed once the task is scheduled.
        Ok((page, unsafe { TaskRef::from_raw(tcb) }))
    }

    fn activate_space(&self, task: TaskRef) {
        let directory = task
            .get()
            .process()
            .map_or(self.kernel_directory, Process::directory);
        // SAFETY: the boot directory or one from `create_page_directory`.
        unsafe { self.memory.activate(directory) };
    }
}

/// Heap space of `task`: its process's, or the kernel's for kernel threads.
fn space_of(task: &TaskRef) -> Space<'_> {
    match task.get().process() {
        Some(process) => Space::User(process.user()),
        None => Space::Kernel,
    }
}

/// Body of the idle task; `arg` is the address of the [`System`].
fn idle_main<M: PhysMapper, S: ContextSwitch>(arg: usize) {
    // SAFETY: `start_idle` passes a `&'static System`.
    let system = unsafe { &*core::ptr::with_exposed_provenance::<System<M, S>>(arg) };
    loop {
        system.block(TaskStatus::Blocked);
        cpu::halt();
    }
}

fn sys_getpid<M: PhysMapper, S: ContextSwitch>(system: &System<M, S>, _: SyscallArgs) -> usize {
    system.current().pid().0 as usize
}

/// Returns the block's address, or 0 on failure.
fn sys_malloc<M: PhysMapper, S: ContextSwitch>(system: &System<M, S>, args: SyscallArgs) -> usize {
    system
        .malloc(args[0])
        .map_or(0, |ptr| ptr.as_ptr().expose_provenance())
}

/// Frees the block at `args[0]`; 0 is ignored.
fn sys_free<M: PhysMapper, S: ContextSwitch>(system: &System<M, S>, args: SyscallArgs) -> usize {
    if let Some(ptr) = NonNull::new(core::ptr::with_exposed_provenance_mut::<u8>(args[0])) {
        // SAFETY: invalid pointers fail the heap's arena validation.
        unsafe { system.free(ptr) };
    }
    0
}
