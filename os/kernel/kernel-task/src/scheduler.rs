//! # Run Queues
//!
//! The scheduler's bookkeeping, free of any context switching: the FIFO
//! ready queue, the list of all tasks, the running task and the idle task.
//! [`System`](crate::System) keeps it in an `IrqCell` and performs the
//! actual switch after the queues have been updated.
//!
//! ```text
//!  ready:  head ─► [B] ─► [C] ─► [A] ◄─ tail      (push_back on time-out,
//!                   ▲                               push_front on unblock)
//!                   └── next to run
//! ```

use crate::tcb::{TaskControlBlock, TaskRef, TaskStatus};
use core::ptr::NonNull;
use kernel_collections::{List, container_of};
use log::trace;

/// Ready queue, all-tasks list and the running task.
pub struct Scheduler {
    ready: List,
    all: List,
    current: Option<TaskRef>,
    idle: Option<TaskRef>,
    ticks: u64,
}

// Safety: only reached with interrupts disabled through an `IrqCell`.
unsafe impl Send for Scheduler {}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: List::new(),
            all: List::new(),
            current: None,
            idle: None,
            ticks: 0,
        }
    }

    /// Adds a new `Ready` task at the tail of the ready queue.
    ///
    /// # Panics
    /// If the task is not `Ready` or already queued.
    pub fn add(&mut self, task: TaskRef) {
        // SAFETY: the task is not yet known to anybody else.
        let tcb = unsafe { task.get_mut() };
        assert_eq!(tcb.status, TaskStatus::Ready, "{task:?} added while not ready");
        let ready = NonNull::from(&mut tcb.ready_link);
        assert!(!self.ready.contains(ready), "{task:?} already queued");
        unsafe {
            self.ready.push_back(ready);
            self.all.push_back(NonNull::from(&mut tcb.all_link));
        }
    }

    /// Makes `task` the running task without queueing it. Used for the boot
    /// thread, which is already running when the scheduler starts.
    ///
    /// # Panics
    /// If a task is already running.
    pub fn adopt(&mut self, task: TaskRef) {
        assert!(self.current.is_none(), "a task is already running");
        let tcb = unsafe { task.get_mut() };
        tcb.status = TaskStatus::Running;
        unsafe { self.all.push_back(NonNull::from(&mut tcb.all_link)) };
        self.current = Some(task);
    }

    /// Registers the idle task, which starts out blocked and is only woken
    /// when the ready queue runs dry.
    pub fn set_idle(&mut self, task: TaskRef) {
        let tcb = unsafe { task.get_mut() };
        tcb.status = TaskStatus::Blocked;
        unsafe { self.all.push_back(NonNull::from(&mut tcb.all_link)) };
        self.idle = Some(task);
    }

    /// The running task.
    ///
    /// # Panics
    /// Before a task was adopted.
    #[must_use]
    pub fn current(&self) -> TaskRef {
        let Some(task) = self.current else {
            panic!("no task is running yet");
        };
        task
    }

    #[inline]
    #[must_use]
    pub const fn idle(&self) -> Option<TaskRef> {
        self.idle
    }

    /// Ticks counted since boot.
    #[inline]
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Sets the running task's status ahead of a reschedule.
    pub fn set_current_status(&mut self, status: TaskStatus) {
        let current = self.current();
        unsafe { current.get_mut() }.status = status;
    }

    /// Puts the running task at the tail of the ready queue, as `Ready`.
    pub fn requeue_current(&mut self) {
        let current = self.current();
        let tcb = unsafe { current.get_mut() };
        let link = NonNull::from(&mut tcb.ready_link);
        assert!(!self.ready.contains(link), "{current:?} already queued");
        tcb.status = TaskStatus::Ready;
        unsafe { self.ready.push_back(link) };
    }

    /// Accounts one timer tick to the running task.
    ///
    /// Returns `true` when its time slice is used up.
    ///
    /// # Panics
    /// If the running task's stack guard was overwritten.
    pub fn tick(&mut self) -> bool {
        let current = self.current();
        let tcb = unsafe { current.get_mut() };
        assert!(tcb.guard_intact(), "kernel stack overflow in {current:?}");
        self.ticks += 1;
        tcb.elapsed_ticks = tcb.elapsed_ticks.wrapping_add(1);
        if tcb.remaining_ticks == 0 {
            true
        } else {
            tcb.remaining_ticks -= 1;
            false
        }
    }

    /// Moves a blocked task to the head of the ready queue.
    ///
    /// # Panics
    /// If the task is not blocked or already queued.
    pub fn unblock(&mut self, task: TaskRef) {
        let tcb = unsafe { task.get_mut() };
        assert!(
            tcb.status.is_blocking(),
            "{task:?} unblocked while {:?}",
            tcb.status
        );
        let link = NonNull::from(&mut tcb.ready_link);
        assert!(!self.ready.contains(link), "blocked {task:?} is on the ready queue");
        tcb.status = TaskStatus::Ready;
        unsafe { self.ready.push_front(link) };
        trace!("Unblocked {task:?}");
    }

    /// Picks the next task to run and makes it current.
    ///
    /// A still-running current task goes to the tail of the ready queue
    /// with a fresh time slice. If nothing is ready the idle task is
    /// woken. Returns the previous and the next task, or `None` if the
    /// current task simply continues.
    ///
    /// # Panics
    /// If nothing is ready and there is no idle task.
    pub fn switch_next(&mut self) -> Option<(TaskRef, TaskRef)> {
        let previous = self.current();
        {
            let tcb = unsafe { previous.get_mut() };
            if tcb.status == TaskStatus::Running {
                tcb.remaining_ticks = tcb.priority;
                self.requeue_current();
            }
        }

        if self.ready.is_empty() {
            let Some(idle) = self.idle else {
                panic!("nothing to run and no idle task");
            };
            self.unblock(idle);
        }

        let Some(link) = self.ready.pop_front() else {
            unreachable!("the ready queue was just refilled");
        };
        // SAFETY: only `ready_link`s of control blocks are queued.
        let next = unsafe { TaskRef::from_raw(container_of!(link, TaskControlBlock, ready_link)) };
        unsafe { next.get_mut() }.status = TaskStatus::Running;
        self.current = Some(next);

        if next == previous {
            return None;
        }
        trace!("Switching {previous:?} -> {next:?}");
        Some((previous, next))
    }

    /// Tasks on the ready queue, head first.
    pub fn ready(&self) -> impl Iterator<Item = TaskRef> + '_ {
        self.ready
            .iter()
            .map(|link| unsafe { TaskRef::from_raw(container_of!(link, TaskControlBlock, ready_link)) })
    }

    /// Every task ever added, in creation order.
    pub fn all(&self) -> impl Iterator<Item = TaskRef> + '_ {
        self.all
            .iter()
            .map(|link| unsafe { TaskRef::from_raw(container_of!(link, TaskControlBlock, all_link)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcb::Pid;
    use kernel_info::scheduling::STACK_GUARD;

    fn task(name: &str, priority: u8, pid: u32) -> TaskRef {
        let tcb = Box::leak(Box::new(TaskControlBlock::new(name, priority, Pid(pid), 0)));
        unsafe { TaskRef::from_raw(NonNull::from(tcb)) }
    }

    fn names(s: &Scheduler) -> Vec<&'static str> {
        s.ready()
            .map(|t| {
                let tcb: &'static TaskControlBlock = unsafe { &*t.as_ptr().as_ptr() };
                tcb.name()
            })
            .collect()
    }

    fn with_main() -> (Scheduler, TaskRef) {
        let mut s = Scheduler::new();
        let main = task("main", 31, 1);
        s.adopt(main);
        (s, main)
    }

    #[test]
    fn round_robin_is_fifo() {
        let (mut s, main) = with_main();
        let [a, b, c] = [task("a", 1, 2), task("b", 1, 3), task("c", 1, 4)];
        for t in [a, b, c] {
            s.add(t);
        }

        let mut order = Vec::new();
        for _ in 0..6 {
            let (_, next) = s.switch_next().unwrap();
            order.push(String::from(next.get().name()));
        }
        assert_eq!(order, ["a", "b", "c", "main", "a", "b"]);
        assert_eq!(main.status(), TaskStatus::Ready);
        assert_eq!(s.current(), b);
        assert_eq!(names(&s), ["c", "main", "a"]);
    }

    #[test]
    fn unblocked_task_runs_before_earlier_time_outs() {
        let (mut s, main) = with_main();
        let [a, b] = [task("a", 1, 2), task("b", 1, 3)];
        s.add(a);
        s.add(b);

        // a runs and blocks itself
        let (_, next) = s.switch_next().unwrap();
        assert_eq!(next, a);
        s.set_current_status(TaskStatus::Blocked);
        let (_, next) = s.switch_next().unwrap();
        assert_eq!(next, b);

        // b times out behind main, then a is woken
        let (_, next) = s.switch_next().unwrap();
        assert_eq!(next, main);
        s.unblock(a);
        assert_eq!(names(&s), ["a", "b"]);
        let (_, next) = s.switch_next().unwrap();
        assert_eq!(next, a);
    }

    #[test]
    fn exactly_one_running_and_ready_means_queued() {
        let (mut s, _) = with_main();
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            s.add(task(name, 2, u32::try_from(i).unwrap() + 2));
        }
        for _ in 0..5 {
            s.switch_next();
            let running = s.all().filter(|t| t.status() == TaskStatus::Running).count();
            assert_eq!(running, 1);
            for t in s.all() {
                let queued = s.ready().any(|r| r == t);
                assert_eq!(queued, t.status() == TaskStatus::Ready);
            }
        }
    }

    #[test]
    fn a_lone_runner_keeps_running() {
        let (mut s, main) = with_main();
        assert_eq!(s.switch_next(), None);
        assert_eq!(s.current(), main);
        assert_eq!(main.status(), TaskStatus::Running);
    }

    #[test]
    fn idle_runs_when_nothing_is_ready() {
        let (mut s, main) = with_main();
        let idle = task("idle", 10, 2);
        s.set_idle(idle);
        assert_eq!(idle.status(), TaskStatus::Blocked);

        s.set_current_status(TaskStatus::Blocked);
        let (prev, next) = s.switch_next().unwrap();
        assert_eq!((prev, next), (main, idle));
        assert_eq!(idle.status(), TaskStatus::Running);
    }

    #[test]
    #[should_panic(expected = "no idle task")]
    fn nothing_to_run_without_idle_panics() {
        let (mut s, _) = with_main();
        s.set_current_status(TaskStatus::Blocked);
        s.switch_next();
    }

    #[test]
    fn time_slices() {
        let (mut s, main) = with_main();
        let a = task("a", 2, 2);
        s.add(a);
        s.switch_next();
        assert_eq!(s.current(), a);

        assert!(!s.tick());
        assert!(!s.tick());
        assert!(s.tick());
        assert_eq!(a.get().elapsed_ticks(), 3);
        assert_eq!(s.ticks(), 3);

        s.switch_next();
        assert_eq!(s.current(), main);
        assert_eq!(a.get().remaining_ticks(), 2);
    }

    #[test]
    #[should_panic(expected = "kernel stack overflow")]
    fn clobbered_guard_is_fatal() {
        let (mut s, main) = with_main();
        unsafe { main.get_mut() }.stack_guard = !STACK_GUARD;
        s.tick();
    }

    #[test]
    #[should_panic(expected = "unblocked while Ready")]
    fn unblocking_a_ready_task_panics() {
        let (mut s, _) = with_main();
        let a = task("a", 1, 2);
        s.add(a);
        s.unblock(a);
    }
}
