//! Preemptive round-robin scheduler.
//!
//! The PIT tick (IRQ-0) calls [`preempt`] a hundred times a second.
//! Between ticks the kernel is cooperative: nothing here re-enters, so the
//! task table needs no locking discipline beyond its mutex. Every switch
//! into a task goes through the single IRET path in
//! [`crate::arch::x86::usermode`], which serves first launch and
//! resumption alike.

mod task;

pub use task::{Task, TaskTable, MAX_TASKS, USER_STACK_SIZE};

use spin::Mutex;

use crate::{
    arch::x86::usermode,
    error::KernelResult,
    mm::heap,
};

static TASKS: Mutex<TaskTable> = Mutex::new(TaskTable::new());

/// Register a user task at `entry_point` with an existing stack top.
pub fn task_create_user(entry_point: u32, user_stack_top: u32) -> KernelResult<usize> {
    TASKS.lock().create_user(entry_point, user_stack_top)
}

/// Register a user task, allocating its 4 KiB stack from the kernel heap.
pub fn spawn_user(entry_point: u32) -> KernelResult<usize> {
    let stack = heap::kmalloc(USER_STACK_SIZE) as u32;
    let stack_top = stack + USER_STACK_SIZE as u32;
    task_create_user(entry_point, stack_top)
}

/// Number of live tasks.
pub fn task_count() -> usize {
    TASKS.lock().count()
}

/// Index of the running task.
pub fn current_task() -> usize {
    TASKS.lock().current()
}

/// Remove `tid`. If it was the running task, switch to the next one.
pub fn task_kill(tid: usize) {
    let need_switch = TASKS.lock().kill(tid);
    if need_switch {
        schedule();
    }
}

/// Voluntary yield from the current task.
pub fn task_yield() {
    schedule();
}

/// Timer-driven preemption entry, called from the IRQ-0 path after EOI.
pub fn preempt() {
    schedule();
}

/// Terminate the running task (the `exit` syscall path) and move on.
///
/// With no task left to run there is nothing to return into, so the CPU
/// halts.
pub fn exit_current() {
    let (need_switch, remaining) = {
        let mut table = TASKS.lock();
        let current = table.current();
        let need_switch = table.kill(current);
        (need_switch, table.count())
    };

    if remaining == 0 {
        #[cfg(target_os = "none")]
        crate::arch::halt();
        #[cfg(not(target_os = "none"))]
        return;
    }
    if need_switch {
        schedule();
    }
}

/// Round-robin to the next task and IRET into it.
///
/// Snapshots the current stack pointer into the outgoing record first. A
/// table with one task or none makes this a no-op, which is also what
/// keeps the boot thread running before any user task exists.
pub fn schedule() {
    let next = {
        let mut table = TASKS.lock();
        table.rotate(usermode::current_stack_pointer())
    };

    #[cfg(all(target_arch = "x86", target_os = "none"))]
    if let Some(task) = next {
        // SAFETY: Task records only enter the table through
        // `task_create_user`, whose callers supply identity-mapped user
        // addresses; the descriptor tables were installed at boot.
        unsafe {
            usermode::enter(task.entry_point, task.esp);
        }
    }

    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    let _ = next;
}

/// Drop every task. Test-only hook so scenarios can run back-to-back.
#[cfg(test)]
pub fn reset_for_test() {
    *TASKS.lock() = TaskTable::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global wrappers share one table; the detailed scheduling
    // semantics are covered against private tables in `task::tests`.
    #[test]
    fn test_exit_current_removes_task() {
        reset_for_test();
        task_create_user(0x4000, 0x9000).unwrap();
        assert_eq!(task_count(), 1);
        exit_current();
        assert_eq!(task_count(), 0);
    }
}
