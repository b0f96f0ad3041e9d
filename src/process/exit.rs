use alloc::sync::Arc;

use crate::interrupt::{irq_restore, irq_save};
use crate::scheduler::{make_reapable, switch::switch_next};
use crate::x86;

use super::process_tree::PROCESS_TREE;
use super::task::{current_task, State, Task};
use super::wait_list::block_current_on;

/// terminate the current task. its status is published, every waiter is
/// woken, and the task is handed to the reaper; the next scheduled task
/// frees what we are still standing on. never returns.
pub fn task_exit(status: i32) {
	let current = current_task().expect("task_exit before tasking_install");

	current.set_exit_status(status);
	*current.lock_state() = State::Finished;
	current.wake_all_waiters();

	make_reapable(current);

	// no context save: this task must never be resumed
	switch_next();
}

/// `task_exit`, and a hard stop should the scheduler ever hand control
/// back.
pub fn kexit(status: i32) -> ! {
	task_exit(status);
	x86::stop();
}

/// free a dead task's resources: waiters, kernel stack, address space,
/// fd table, in that order. runs in some other task's context, one
/// scheduling slice after the exit.
pub fn reap_process(task: Arc<Task>) {
	if let Some(current) = current_task() {
		assert!(
			!Arc::ptr_eq(&current, &task),
			"a task cannot reap itself"
		);
	}
	debug_assert!(*task.lock_state() == State::Reapable);

	PROCESS_TREE.lock_irq_save().remove(&task.pid());

	// the queues and the tree are done with it; the last handle frees
	// stack, directory and fd storage by field order
	drop(task);
}

/// block until `target` exits, then report its status. returns right away
/// when it is already gone.
pub fn wait_for_exit(target: &Arc<Task>) -> Option<i32> {
	let iflag = irq_save();

	if !target.is_finished() {
		block_current_on(target.wait_list());
	}

	irq_restore(iflag);
	target.exit_status()
}
