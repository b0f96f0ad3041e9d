use crate::config::RESUME_MAGIC;
use crate::current_stack_frame;
use crate::mm::page::set_current_directory;
use crate::process::exit::reap_process;
use crate::process::task::{current_task, set_current_task, State};
use crate::x86;

use super::{has_ready, make_ready, next_ready, next_reapable};

/// rescheduling entry point, driven by the timer interrupt or by a
/// voluntary yield. with `reschedule` the current task goes back into the
/// ready queue; without it the task stays wherever the caller parked it
/// (blocked on a wait list, typically).
///
/// returns immediately when tasking is not installed or nothing else is
/// ready. otherwise it returns only when this task is next scheduled, at
/// which point it reaps whatever died in the meantime.
pub fn switch_task(reschedule: bool) {
	if current_task().is_none() {
		return;
	}
	if !has_ready() {
		return;
	}

	let (esp, ebp) = current_stack_frame!();
	let eip = x86::read_eip();
	if eip == RESUME_MAGIC {
		// the second return: some other task switched back to us
		reap_pending();
		return;
	}

	let current = current_task().expect("running task disappeared mid-switch");
	{
		let mut thread = current.lock_thread();
		thread.eip = eip;
		thread.esp = esp;
		thread.ebp = ebp;
	}

	if reschedule {
		make_ready(current.clone());
	}

	drop(current);
	switch_next();
}

/// immediately transfer to the next ready task without saving the current
/// context. the caller must have arranged never to come back.
pub fn switch_next() -> ! {
	let next = next_ready().expect("switch_next with an empty ready queue");

	let (eip, esp, ebp, directory) = {
		let thread = next.lock_thread();
		let directory = thread
			.page_directory
			.clone()
			.expect("scheduled a task without an address space");

		(thread.eip, thread.esp, thread.ebp, directory)
	};

	assert!(
		x86::in_kernel_text(eip),
		"task switch resume point is not within the kernel"
	);

	*next.lock_state() = State::Running;
	x86::set_kernel_stack(next.kstack().base());

	let cr3 = directory.physical_address();
	set_current_directory(directory);
	set_current_task(next);

	unsafe { x86::jump_to_context(eip, esp, ebp, cr3) }
}

/// yield from a spinning cross-thread lock. when nothing else is ready,
/// open an interrupt window so the timer can make something ready.
pub fn switch_from_cross_thread_lock() {
	if !has_ready() {
		x86::enable_interrupts_and_halt();
	}
	switch_task(true);
}

/// drain the reap queue. runs in the resumed task, one switch after the
/// victims exited, so none of the freed stacks or directories can still
/// be live.
fn reap_pending() {
	while let Some(task) = next_reapable() {
		reap_process(task);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mm::alloc::frames_in_use;
	use crate::mm::page::current_directory;
	use crate::process::process_tree;
	use crate::process::task::spawn_process;
	use crate::scheduler::{make_reapable, should_reap};
	use crate::test::lock_kernel;

	#[test]
	fn switch_is_a_no_op_without_tasking() {
		let _env = lock_kernel();
		crate::process::task::clear_current_task();

		// nothing installed: must return silently
		switch_task(true);
	}

	// off-target read_eip always reports a resume, so switch_task doubles
	// as a deterministic driver for the reaper path.
	#[test]
	fn resumed_switch_reaps_the_dead() {
		use crate::process::kstack::KSTACK_SIZE;
		use crate::mm::constant::PAGE_SIZE;

		let _env = lock_kernel();

		crate::tasking_install();
		let parent = current_task().unwrap();
		while next_ready().is_some() {}
		while next_reapable().is_some() {}

		let filler = spawn_process(&parent).unwrap();
		filler.set_environment(current_directory().unwrap());
		make_ready(filler);

		let victim = spawn_process(&parent).unwrap();
		victim.set_environment(current_directory().unwrap());
		let victim_pid = victim.pid();

		let before = frames_in_use();
		// a dying task keeps its stack until some other task runs
		victim.set_exit_status(0);
		*victim.lock_state() = State::Finished;
		make_reapable(victim.clone());
		drop(victim);
		assert_eq!(frames_in_use(), before);

		switch_task(true);

		assert!(!should_reap());
		assert!(process_tree::get_task(victim_pid).is_none());
		assert_eq!(frames_in_use(), before - KSTACK_SIZE / PAGE_SIZE);

		while next_ready().is_some() {}
	}
}
