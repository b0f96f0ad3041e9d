pub mod exec;
pub mod exit;
pub mod fd_table;
pub mod fork;
pub mod kstack;
pub mod pid;
pub mod process_tree;
pub mod task;
pub mod wait_list;

use crate::interrupt::{irq_restore, irq_save};
use crate::mm::page::current_directory;
use crate::pr_info;

use self::task::{current_task, set_current_task, spawn_init};

/// bootstrap multitasking: spawn the init task, hand it the live address
/// space and make it the running task. after this the timer may start
/// driving `switch_task`.
pub fn tasking_install() {
	let iflag = irq_save();

	pr_info!("task: installing multitasking");

	let init = spawn_init().expect("failed to allocate the init task");
	let directory = current_directory().expect("tasking_install before mm::init");

	init.set_environment(directory.clone());
	set_current_task(init);
	directory.pick_up();

	irq_restore(iflag);
}

pub fn getpid() -> usize {
	current_task()
		.map(|task| task.pid().as_raw())
		.unwrap_or(0)
}
