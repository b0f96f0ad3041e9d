use core::hint::black_box;

use alloc::sync::Arc;

use crate::config::TASK_MAGIC;
use crate::current_stack_frame;
use crate::interrupt::irq_save;
use crate::mm::page::PageDirectory;
use crate::pr_debug;
use crate::scheduler::make_ready;
use crate::x86;

use super::process_tree;
use super::task::{current_task, spawn_process};

/// duplicate the current task into a fresh address space. returns twice:
/// the child's pid to the parent, 0 to the child once it is first
/// scheduled.
pub fn fork() -> usize {
	let iflag = irq_save();

	let parent = current_task().expect("fork before tasking_install");
	let directory = {
		let thread = parent.lock_thread();
		let source = thread
			.page_directory
			.as_ref()
			.expect("forking task has no address space");
		source
			.clone_directory()
			.expect("out of memory cloning the address space")
	};
	drop(parent);

	duplicate_current(Arc::new(directory), iflag)
}

/// like `fork`, but the child shares the parent's address space. the
/// caller already moved the child's user stack from `stack_old` to
/// `stack_top` and fixes its pointers up itself; only the register file
/// is preserved here.
pub fn clone(stack_top: usize, stack_old: usize) -> usize {
	let iflag = irq_save();

	let parent = current_task().expect("clone before tasking_install");

	let registers = parent.syscall_registers();
	if !registers.is_null() {
		pr_debug!("clone: user esp at interrupt {:#x}", unsafe {
			(*registers).user_esp
		});
	}
	pr_debug!("clone: new stack {:#x} (was {:#x})", stack_top, stack_old);

	let directory = {
		let thread = parent.lock_thread();
		thread
			.page_directory
			.clone()
			.expect("cloning task has no address space")
	};
	drop(parent);

	duplicate_current(directory, iflag)
}

/// the twice-returning core of fork and clone. captures the current
/// context, builds a child whose kernel stack is a relocated copy of
/// ours, and publishes it to the scheduler.
///
/// interrupts stay off on the child path; its eventual trap return
/// restores the saved eflags.
#[inline(never)]
fn duplicate_current(directory: Arc<PageDirectory>, iflag: bool) -> usize {
	// lives in this frame; both resume paths must still find it intact
	let magic = black_box(TASK_MAGIC);

	let (parent_pid, child_pid) = {
		let parent = current_task().expect("task vanished during fork");
		let child = spawn_process(&parent).expect("out of memory spawning a task");
		child.set_environment(directory);

		(parent.pid(), child.pid())
	};
	// no owned handles may be live across the capture point: the child
	// returns through a copy of this frame and must not double-drop them

	let eip = x86::read_eip();

	let current = current_task().expect("task vanished during fork");
	if current.pid() == parent_pid {
		// first return, still the parent
		assert!(
			black_box(magic) == TASK_MAGIC,
			"bad fork magic on the parent stack"
		);

		let parent = current;
		let child = process_tree::get_task(child_pid)
			.expect("forked child vanished before publication");

		let (esp, ebp) = current_stack_frame!();

		child.kstack().copy_from(parent.kstack());
		{
			let mut thread = child.lock_thread();
			thread.eip = eip;
			thread.esp = child.kstack().rebase(parent.kstack(), esp);
			thread.ebp = child.kstack().rebase(parent.kstack(), ebp);
		}

		// the in-progress syscall frame lives on the copied stack; point
		// the child at its own copy
		let registers = parent.syscall_registers();
		if !registers.is_null() {
			child.set_syscall_registers(
				child.kstack().rebase(parent.kstack(), registers as usize) as *mut _,
			);
		}

		let pid = child.pid().as_raw();
		make_ready(child);

		crate::interrupt::irq_restore(iflag);
		pid
	} else {
		// second return: the child's first scheduling slice
		assert!(
			black_box(magic) == TASK_MAGIC,
			"bad fork magic on the child stack"
		);

		0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mm::constant::PAGE_SIZE;
	use crate::mm::util::phys_to_virt;
	use crate::process::pid::Pid;
	use crate::process::task::State;
	use crate::scheduler::next_ready;
	use crate::test::lock_kernel;

	const USER_VADDR: usize = 0x0900_0000;

	#[test]
	fn fork_publishes_a_relocated_copy() {
		let _env = lock_kernel();

		crate::tasking_install();
		while next_ready().is_some() {}
		let parent = current_task().unwrap();
		let parent_dir = parent.lock_thread().page_directory.clone().unwrap();

		// give the parent a user page and an in-flight syscall frame
		let parent_phys = parent_dir.map_user(USER_VADDR, true).unwrap();
		unsafe { core::ptr::write_bytes(phys_to_virt(parent_phys) as *mut u8, 0x7e, PAGE_SIZE) };

		let frame_offset = 0x200;
		let frame_addr = parent.kstack().bottom() + frame_offset;
		parent.set_syscall_registers(frame_addr as *mut _);
		unsafe { (frame_addr as *mut usize).write(0x1bad_cafe) };

		let pid = fork();
		assert!(pid > parent.pid().as_raw());

		// still the parent; the child sits in the ready queue
		assert_eq!(current_task().unwrap().pid(), parent.pid());
		let child = next_ready().unwrap();
		assert_eq!(child.pid(), Pid::from_raw(pid));
		assert_eq!(*child.lock_state(), State::Ready);

		// distinct address space, same user page contents
		let child_dir = child.lock_thread().page_directory.clone().unwrap();
		assert!(!Arc::ptr_eq(&parent_dir, &child_dir));
		let child_phys = child_dir.lookup(USER_VADDR).unwrap();
		assert_ne!(child_phys, parent_phys);
		let copied =
			unsafe { core::slice::from_raw_parts(phys_to_virt(child_phys) as *const u8, PAGE_SIZE) };
		assert!(copied.iter().all(|b| *b == 0x7e));

		// the syscall frame pointer moved by exactly the stack distance
		let child_regs = child.syscall_registers() as usize;
		assert_eq!(child_regs, child.kstack().bottom() + frame_offset);
		assert_eq!(unsafe { (child_regs as *const usize).read() }, 0x1bad_cafe);

		process_tree::PROCESS_TREE.lock().remove(&child.pid());
		parent.set_syscall_registers(core::ptr::null_mut());
	}

	#[test]
	fn clone_shares_the_address_space() {
		let _env = lock_kernel();

		crate::tasking_install();
		while next_ready().is_some() {}
		let parent = current_task().unwrap();
		let parent_dir = parent.lock_thread().page_directory.clone().unwrap();

		let pid = clone(0xbf80_0000, 0xbf00_0000);
		assert!(pid > 0);

		let child = next_ready().unwrap();
		assert_eq!(child.pid().as_raw(), pid);

		// one address space, two tasks: a store through either mapping
		// lands in the same frame
		let child_dir = child.lock_thread().page_directory.clone().unwrap();
		assert!(Arc::ptr_eq(&parent_dir, &child_dir));

		process_tree::PROCESS_TREE.lock().remove(&child.pid());
	}
}
