use crate::config::USER_ARGV_MAGIC;
use crate::interrupt::irq_disable;
use crate::x86;

use super::task::current_task;

/// one-way descent to ring 3. the TSS gets our kernel stack for the trap
/// back in, the user stack gets the argv frame, and an interrupt return
/// drops privilege with interrupts live again.
pub fn enter_user_jmp(entry: usize, argc: usize, argv: usize, user_stack: usize) -> ! {
	irq_disable();

	let current = current_task().expect("user jump before tasking_install");
	x86::set_kernel_stack(current.kstack().base());
	drop(current);

	let esp = push_argv_frame(user_stack, argc, argv);
	unsafe { x86::iret_to_user(entry, esp) }
}

/// lay down `(null, argv, argc, magic)` below `stack_top`, 32-bit words,
/// magic on top. returns the new stack pointer.
fn push_argv_frame(stack_top: usize, argc: usize, argv: usize) -> usize {
	let mut esp = stack_top;

	for word in [0, argv, argc, USER_ARGV_MAGIC] {
		esp -= core::mem::size_of::<u32>();
		unsafe { (esp as *mut u32).write(word as u32) };
	}

	esp
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn argv_frame_layout() {
		let mut stack = [0u32; 16];
		let top = stack.as_mut_ptr() as usize + core::mem::size_of_val(&stack);

		let esp = push_argv_frame(top, 3, 0xbfff_0000);

		assert_eq!(esp, top - 16);
		let frame = unsafe { core::slice::from_raw_parts(esp as *const u32, 4) };
		assert_eq!(frame, [USER_ARGV_MAGIC as u32, 3, 0xbfff_0000, 0]);
	}
}
