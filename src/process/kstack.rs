use core::ptr::NonNull;

use crate::config::KSTACK_RANK;
use crate::mm::alloc::{alloc_pages, free_pages, AllocError};
use crate::mm::util::rank_to_size;

pub const KSTACK_SIZE: usize = rank_to_size(KSTACK_RANK);

type StackStorage = [u8; KSTACK_SIZE];

/// a task's kernel stack: `KSTACK_SIZE` bytes growing down from `base()`.
#[repr(C)]
pub struct Stack {
	storage: NonNull<StackStorage>,
}

unsafe impl Send for Stack {}
unsafe impl Sync for Stack {}

impl Stack {
	pub fn alloc() -> Result<Self, AllocError> {
		Ok(Self {
			storage: alloc_pages(KSTACK_RANK)?.cast(),
		})
	}

	/// one past the highest address; the stack grows down from here.
	pub fn base(&self) -> usize {
		self.storage.as_ptr() as usize + KSTACK_SIZE
	}

	pub fn bottom(&self) -> usize {
		self.storage.as_ptr() as usize
	}

	pub fn contains(&self, addr: usize) -> bool {
		addr >= self.bottom() && addr < self.base()
	}

	/// byte-for-byte image of `other`'s stack in this one.
	pub fn copy_from(&self, other: &Stack) {
		unsafe {
			(self.bottom() as *mut u8)
				.copy_from_nonoverlapping(other.bottom() as *const u8, KSTACK_SIZE)
		};
	}

	/// translate an address interior to `other` into the same offset here.
	/// esp, ebp and any in-stack pointer all shift by the one base-to-base
	/// distance.
	pub fn rebase(&self, other: &Stack, addr: usize) -> usize {
		self.bottom()
			.wrapping_add(addr.wrapping_sub(other.bottom()))
	}
}

impl Drop for Stack {
	fn drop(&mut self) {
		free_pages(self.storage.cast());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::TASK_MAGIC;
	use crate::test::lock_kernel;

	#[test]
	fn geometry() {
		let _env = lock_kernel();

		let stack = Stack::alloc().unwrap();
		assert_eq!(stack.base() - stack.bottom(), KSTACK_SIZE);
		assert!(stack.contains(stack.bottom()));
		assert!(stack.contains(stack.base() - 1));
		assert!(!stack.contains(stack.base()));
	}

	#[test]
	fn copy_preserves_the_magic_word() {
		let _env = lock_kernel();

		let parent = Stack::alloc().unwrap();
		let child = Stack::alloc().unwrap();

		// a fork-style frame near the top of the parent stack
		let slot = parent.base() - 0x40;
		unsafe { (slot as *mut usize).write(TASK_MAGIC) };

		child.copy_from(&parent);

		let moved = child.rebase(&parent, slot);
		assert_eq!(moved, child.base() - 0x40);
		assert_eq!(unsafe { (moved as *const usize).read() }, TASK_MAGIC);
	}

	#[test]
	fn rebase_is_symmetric_in_direction() {
		let _env = lock_kernel();

		let a = Stack::alloc().unwrap();
		let b = Stack::alloc().unwrap();

		let addr = a.bottom() + 0x123;
		// same offset from either base, whichever stack is higher
		assert_eq!(b.rebase(&a, addr) - b.bottom(), 0x123);
		assert_eq!(a.rebase(&b, b.rebase(&a, addr)), addr);
	}
}
