use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::interrupt::{irq_restore, irq_save};

use super::spinlock::SpinLock;

/// spin-locked cell. `lock_irq_save` must be used for any state that an
/// interrupt handler may also touch, or the handler can deadlock against
/// its own CPU.
#[derive(Debug)]
pub struct Locked<T> {
	inner: SpinLock,
	value: UnsafeCell<T>,
}

unsafe impl<T> Send for Locked<T> {}
unsafe impl<T> Sync for Locked<T> {}

impl<T> Locked<T> {
	pub const fn new(value: T) -> Self {
		Self {
			inner: SpinLock::new(),
			value: UnsafeCell::new(value),
		}
	}

	pub fn lock(&self) -> LockedGuard<'_, T> {
		self.inner.lock();
		LockedGuard {
			locked: self,
			iflag: None,
		}
	}

	pub fn lock_irq_save(&self) -> LockedGuard<'_, T> {
		let iflag = irq_save();
		self.inner.lock();
		LockedGuard {
			locked: self,
			iflag: Some(iflag),
		}
	}
}

pub struct LockedGuard<'lock, T> {
	locked: &'lock Locked<T>,
	iflag: Option<bool>,
}

impl<'lock, T> Drop for LockedGuard<'lock, T> {
	fn drop(&mut self) {
		self.locked.inner.unlock();
		if let Some(iflag) = self.iflag {
			irq_restore(iflag);
		}
	}
}

impl<'lock, T> Deref for LockedGuard<'lock, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		unsafe { self.locked.value.get().as_ref().unwrap() }
	}
}

impl<'lock, T> DerefMut for LockedGuard<'lock, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		unsafe { self.locked.value.get().as_mut().unwrap() }
	}
}
