use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};

use crate::interrupt::{irq_restore, irq_save};

use super::spinlock::SpinLock;

/// spin-locked global, either const-initialized or written once during
/// bring-up. locking one that was never written is undefined; install
/// order is the boot code's problem.
pub struct Singleton<T> {
	inner: SpinLock,
	value: UnsafeCell<MaybeUninit<T>>,
}

unsafe impl<T> Send for Singleton<T> {}
unsafe impl<T> Sync for Singleton<T> {}

impl<T> Singleton<T> {
	pub const fn uninit() -> Self {
		Self {
			inner: SpinLock::new(),
			value: UnsafeCell::new(MaybeUninit::uninit()),
		}
	}

	pub const fn new(value: T) -> Self {
		Self {
			inner: SpinLock::new(),
			value: UnsafeCell::new(MaybeUninit::new(value)),
		}
	}

	/// install the value. an old value is overwritten, not dropped.
	pub unsafe fn write(&self, value: T) -> &mut T {
		self.value.get().as_mut().unwrap().write(value)
	}

	/// raw access for install-once state that is only read afterwards.
	pub unsafe fn as_ptr(&self) -> *mut T {
		self.value.get().as_mut().unwrap().as_mut_ptr()
	}

	pub fn lock(&self) -> SingletonGuard<'_, T> {
		self.inner.lock();
		SingletonGuard {
			singleton: self,
			iflag: None,
		}
	}

	pub fn lock_irq_save(&self) -> SingletonGuard<'_, T> {
		let iflag = irq_save();
		self.inner.lock();
		SingletonGuard {
			singleton: self,
			iflag: Some(iflag),
		}
	}
}

pub struct SingletonGuard<'lock, T> {
	singleton: &'lock Singleton<T>,
	iflag: Option<bool>,
}

impl<'lock, T> Drop for SingletonGuard<'lock, T> {
	fn drop(&mut self) {
		self.singleton.inner.unlock();
		if let Some(iflag) = self.iflag {
			irq_restore(iflag);
		}
	}
}

impl<'lock, T> Deref for SingletonGuard<'lock, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		unsafe {
			self.singleton
				.value
				.get()
				.as_ref()
				.unwrap()
				.assume_init_ref()
		}
	}
}

impl<'lock, T> DerefMut for SingletonGuard<'lock, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		unsafe {
			self.singleton
				.value
				.get()
				.as_mut()
				.unwrap()
				.assume_init_mut()
		}
	}
}
