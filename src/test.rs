use std::alloc::Layout;
use std::sync::{Mutex, MutexGuard, Once};

use crate::mm;
use crate::mm::constant::PAGE_SIZE;

/// 16 MiB of fake physical memory, shared by every test.
const POOL_PAGES: usize = 4096;

/// physical addresses start one page up so that frame 0 stays the
/// "unmapped" sentinel, exactly as on real hardware.
const POOL_PHYS_START: usize = PAGE_SIZE;

static KERNEL_ENV: Mutex<()> = Mutex::new(());

/// serialize tests around the kernel globals, installing the mock
/// physical pool on first use. every test touching mm, tasks or the
/// scheduler takes this first.
pub fn lock_kernel() -> MutexGuard<'static, ()> {
	static INSTALL: Once = Once::new();

	INSTALL.call_once(|| {
		let layout = Layout::from_size_align(POOL_PAGES * PAGE_SIZE, PAGE_SIZE).unwrap();
		let pool = unsafe { std::alloc::alloc(layout) };
		assert!(!pool.is_null());

		let linear_offset = pool as usize - POOL_PHYS_START;
		unsafe {
			mm::init_with_offset(
				POOL_PHYS_START,
				POOL_PHYS_START + POOL_PAGES * PAGE_SIZE,
				linear_offset,
			)
		};
	});

	KERNEL_ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
