pub mod alloc;
pub mod constant;
pub mod page;
pub mod util;

use self::constant::VM_OFFSET;

/// bring up the memory services over one contiguous physical region.
/// must run before any task exists; everything here is fatal on failure.
pub unsafe fn init(phys_start: usize, phys_end: usize) {
	init_with_offset(phys_start, phys_end, VM_OFFSET);
}

/// variant taking an explicit physical-to-virtual linear offset. the
/// kernel proper always maps its region at `VM_OFFSET`; a mock physical
/// pool lives wherever the host allocator put it.
pub unsafe fn init_with_offset(phys_start: usize, phys_end: usize, linear_offset: usize) {
	util::set_linear_offset(linear_offset);
	alloc::init(phys_start, phys_end);
	page::init(phys_start, phys_end);
}
