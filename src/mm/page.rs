mod directory;
mod flag;
mod table;

pub use directory::{
	current_directory, kernel_directory, set_current_directory, PageDirectory, KERNEL_DIRECTORY,
};
pub use flag::PageFlag;
pub use table::{PageEntry, PageTable};

use super::alloc::{alloc_frame_raw, free_frame_raw, AllocError};
use super::constant::PAGE_SIZE;
use super::util::phys_to_virt;

/// bind a fresh physical frame to `entry` with access bits derived from
/// the owner: kernel mappings drop the user bit, read-only ones the write
/// bit.
pub fn alloc_frame(entry: &mut PageEntry, kernel: bool, writable: bool) -> Result<(), AllocError> {
	let phys = alloc_frame_raw()?;

	let mut flags = PageFlag::Present;
	if writable {
		flags |= PageFlag::Write;
	}
	if !kernel {
		flags |= PageFlag::User;
	}

	*entry = PageEntry::new(phys, flags);
	Ok(())
}

/// release the frame bound to `entry` and clear the mapping.
pub fn free_frame(entry: &mut PageEntry) {
	if entry.addr() != 0 {
		free_frame_raw(entry.addr());
		*entry = PageEntry::empty();
	}
}

/// copy one page of memory between physical addresses. the destination
/// frame need not be mapped anywhere but in the linear map.
pub fn copy_page_physical(src_phys: usize, dst_phys: usize) {
	unsafe {
		(phys_to_virt(dst_phys) as *mut u8)
			.copy_from_nonoverlapping(phys_to_virt(src_phys) as *const u8, PAGE_SIZE)
	};
}

pub(super) unsafe fn init(phys_start: usize, phys_end: usize) {
	directory::init(phys_start, phys_end);
}
