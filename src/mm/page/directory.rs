use core::cell::UnsafeCell;
use core::mem::{offset_of, size_of};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering::Relaxed};

use alloc::sync::Arc;

use crate::mm::alloc::{alloc_pages_zeroed, free_pages, AllocError};
use crate::mm::constant::{PAGE_SIZE, PD_ENTRIES, PT_COVER_SIZE, VM_OFFSET};
use crate::mm::util::{size_to_rank, virt_to_phys};
use crate::sync::{Locked, Singleton};
use crate::x86;

use super::table::{PageEntry, PageTable};
use super::{free_frame, PageFlag};

/// all-ones slot marker: reserved by hardware conventions, never cloned
/// into, never freed.
const SENTINEL: *mut PageTable = usize::MAX as *mut PageTable;

/// the two-level x86 paging root. `tables` are the kernel-virtual table
/// pointers the kernel walks; `physical_tables` is the hardware view the
/// MMU walks. `physical_address` locates `physical_tables` itself and is
/// what goes into cr3.
#[repr(C, align(4096))]
struct DirectoryStorage {
	tables: [*mut PageTable; PD_ENTRIES],
	physical_tables: [PageEntry; PD_ENTRIES],
	physical_address: usize,
}

pub struct PageDirectory {
	inner: UnsafeCell<NonNull<DirectoryStorage>>,
}

unsafe impl Send for PageDirectory {}
unsafe impl Sync for PageDirectory {}

/// kernel mappings shared by reference into every address space.
/// written once by `init`, read-only ever after.
pub static KERNEL_DIRECTORY: Singleton<PageDirectory> = Singleton::uninit();
static KERNEL_DIRECTORY_INSTALLED: AtomicBool = AtomicBool::new(false);

static CURRENT_DIRECTORY: Locked<Option<Arc<PageDirectory>>> = Locked::new(None);

pub fn kernel_directory() -> &'static PageDirectory {
	assert!(
		KERNEL_DIRECTORY_INSTALLED.load(Relaxed),
		"kernel directory is not installed"
	);

	unsafe { &*KERNEL_DIRECTORY.as_ptr() }
}

pub fn current_directory() -> Option<Arc<PageDirectory>> {
	CURRENT_DIRECTORY.lock_irq_save().clone()
}

pub fn set_current_directory(dir: Arc<PageDirectory>) {
	*CURRENT_DIRECTORY.lock_irq_save() = Some(dir);
}

impl PageDirectory {
	pub fn alloc_empty() -> Result<Self, AllocError> {
		let rank = size_to_rank(size_of::<DirectoryStorage>());
		let mut ptr: NonNull<DirectoryStorage> = alloc_pages_zeroed(rank)?.cast();

		let storage = unsafe { ptr.as_mut() };
		storage.physical_address = virt_to_phys(
			ptr.as_ptr() as usize + offset_of!(DirectoryStorage, physical_tables),
		);

		Ok(Self {
			inner: UnsafeCell::new(ptr),
		})
	}

	fn inner(&self) -> &DirectoryStorage {
		unsafe { (*self.inner.get()).as_ref() }
	}

	fn inner_mut(&self) -> &mut DirectoryStorage {
		unsafe { (*self.inner.get()).as_mut() }
	}

	pub fn physical_address(&self) -> usize {
		self.inner().physical_address
	}

	pub(crate) fn table_ptr(&self, index: usize) -> *mut PageTable {
		self.inner().tables[index]
	}

	pub fn has_table(&self, index: usize) -> bool {
		let table = self.table_ptr(index);
		!table.is_null() && table != SENTINEL
	}

	pub fn is_reserved(&self, index: usize) -> bool {
		self.table_ptr(index) == SENTINEL
	}

	/// plant the sentinel. the slot must not already hold a table.
	pub fn mark_reserved(&self, index: usize) {
		let storage = self.inner_mut();
		assert!(
			storage.tables[index].is_null(),
			"cannot reserve an occupied directory slot"
		);
		storage.tables[index] = SENTINEL;
	}

	fn kernel_shared(&self, index: usize) -> bool {
		if !KERNEL_DIRECTORY_INSTALLED.load(Relaxed) {
			return false;
		}

		let table = self.table_ptr(index);
		!table.is_null() && table != SENTINEL && table == kernel_directory().table_ptr(index)
	}

	/// duplicate this address space. kernel tables are linked, the
	/// sentinel survives verbatim, user tables are deep-copied with
	/// `user | rw | present` hardware entries.
	pub fn clone_directory(&self) -> Result<PageDirectory, AllocError> {
		let new = Self::alloc_empty()?;

		let src = self.inner();
		let dst = new.inner_mut();
		let kernel = kernel_directory().inner();

		for i in 0..PD_ENTRIES {
			let table = src.tables[i];
			if table.is_null() {
				continue;
			}
			if table == SENTINEL {
				dst.tables[i] = SENTINEL;
				continue;
			}

			if kernel.tables[i] == table {
				dst.tables[i] = table;
				dst.physical_tables[i] = src.physical_tables[i];
			} else {
				let (ptr, phys) = unsafe { &*table }.clone_table()?;
				dst.tables[i] = ptr.as_ptr();
				dst.physical_tables[i] = PageEntry::new(phys, PageFlag::USER_RDWR);
			}
		}

		Ok(new)
	}

	/// map a fresh frame at `vaddr` in user space, creating the user page
	/// table on demand. returns the physical address of the new frame.
	pub fn map_user(&self, vaddr: usize, writable: bool) -> Result<usize, AllocError> {
		assert!(vaddr < VM_OFFSET, "user mapping above the kernel split");

		let (pd_idx, pt_idx) = Self::addr_to_index(vaddr);
		let storage = self.inner_mut();

		assert!(
			storage.tables[pd_idx] != SENTINEL && !self.kernel_shared(pd_idx),
			"user mapping into a reserved or kernel slot"
		);

		let table = if storage.tables[pd_idx].is_null() {
			let ptr = PageTable::alloc_empty()?;
			storage.tables[pd_idx] = ptr.as_ptr();
			storage.physical_tables[pd_idx] = PageEntry::new(
				virt_to_phys(ptr.as_ptr() as usize),
				PageFlag::USER_RDWR,
			);
			ptr.as_ptr()
		} else {
			storage.tables[pd_idx]
		};

		let table = unsafe { &mut *table };
		super::alloc_frame(&mut table[pt_idx], false, writable)?;

		Ok(table[pt_idx].addr())
	}

	/// physical address mapped at `vaddr`, if any.
	pub fn lookup(&self, vaddr: usize) -> Option<usize> {
		let (pd_idx, pt_idx) = Self::addr_to_index(vaddr);

		if !self.has_table(pd_idx) {
			return None;
		}

		let entry = unsafe { &*self.table_ptr(pd_idx) }[pt_idx];
		entry.flag().contains(PageFlag::Present).then(|| entry.addr())
	}

	/// install this address space in the MMU.
	pub fn pick_up(&self) {
		x86::load_page_directory(self.physical_address());
	}

	fn addr_to_index(vaddr: usize) -> (usize, usize) {
		let pd_idx = vaddr / PT_COVER_SIZE;
		let pt_idx = (vaddr % PT_COVER_SIZE) / PAGE_SIZE;

		(pd_idx, pt_idx)
	}

	fn map_kernel_page(&self, vaddr: usize, paddr: usize) {
		let (pd_idx, pt_idx) = Self::addr_to_index(vaddr);
		let storage = self.inner_mut();

		if storage.tables[pd_idx].is_null() {
			let ptr = PageTable::alloc_empty().expect("out of memory building the kernel map");
			storage.tables[pd_idx] = ptr.as_ptr();
			storage.physical_tables[pd_idx] = PageEntry::new(
				virt_to_phys(ptr.as_ptr() as usize),
				PageFlag::Present | PageFlag::Write,
			);
		}

		let table = unsafe { &mut *storage.tables[pd_idx] };
		table[pt_idx] = PageEntry::new(paddr, PageFlag::KERNEL_RDWR);
	}
}

/// free a directory and everything it owns: every mapped frame of every
/// user table, the user tables, then the directory storage. kernel tables
/// and sentinel slots are left alone.
impl Drop for PageDirectory {
	fn drop(&mut self) {
		let storage = unsafe { *self.inner.get() };

		for i in 0..PD_ENTRIES {
			let table = self.table_ptr(i);
			if table.is_null() || table == SENTINEL || self.kernel_shared(i) {
				continue;
			}

			let entries = unsafe { &mut *table };
			for entry in entries.iter_mut() {
				if entry.addr() != 0 {
					free_frame(entry);
				}
			}
			free_pages(unsafe { NonNull::new_unchecked(table) }.cast());
		}

		free_pages(storage.cast());
	}
}

/// build the shared kernel directory covering `[phys_start, phys_end)`
/// at the linear map, reserve the recursive slot, and make a clone of it
/// the live directory.
pub(super) unsafe fn init(phys_start: usize, phys_end: usize) {
	let dir = PageDirectory::alloc_empty().expect("out of memory for the kernel directory");

	let mut paddr = phys_start;
	while paddr < phys_end {
		dir.map_kernel_page(VM_OFFSET + paddr, paddr);
		paddr += PAGE_SIZE;
	}
	dir.mark_reserved(PD_ENTRIES - 1);

	KERNEL_DIRECTORY.write(dir);
	KERNEL_DIRECTORY_INSTALLED.store(true, Relaxed);

	let live = kernel_directory()
		.clone_directory()
		.expect("out of memory for the boot address space");
	set_current_directory(Arc::new(live));
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mm::alloc::frames_in_use;
	use crate::mm::constant::PD_ENTRIES;
	use crate::mm::util::phys_to_virt;
	use crate::test::lock_kernel;

	const USER_VADDR: usize = 0x0800_0000;

	fn fill(phys: usize, byte: u8) {
		unsafe { core::ptr::write_bytes(phys_to_virt(phys) as *mut u8, byte, PAGE_SIZE) };
	}

	fn page_at(dir: &PageDirectory, vaddr: usize) -> &'static [u8] {
		let phys = dir.lookup(vaddr).unwrap();
		unsafe { core::slice::from_raw_parts(phys_to_virt(phys) as *const u8, PAGE_SIZE) }
	}

	#[test]
	fn clone_is_isomorphic() {
		let _env = lock_kernel();

		let base = kernel_directory().clone_directory().unwrap();
		let phys = base.map_user(USER_VADDR, true).unwrap();
		fill(phys, 0x5a);

		let clone = base.clone_directory().unwrap();

		for i in 0..PD_ENTRIES {
			assert_eq!(base.is_reserved(i), clone.is_reserved(i));
			if base.kernel_shared(i) {
				// kernel tables are the same object in both spaces
				assert_eq!(base.table_ptr(i), clone.table_ptr(i));
			} else if !base.has_table(i) {
				assert!(!clone.has_table(i));
			}
		}

		// the recursive slot sentinel survived the clone
		assert!(clone.is_reserved(PD_ENTRIES - 1));

		// the user table was duplicated, not linked
		let (user_slot, _) = PageDirectory::addr_to_index(USER_VADDR);
		assert!(clone.has_table(user_slot));
		assert_ne!(base.table_ptr(user_slot), clone.table_ptr(user_slot));

		// same contents behind a different frame
		assert_ne!(base.lookup(USER_VADDR), clone.lookup(USER_VADDR));
		assert_eq!(page_at(&base, USER_VADDR), page_at(&clone, USER_VADDR));
	}

	#[test]
	fn cloned_spaces_share_no_user_frames() {
		let _env = lock_kernel();

		let base = kernel_directory().clone_directory().unwrap();
		for n in 0..4 {
			base.map_user(USER_VADDR + n * PAGE_SIZE, true).unwrap();
		}

		let a = base.clone_directory().unwrap();
		let b = base.clone_directory().unwrap();

		for n in 0..4 {
			let vaddr = USER_VADDR + n * PAGE_SIZE;
			let pa = a.lookup(vaddr).unwrap();
			let pb = b.lookup(vaddr).unwrap();
			assert_ne!(pa, pb);
			assert_ne!(pa, base.lookup(vaddr).unwrap());
		}
	}

	#[test]
	fn free_is_the_dual_of_clone() {
		let _env = lock_kernel();

		let base = kernel_directory().clone_directory().unwrap();
		base.map_user(USER_VADDR, true).unwrap();
		base.map_user(USER_VADDR + 7 * PAGE_SIZE, false).unwrap();

		let before = frames_in_use();
		let clone = base.clone_directory().unwrap();
		assert!(frames_in_use() > before);

		drop(clone);
		assert_eq!(frames_in_use(), before);
	}

	#[test]
	fn map_user_access_bits() {
		let _env = lock_kernel();

		let dir = kernel_directory().clone_directory().unwrap();
		dir.map_user(USER_VADDR, true).unwrap();
		dir.map_user(USER_VADDR + PAGE_SIZE, false).unwrap();

		let (slot, _) = PageDirectory::addr_to_index(USER_VADDR);
		let table = unsafe { &*dir.table_ptr(slot) };

		assert_eq!(table[0].flag(), PageFlag::USER_RDWR);
		assert_eq!(table[1].flag(), PageFlag::Present | PageFlag::User);
		assert_eq!(dir.lookup(USER_VADDR + 2 * PAGE_SIZE), None);
	}
}
