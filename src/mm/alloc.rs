use core::ptr::NonNull;

use crate::sync::Locked;

use super::constant::{PAGE_MASK, PAGE_SIZE};
use super::util::*;

/// out of physical memory, or the allocator is not installed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

#[derive(Clone, Copy)]
struct FrameMeta {
	inuse: bool,
	rank: u8,
}

/// physical page allocator over one boot-declared region. bookkeeping is
/// one `FrameMeta` per frame, carved out of the front of the region
/// itself; runs are found first-fit.
struct FrameAllocator {
	meta: &'static mut [FrameMeta],
	base_pfn: usize,
	in_use: usize,
}

static FRAME_ALLOCATOR: Locked<Option<FrameAllocator>> = Locked::new(None);

pub(super) unsafe fn init(phys_start: usize, phys_end: usize) {
	let start = current_or_next_aligned(phys_start, PAGE_SIZE);
	let end = phys_end & PAGE_MASK;
	assert!(start < end, "frame allocator: empty physical region");

	let total = (end - start) / PAGE_SIZE;
	let meta_bytes = total * core::mem::size_of::<FrameMeta>();
	let meta_pages = (meta_bytes + PAGE_SIZE - 1) / PAGE_SIZE;
	assert!(meta_pages < total, "frame allocator: region too small");

	let meta = core::slice::from_raw_parts_mut(phys_to_virt(start) as *mut FrameMeta, total);
	for entry in meta.iter_mut() {
		*entry = FrameMeta {
			inuse: false,
			rank: 0,
		};
	}
	// the metadata itself occupies the first frames forever
	for entry in meta.iter_mut().take(meta_pages) {
		entry.inuse = true;
	}

	*FRAME_ALLOCATOR.lock_irq_save() = Some(FrameAllocator {
		meta,
		base_pfn: addr_to_pfn(start),
		in_use: 0,
	});
}

impl FrameAllocator {
	fn find_run(&self, pages: usize) -> Option<usize> {
		let mut i = 0;
		while i + pages <= self.meta.len() {
			match self.meta[i..i + pages].iter().rposition(|m| m.inuse) {
				Some(used) => i += used + 1,
				None => return Some(i),
			}
		}
		None
	}

	fn mark(&mut self, index: usize, rank: usize, inuse: bool) {
		for entry in self.meta[index..index + rank_to_pages(rank)].iter_mut() {
			debug_assert!(entry.inuse != inuse);
			entry.inuse = inuse;
			entry.rank = 0;
		}
		self.meta[index].rank = rank as u8;
	}
}

/// allocate `2^rank` physically contiguous pages. contents are whatever
/// the previous owner left there.
pub fn alloc_pages(rank: usize) -> Result<NonNull<u8>, AllocError> {
	let pages = rank_to_pages(rank);

	let mut allocator = FRAME_ALLOCATOR.lock_irq_save();
	let allocator = allocator.as_mut().ok_or(AllocError)?;

	let index = allocator.find_run(pages).ok_or(AllocError)?;
	allocator.mark(index, rank, true);
	allocator.in_use += pages;

	let vaddr = phys_to_virt(pfn_to_addr(allocator.base_pfn + index));
	Ok(unsafe { NonNull::new_unchecked(vaddr as *mut u8) })
}

pub fn alloc_pages_zeroed(rank: usize) -> Result<NonNull<u8>, AllocError> {
	let ptr = alloc_pages(rank)?;
	unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, rank_to_size(rank)) };
	Ok(ptr)
}

/// give back an allocation made by `alloc_pages`; the rank is remembered
/// in the frame metadata.
pub fn free_pages(ptr: NonNull<u8>) {
	let pfn = addr_to_pfn(virt_to_phys(ptr.as_ptr() as usize));

	let mut allocator = FRAME_ALLOCATOR.lock_irq_save();
	let allocator = allocator
		.as_mut()
		.expect("free_pages before frame allocator install");

	let index = pfn - allocator.base_pfn;
	let rank = allocator.meta[index].rank as usize;
	allocator.mark(index, rank, false);
	allocator.in_use -= rank_to_pages(rank);
}

/// allocate a single frame for a page table entry; returns its physical
/// address.
pub fn alloc_frame_raw() -> Result<usize, AllocError> {
	alloc_pages(0).map(|p| virt_to_phys(p.as_ptr() as usize))
}

pub fn free_frame_raw(phys: usize) {
	free_pages(unsafe { NonNull::new_unchecked(phys_to_virt(phys) as *mut u8) });
}

/// dynamically allocated frames, in pages. the reaper tests balance this.
pub fn frames_in_use() -> usize {
	FRAME_ALLOCATOR
		.lock_irq_save()
		.as_ref()
		.map(|a| a.in_use)
		.unwrap_or(0)
}

/// page-granular kernel heap: every `alloc::*` container sits on whole
/// frames of the managed region.
pub struct KernelAlloc;

unsafe impl core::alloc::GlobalAlloc for KernelAlloc {
	unsafe fn alloc(&self, layout: core::alloc::Layout) -> *mut u8 {
		if layout.align() > PAGE_SIZE {
			return core::ptr::null_mut();
		}

		match alloc_pages(size_to_rank(layout.size().max(1))) {
			Ok(ptr) => ptr.as_ptr(),
			Err(AllocError) => core::ptr::null_mut(),
		}
	}

	unsafe fn dealloc(&self, ptr: *mut u8, _layout: core::alloc::Layout) {
		if let Some(ptr) = NonNull::new(ptr) {
			free_pages(ptr);
		}
	}
}

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: KernelAlloc = KernelAlloc;
