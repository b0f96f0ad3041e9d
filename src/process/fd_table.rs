use core::any::Any;
use core::array;
use core::mem::take;

use alloc::sync::Arc;

const FDTABLE_SIZE: usize = 64;

/// what an open file actually is belongs to the vfs layer above; the task
/// core only stores and duplicates the handles.
pub type FileHandle = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fd(usize);

impl Fd {
	pub fn index(&self) -> usize {
		self.0
	}

	pub fn from(v: usize) -> Option<Self> {
		(v < FDTABLE_SIZE).then(|| Self(v))
	}
}

pub struct FdTable([Option<FileHandle>; FDTABLE_SIZE]);

impl FdTable {
	pub fn new() -> Self {
		Self(array::from_fn(|_| None))
	}

	/// a forked child starts with the same open files.
	pub fn clone_for_fork(&self) -> Self {
		Self(self.0.clone())
	}

	pub fn get_file(&self, fd: Fd) -> Option<FileHandle> {
		self.0[fd.index()].clone()
	}

	pub fn alloc_fd(&mut self, file: FileHandle) -> Option<Fd> {
		let (fd, entry) = self
			.0
			.iter_mut()
			.enumerate()
			.find(|(_, entry)| entry.is_none())?;

		*entry = Some(file);

		Some(Fd(fd))
	}

	pub fn close(&mut self, fd: Fd) -> Option<FileHandle> {
		take(&mut self.0[fd.index()])
	}
}
