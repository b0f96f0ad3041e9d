use core::sync::atomic::{AtomicUsize, Ordering::Relaxed};

/// process id. monotonically assigned and never recycled, so a pid seen
/// once always denotes the same task.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Pid(usize);

static NEXT_PID: AtomicUsize = AtomicUsize::new(1);

impl Pid {
	pub const INIT: Pid = Pid(0);

	pub fn allocate() -> Self {
		Pid(NEXT_PID.fetch_add(1, Relaxed))
	}

	pub fn as_raw(&self) -> usize {
		self.0
	}

	pub fn from_raw(raw: usize) -> Self {
		Pid(raw)
	}
}
