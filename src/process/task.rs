use alloc::sync::Arc;

use crate::interrupt::InterruptFrame;
use crate::mm::alloc::AllocError;
use crate::mm::page::PageDirectory;
use crate::sync::{Locked, LockedGuard, Singleton};

use super::fd_table::FdTable;
use super::kstack::Stack;
use super::pid::Pid;
use super::process_tree::PROCESS_TREE;
use super::wait_list::WaitList;

/// lifecycle of a task. `Finished` and `Reapable` are terminal for
/// scheduling: such a task never re-enters the ready queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
	Ready,
	Running,
	Blocked,
	Finished,
	Reapable,
}

/// saved execution context: where the task resumes, on which stack, and
/// in which address space.
pub struct ThreadContext {
	pub eip: usize,
	pub esp: usize,
	pub ebp: usize,
	pub page_directory: Option<Arc<PageDirectory>>,
}

/// the running task. written only by `switch_next`, read everywhere.
static CURRENT: Singleton<Option<Arc<Task>>> = Singleton::new(None);

pub fn current_task() -> Option<Arc<Task>> {
	CURRENT.lock_irq_save().clone()
}

/// install `task` as the running task, returning the task it replaced.
pub(crate) fn set_current_task(task: Arc<Task>) -> Option<Arc<Task>> {
	CURRENT.lock_irq_save().replace(task)
}

#[cfg(test)]
pub(crate) fn clear_current_task() {
	CURRENT.lock_irq_save().take();
}

// field order is teardown order at reap time: waiters are released before
// the stack, the stack before the address space, the address space before
// the fd table.
pub struct Task {
	pid: Pid,
	uid: usize,
	state: Locked<State>,
	exit_status: Locked<Option<i32>>,
	syscall_registers: Locked<*mut InterruptFrame>,
	wait_list: Locked<WaitList>,
	kstack: Stack,
	thread: Locked<ThreadContext>,
	fd_table: Locked<FdTable>,
}

unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
	fn new(pid: Pid, uid: usize, fd_table: FdTable) -> Result<Arc<Self>, AllocError> {
		let kstack = Stack::alloc()?;

		let task = Arc::new(Task {
			pid,
			uid,
			state: Locked::new(State::Ready),
			exit_status: Locked::new(None),
			syscall_registers: Locked::new(core::ptr::null_mut()),
			wait_list: Locked::new(WaitList::new()),
			kstack,
			thread: Locked::new(ThreadContext {
				eip: 0,
				esp: 0,
				ebp: 0,
				page_directory: None,
			}),
			fd_table: Locked::new(fd_table),
		});

		PROCESS_TREE.lock_irq_save().insert(task.clone());

		Ok(task)
	}

	pub fn pid(&self) -> Pid {
		self.pid
	}

	pub fn uid(&self) -> usize {
		self.uid
	}

	pub fn kstack(&self) -> &Stack {
		&self.kstack
	}

	pub fn lock_state(&self) -> LockedGuard<'_, State> {
		self.state.lock_irq_save()
	}

	pub fn lock_thread(&self) -> LockedGuard<'_, ThreadContext> {
		self.thread.lock_irq_save()
	}

	pub fn lock_fd_table(&self) -> LockedGuard<'_, FdTable> {
		self.fd_table.lock_irq_save()
	}

	pub fn is_finished(&self) -> bool {
		*self.lock_state() >= State::Finished
	}

	/// bind an address space to this task.
	pub fn set_environment(&self, directory: Arc<PageDirectory>) {
		self.lock_thread().page_directory = Some(directory);
	}

	pub fn syscall_registers(&self) -> *mut InterruptFrame {
		*self.syscall_registers.lock_irq_save()
	}

	pub fn set_syscall_registers(&self, frame: *mut InterruptFrame) {
		*self.syscall_registers.lock_irq_save() = frame;
	}

	pub fn set_exit_status(&self, status: i32) {
		*self.exit_status.lock_irq_save() = Some(status);
	}

	/// exit code; meaningful once the task is finished.
	pub fn exit_status(&self) -> Option<i32> {
		*self.exit_status.lock_irq_save()
	}

	pub fn register_waiter(&self, waiter: &Arc<Task>) {
		self.wait_list.lock_irq_save().register(waiter);
	}

	pub(crate) fn wait_list(&self) -> &Locked<WaitList> {
		&self.wait_list
	}

	pub fn wake_all_waiters(&self) {
		self.wait_list.lock_irq_save().wake_up_all();
	}
}

/// the first task. it adopts the caller's execution context, so its
/// thread context stays empty until the first switch away from it.
pub fn spawn_init() -> Result<Arc<Task>, AllocError> {
	let task = Task::new(Pid::INIT, 0, FdTable::new())?;
	*task.lock_state() = State::Running;

	Ok(task)
}

/// a fresh task inheriting `parent`'s credentials and open files, with
/// its own kernel stack. the caller still has to give it an address
/// space and a thread context before it may run.
pub fn spawn_process(parent: &Arc<Task>) -> Result<Arc<Task>, AllocError> {
	let fd_table = parent.lock_fd_table().clone_for_fork();

	Task::new(Pid::allocate(), parent.uid(), fd_table)
}
