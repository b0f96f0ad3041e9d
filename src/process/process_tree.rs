use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use crate::sync::Locked;

use super::pid::Pid;
use super::task::Task;

pub struct ProcessTree(BTreeMap<Pid, Arc<Task>>);

pub static PROCESS_TREE: Locked<ProcessTree> = Locked::new(ProcessTree::new());

impl ProcessTree {
	pub const fn new() -> Self {
		Self(BTreeMap::new())
	}

	pub fn insert(&mut self, task: Arc<Task>) {
		self.0.insert(task.pid(), task);
	}

	pub fn remove(&mut self, pid: &Pid) {
		self.0.remove(pid);
	}

	pub fn get(&self, pid: &Pid) -> Option<&Arc<Task>> {
		self.0.get(pid)
	}

	pub fn contains(&self, pid: &Pid) -> bool {
		self.0.contains_key(pid)
	}
}

pub fn get_task(pid: Pid) -> Option<Arc<Task>> {
	PROCESS_TREE.lock_irq_save().get(&pid).cloned()
}
