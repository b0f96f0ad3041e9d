pub mod switch;

use alloc::collections::LinkedList;
use alloc::sync::Arc;

use crate::process::task::{State, Task};
use crate::sync::Singleton;

static TASK_QUEUE: Singleton<LinkedList<Arc<Task>>> = Singleton::new(LinkedList::new());
static REAP_QUEUE: Singleton<LinkedList<Arc<Task>>> = Singleton::new(LinkedList::new());

/// insert a task into the ready queue. a finished task must never come
/// back here.
pub fn make_ready(task: Arc<Task>) {
	{
		let mut state = task.lock_state();
		assert!(
			*state < State::Finished,
			"a finished task cannot be made ready"
		);
		*state = State::Ready;
	}

	TASK_QUEUE.lock_irq_save().push_back(task);
}

pub fn next_ready() -> Option<Arc<Task>> {
	TASK_QUEUE.lock_irq_save().pop_front()
}

pub fn has_ready() -> bool {
	!TASK_QUEUE.lock_irq_save().is_empty()
}

/// hand a finished task over to whichever task gets scheduled next.
pub fn make_reapable(task: Arc<Task>) {
	{
		let mut state = task.lock_state();
		debug_assert!(*state == State::Finished);
		*state = State::Reapable;
	}

	REAP_QUEUE.lock_irq_save().push_back(task);
}

pub fn next_reapable() -> Option<Arc<Task>> {
	REAP_QUEUE.lock_irq_save().pop_front()
}

pub fn should_reap() -> bool {
	!REAP_QUEUE.lock_irq_save().is_empty()
}

/// move a blocked task back to ready. anything else is left alone: the
/// wakeup raced with an exit or the task never went to sleep.
pub fn wake_up(task: &Arc<Task>) {
	{
		let state = task.lock_state();
		if *state != State::Blocked {
			return;
		}
	}

	make_ready(task.clone());
}
