/// kernel stack size of a task, as a page allocation rank.
pub const KSTACK_RANK: usize = 3;

/// planted on the kernel stack around fork and checked on both resume paths.
pub const TASK_MAGIC: usize = 0xdead_beef;

/// returned by the capture-resume primitive when a saved context is resumed.
/// must never be a valid kernel text address.
pub const RESUME_MAGIC: usize = 0x10000;

/// top word of the argv frame handed to a fresh user process.
pub const USER_ARGV_MAGIC: usize = 0xdeca_de21;
