mod locked;
mod singleton;
mod spinlock;

pub use locked::{Locked, LockedGuard};
pub use singleton::{Singleton, SingletonGuard};
pub use spinlock::{SpinLock, TryLockFail};
