//! Synchronization primitives.
//!
//! MilOS protects shared state with spinlocks: a thread that wants a
//! contended lock burns cycles until the holder releases it, so critical
//! sections must stay short and must never block. The primitives here keep
//! that discipline visible in the type system: a [`SpinLockGuard`] has to
//! be released with an explicit [`SpinLockGuard::unlock`] call, and letting
//! one fall out of scope while the lock is held is a bug the guard turns
//! into a panic at the acquisition site.

pub mod atomic;
pub mod spinlock;

pub use spinlock::{SpinLock, SpinLockGuard, WouldBlock};
