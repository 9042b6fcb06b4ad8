//! A wrapper around the core::sync::atomic.
//!
//! Atomic types provide primitive shared-memory communication between
//! threads, and are the building blocks of other concurrent types. This
//! module re-exports the atomic types defined in [`core::sync::atomic`],
//! such as [`AtomicBool`], [`AtomicUsize`], [`AtomicU64`] and the
//! [`Ordering`] modes, so kernel code names them through one path.
//!
//! Atomic variables are safe to share between threads (they implement
//! [`Sync`]) but they do not themselves provide the mechanism for sharing;
//! the most common way to share one is to put it into an
//! [`Arc`](alloc::sync::Arc).

pub use core::sync::atomic::*;
