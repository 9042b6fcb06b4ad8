//! # The MilOS kernel substrate.
//!
//! MilOS is a small teaching operating system. This crate is the substrate
//! shared by its kernel components: the vocabulary types and seams that the
//! user-program support layer (the `milos-userprog` crate) is built on.
//!
//! The substrate deliberately contains no policy. It provides:
//!
//! - [`KernelError`], the error currency of every kernel operation.
//! - [`addressing`], virtual-address and page arithmetic.
//! - [`sync`], a spinlock with an explicit-unlock discipline.
//! - [`task`], the traits through which the rest of the kernel reaches a
//!   running task: the trap entry ([`task::Task`]), the page-directory
//!   consult ([`task::AddressSpace`]) and process lifecycle
//!   ([`task::ProcessManager`]).
//! - [`teletype`], character-device access and the shared [`teletype::Console`]
//!   handle.
//! - [`fs`], the filesystem collaborator traits and the locked handles the
//!   system-call layer uses to reach them.
//! - [`power`], the machine power-off seam.
//! - [`syscall`], the trap frame and the one-shot accessors for untrusted
//!   user memory.
//!
//! Everything here runs without an operating system underneath
//! (`#![no_std]` + `alloc`); the test harness links the standard library.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

extern crate alloc;

pub mod addressing;
pub mod fs;
pub mod power;
pub mod sync;
pub mod syscall;
pub mod task;
pub mod teletype;

/// Enum representing errors that can occur during a kernel operation.
///
/// This enum is used to categorize errors encountered by the kernel operation.
/// Each variant corresponds to a specific type of error that might occur
/// during the handling of a kernel operation. Components propagate these with
/// `?`; the system-call layer decides at its boundary whether an error
/// terminates the calling process or is folded into the call's failure
/// sentinel.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    /// Operation is not permitted. (EPERM)
    OperationNotPermitted,
    /// No such file or directory. (ENOENT)
    NoSuchEntry,
    /// IO Error. (EIO)
    IOError,
    /// Exec format error. (ENOEXEC)
    NoExec,
    /// Bad file descriptor. (EBADF)
    BadFileDescriptor,
    /// Bad address. (EFAULT)
    BadAddress,
    /// File exists. (EEXIST)
    FileExist,
    /// Invalid argument. (EINVAL)
    InvalidArgument,
    /// Too many open files. (EMFILE)
    TooManyOpenFile,
    /// File name too long. (ENAMETOOLONG)
    NameTooLong,
    /// Invalid system call number. (ENOSYS)
    NoSuchSyscall,
}
