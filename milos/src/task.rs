//! Traits for interacting with user tasks and processes.

use crate::{KernelError, addressing::Va, syscall::Registers};
use core::ops::Range;

/// Represents a **task** executed by a thread.
///
/// This trait defines the core functionality required for handling events
/// triggered by a user process, such as **system calls**.
pub trait Task: Send {
    /// Handles a **system call** triggered by the user program.
    ///
    /// - The `registers` parameter contains the state of the CPU registers at
    ///   the time of the system call.
    /// - Implementations of this function should parse the system call
    ///   arguments, execute the corresponding operation, and store the result
    ///   back in `registers`.
    fn syscall(&mut self, registers: &mut Registers);
}

/// A view of the user half of a task's virtual address space.
///
/// The kernel never dereferences a user-supplied address before asking the
/// address space whether the access is valid. Every user memory access goes
/// through [`crate::syscall::uaccess`], which validates the full range with
/// [`access_ok`] before touching a single byte.
///
/// [`access_ok`]: Self::access_ok
pub trait AddressSpace: Send + Sync {
    /// Validates a given **memory address range** before use.
    ///
    /// - `addr`: The range of virtual addresses being accessed.
    /// - `is_write`: Indicates whether the memory is being **read** (`false`)
    ///   or **written to** (`true`).
    /// - Returns `true` if the whole range is mapped with sufficient
    ///   permission for the access.
    fn access_ok(&self, addr: Range<Va>, is_write: bool) -> bool;
}

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub i32);

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creation and reaping of user processes.
///
/// The system call layer is a client of this trait. It never inspects the
/// process table itself; spawning a program and collecting a child's exit
/// status both go through the process manager.
pub trait ProcessManager: Send + Sync {
    /// Loads a program and starts it as a child of the calling process.
    ///
    /// `cmd_line` is the full command line. The first word names the program
    /// image and the remainder becomes its arguments. Returns the [`Pid`] of
    /// the new process. Fails with [`KernelError::NoSuchEntry`] if no such
    /// program exists, or [`KernelError::NoExec`] if the image cannot be
    /// loaded.
    fn spawn(&self, cmd_line: &str) -> Result<Pid, KernelError>;

    /// Blocks until the child `pid` exits, then returns its exit status.
    ///
    /// A process may wait for a given child at most once. Waiting on a pid
    /// that is not a live, unreaped child of the caller fails with
    /// [`KernelError::NoSuchEntry`].
    fn wait(&self, pid: Pid) -> Result<i32, KernelError>;
}
