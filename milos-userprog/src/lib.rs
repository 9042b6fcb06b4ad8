//! # MilOS user processes
//!
//! The user-process layer of MilOS. A user program requests kernel
//! services by trapping with a system call number and its arguments on the
//! user stack; this crate decodes the trapped request and runs the
//! matching handler against the calling process's state. The kernel
//! substrate it builds on, address spaces, the filesystem, the console and
//! power control, lives in the [`milos`] crate.
//!
//! ## The request path
//!
//! A request arrives as a snapshot of the CPU registers. The saved user
//! stack pointer leads to the system call number and the argument words
//! above it, which [`SyscallAbi`] copies out of user memory with the same
//! validation any other user pointer gets. The number selects a
//! [`SyscallNumber`] variant, whose arity says how many argument words to
//! load. The handlers themselves are methods on [`Process`].
//!
//! Every violation of this protocol, such as an unmapped stack pointer or
//! a buffer argument leading into kernel memory, terminates the calling
//! process as if it had called `exit(-1)`. A misbehaving user program
//! harms nobody but itself.
//!
//! ## Module outline
//!
//! - [`System call decoding`]: the user-stack calling convention.
//! - [`File descriptors`]: the per-process table of open files.
//! - [`Processes`]: process state and the system call handlers.
//!
//! [`System call decoding`]: syscall
//! [`File descriptors`]: file_struct
//! [`Processes`]: process

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod file_struct;
pub mod process;
pub mod syscall;

use milos::{KernelError, syscall::Registers, task::Task};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use syscall::SyscallAbi;

pub use process::Process;

/// Represents the system call numbers.
///
/// Each variant corresponds to a specific service a user program can
/// request from the kernel. The numeric values align with the call numbers
/// compiled into user programs; renumbering breaks every installed binary.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum SyscallNumber {
    /// Shuts the machine down.
    Halt = 0,
    /// Terminates the calling process.
    Exit = 1,
    /// Spawns a new process from a program image.
    Exec = 2,
    /// Waits for a child process to exit.
    Wait = 3,
    /// Creates a file.
    Create = 4,
    /// Removes a file.
    Remove = 5,
    /// Opens a file and returns a file descriptor.
    Open = 6,
    /// Reports the size of an open file.
    Filesize = 7,
    /// Reads data from a file descriptor.
    Read = 8,
    /// Writes data to a file descriptor.
    Write = 9,
    /// Moves the file offset of an open file descriptor.
    Seek = 10,
    /// Retrieves the current file offset.
    Tell = 11,
    /// Closes an open file descriptor.
    Close = 12,
}

impl SyscallNumber {
    /// Decodes a raw call number taken from the user stack.
    pub fn decode(no: usize) -> Result<SyscallNumber, KernelError> {
        SyscallNumber::try_from(no).map_err(|_| KernelError::NoSuchSyscall)
    }

    /// Number of argument words the call takes from the user stack.
    pub fn arity(self) -> usize {
        match self {
            SyscallNumber::Halt => 0,
            SyscallNumber::Exit
            | SyscallNumber::Exec
            | SyscallNumber::Wait
            | SyscallNumber::Remove
            | SyscallNumber::Open
            | SyscallNumber::Filesize
            | SyscallNumber::Tell
            | SyscallNumber::Close => 1,
            SyscallNumber::Create | SyscallNumber::Seek => 2,
            SyscallNumber::Read | SyscallNumber::Write => 3,
        }
    }
}

impl Task for Process {
    /// Handles a system call request from a user program.
    ///
    /// The request is processed in three steps, any of which can brand it
    /// a protocol violation and [`kill`] the caller:
    ///
    /// 1. [`SyscallAbi::from_registers`] follows the saved user stack
    ///    pointer to the system call number.
    /// 2. [`SyscallNumber::decode`] checks the number against the call
    ///    table, and [`SyscallAbi::load_args`] copies in as many argument
    ///    words as that call takes.
    /// 3. The matching handler method on [`Process`] runs. `halt` and
    ///    `exit` never come back. Every other handler either produces the
    ///    value for `%rax`, which [`SyscallAbi::set_return_value`] stores
    ///    into the trapped frame, or reports a violation of its own (a bad
    ///    pointer argument or a bad descriptor), which kills the caller
    ///    like any other.
    ///
    /// A killed process never resumes user code, so its trapped frame is
    /// left alone.
    ///
    /// [`kill`]: Process::kill
    fn syscall(&mut self, regs: &mut Registers) {
        let mm = self.address_space();
        let mut abi = match SyscallAbi::from_registers(regs, &*mm) {
            Ok(abi) => abi,
            Err(_) => return self.kill(),
        };
        let no = match SyscallNumber::decode(abi.sysno) {
            Ok(no) => no,
            Err(_) => return self.kill(),
        };
        if abi.load_args(no.arity()).is_err() {
            return self.kill();
        }
        let result = match no {
            SyscallNumber::Halt => self.halt(),
            SyscallNumber::Exit => return self.exit(&abi),
            SyscallNumber::Exec => self.exec(&abi),
            SyscallNumber::Wait => self.wait(&abi),
            SyscallNumber::Create => self.create(&abi),
            SyscallNumber::Remove => self.remove(&abi),
            SyscallNumber::Open => self.open(&abi),
            SyscallNumber::Filesize => self.filesize(&abi),
            SyscallNumber::Read => self.read(&abi),
            SyscallNumber::Write => self.write(&abi),
            SyscallNumber::Seek => self.seek(&abi),
            SyscallNumber::Tell => self.tell(&abi),
            SyscallNumber::Close => self.close(&abi),
        };
        match result {
            Ok(val) => abi.set_return_value(val),
            Err(_) => self.kill(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_call_table_is_dense_from_halt_to_close() {
        for no in 0..=12 {
            let decoded = SyscallNumber::decode(no).unwrap();
            assert_eq!(usize::from(decoded), no);
        }
        assert_eq!(
            SyscallNumber::decode(13).err(),
            Some(KernelError::NoSuchSyscall)
        );
        assert_eq!(
            SyscallNumber::decode(usize::MAX).err(),
            Some(KernelError::NoSuchSyscall)
        );
    }

    #[test]
    fn no_call_takes_more_words_than_the_abi_loads() {
        for no in 0..=12 {
            let arity = SyscallNumber::decode(no).unwrap().arity();
            assert!(arity <= syscall::MAX_ARGS);
        }
    }
}
