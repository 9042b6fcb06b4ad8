//! # System call abi for x86_64.
//!
//! Operating systems provide an abstraction of hardware resources to user
//! programs, allowing them to interact with hardware without needing to
//! understand its complexities. The kernel is responsible for managing
//! resources such as memory, processes, and input/output devices, while
//! offering a simplified interface for user programs. System calls serve as
//! the interface between user applications and the kernel, enabling programs
//! to request services like file I/O and process management without directly
//! dealing with the hardware.
//!
//! ## System Call Details
//!
//! A user program invokes a system call by pushing the request onto its own
//! stack and trapping into the kernel:
//!
//! 1. The caller pushes the **arguments** in reverse order, then the
//!    **system call number**, each as one machine word.
//! 2. At the moment of the trap, the saved `%rsp` therefore points at the
//!    call number; the n-th argument lives at `%rsp + 8 * (n + 1)`.
//! 3. The **return value** is stored to the `%rax` register of the trapped
//!    frame before the program resumes.
//!
//! Nothing about this layout can be trusted. The stack pointer is ordinary
//! user data: it may be null or kernel-half, or sit so close to the top of
//! the mapped stack that some argument words fall outside it. Every word is
//! therefore read through the [`uaccess`] types, which validate the address
//! against the caller's address space before dereferencing it.
//!
//! ## Error Handling via `Result` Type
//!
//! Errors incurred by the user **MUST NOT** stop the kernel. Each handler
//! returns `Result<usize, KernelError>`, and the two cases mean different
//! things:
//!
//! - `Ok(value)` is the word stored to `%rax`. Recoverable failures are
//!   reported in-band this way, as the conventional sentinels (`-1`, or `0`
//!   for the calls that return a boolean or a byte count).
//! - `Err(KernelError)` means the process violated the call protocol, for
//!   example by passing an unmapped buffer or a descriptor it never opened.
//!   The dispatcher in [`Task::syscall`] responds by killing the process;
//!   the error never reaches user space as a value.
//!
//! [`uaccess`]: milos::syscall::uaccess
//! [`Task::syscall`]: milos::task::Task::syscall

use arrayvec::ArrayVec;
use milos::{
    KernelError,
    syscall::{Registers, uaccess::UserPtrRO},
    task::AddressSpace,
};

/// Greatest number of argument words any system call takes.
pub const MAX_ARGS: usize = 3;

/// A forward-only cursor over the words of a user stack image.
///
/// The cursor starts at the trapped `%rsp` and moves one machine word per
/// pop. Every word is validated against the caller's address space before
/// it is read, so a stack pointer that does not lead to readable user
/// words surfaces as [`KernelError::BadAddress`] instead of a stray kernel
/// access.
pub struct UserStack {
    base: usize,
    consumed: usize,
}

impl UserStack {
    /// Creates a cursor over the stack image starting at `rsp`.
    pub fn new(rsp: usize) -> Self {
        UserStack { base: rsp, consumed: 0 }
    }

    /// Pops the next machine word off the stack image.
    ///
    /// The n-th pop reads `rsp + 8 * n`; the cursor never moves backwards
    /// and never re-reads a word.
    pub fn pop_word(&mut self, mm: &dyn AddressSpace) -> Result<usize, KernelError> {
        let addr = self
            .base
            .checked_add(self.consumed * core::mem::size_of::<usize>())
            .ok_or(KernelError::BadAddress)?;
        let word = UserPtrRO::<usize>::new(addr).get(mm)?;
        self.consumed += 1;
        Ok(word)
    }
}

/// A struct representing the system call ABI (Application Binary Interface).
///
/// This struct provides a way to access and manipulate the system call's
/// arguments and return value in the context of the system call handler. It
/// holds the call number popped off the top of the user stack, the argument
/// words loaded so far, and a mutable reference to the CPU registers
/// ([`Registers`]) of the trapped frame.
///
/// Arguments are loaded lazily: [`from_registers`] reads only the call
/// number, and the dispatcher asks for exactly as many argument words as
/// the decoded call takes via [`load_args`]. A request the stack image
/// cannot satisfy fails before any handler runs.
///
/// [`from_registers`]: Self::from_registers
/// [`load_args`]: Self::load_args
pub struct SyscallAbi<'a> {
    /// The system call number that identifies the requested system service.
    pub sysno: usize,
    args: ArrayVec<usize, MAX_ARGS>,
    usp: UserStack,
    mm: &'a dyn AddressSpace,
    regs: &'a mut Registers,
}

impl<'a> SyscallAbi<'a> {
    /// Constructs a [`SyscallAbi`] instance from the provided registers.
    ///
    /// This function reads the system call number from the top of the user
    /// stack, at the `%rsp` saved in `regs`, validating the access against
    /// `mm`. Argument words are not touched yet.
    ///
    /// # Errors
    /// Returns [`KernelError::BadAddress`] when the saved stack pointer
    /// does not point at a readable user-space word.
    pub fn from_registers(
        regs: &'a mut Registers,
        mm: &'a dyn AddressSpace,
    ) -> Result<SyscallAbi<'a>, KernelError> {
        let mut usp = UserStack::new(*regs.rsp());
        let sysno = usp.pop_word(mm)?;
        Ok(SyscallAbi {
            sysno,
            args: ArrayVec::new(),
            usp,
            mm,
            regs,
        })
    }

    /// Pops the call's `arity` argument words off the user stack.
    ///
    /// # Errors
    /// Returns [`KernelError::BadAddress`] when the stack image does not
    /// cover all of them. No argument is handed to a handler in that case.
    pub fn load_args(&mut self, arity: usize) -> Result<(), KernelError> {
        debug_assert!(arity <= MAX_ARGS);
        while self.args.len() < arity {
            let word = self.usp.pop_word(self.mm)?;
            self.args.push(word);
        }
        Ok(())
    }

    /// Returns argument `idx` of the call.
    ///
    /// The argument must have been loaded with [`load_args`] first.
    ///
    /// [`load_args`]: Self::load_args
    pub fn arg(&self, idx: usize) -> usize {
        self.args[idx]
    }

    /// Sets the return value for the system call.
    ///
    /// This function stores `val` into the `%rax` register of the trapped
    /// frame, where the user program picks it up as the call's result once
    /// the frame resumes.
    pub fn set_return_value(self, val: usize) {
        *self.regs.rax() = val;
    }
}
