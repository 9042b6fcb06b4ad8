//! System call infrastructure.
//!
//! A system call traps into the kernel with the caller's register state
//! captured in a [`Registers`] frame. The task's
//! [`syscall`](crate::task::Task::syscall) handler receives the frame,
//! reads the request out of the user's stack through [`uaccess`], and
//! leaves the return value in `rax` before the frame is resumed.

pub mod uaccess;

/// Snapshot of the general purpose registers, in the order the trap entry
/// path pushes them.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralPurposeRegisters {
    /// R15 register.
    pub r15: usize,
    /// R14 register.
    pub r14: usize,
    /// R13 register.
    pub r13: usize,
    /// R12 register.
    pub r12: usize,
    /// R11 register.
    pub r11: usize,
    /// R10 register.
    pub r10: usize,
    /// R9 register.
    pub r9: usize,
    /// R8 register.
    pub r8: usize,
    /// RSI register.
    pub rsi: usize,
    /// RDI register.
    pub rdi: usize,
    /// RBP register.
    pub rbp: usize,
    /// RDX register.
    pub rdx: usize,
    /// RCX register.
    pub rcx: usize,
    /// RBX register.
    pub rbx: usize,
    /// RAX register.
    pub rax: usize,
}

/// The tail of the trap frame, pushed by the CPU itself on entry.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct InterruptStackFrame {
    /// Saved instruction pointer.
    pub rip: usize,
    /// Saved code segment selector.
    pub cs: usize,
    /// Saved CPU flags.
    pub rflags: usize,
    /// Saved user stack pointer.
    pub rsp: usize,
    /// Saved stack segment selector.
    pub ss: usize,
}

/// x86_64 trap frame.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Registers {
    /// General purpose registers saved by the trap entry path.
    pub gprs: GeneralPurposeRegisters,
    /// Interrupt stack frame saved by the CPU.
    pub interrupt_stack_frame: InterruptStackFrame,
}

impl Registers {
    /// Creates a zeroed register frame.
    ///
    /// The loader fills in the entry point, stack pointer, and segment
    /// state before the frame is first launched.
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns a mutable reference to the instruction pointer (`RIP`).
    pub fn rip(&mut self) -> &mut usize {
        &mut self.interrupt_stack_frame.rip
    }

    /// Returns a mutable reference to the stack pointer (`RSP`).
    ///
    /// While a task is trapped in the kernel, this is the user-space stack
    /// pointer at the moment of the trap.
    pub fn rsp(&mut self) -> &mut usize {
        &mut self.interrupt_stack_frame.rsp
    }

    /// Returns a mutable reference to the accumulator (`RAX`).
    ///
    /// A system call's return value is stored here before the frame is
    /// resumed.
    pub fn rax(&mut self) -> &mut usize {
        &mut self.gprs.rax
    }
}
