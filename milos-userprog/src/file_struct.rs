//! # File state of a process.
//!
//! One of the kernel's primary responsibilities is managing process state,
//! and a large part of that state is the set of files the process has open.
//! A **file** is an interface for accessing disk-based data: at its core, a
//! sequential stream of bytes identified by a name.
//!
//! Processes interact with files through **file descriptors**, which serve
//! as handles to open file objects. File descriptors provide an indirection
//! layer that allows user programs to perform operations like reading,
//! writing, seeking, and closing, without exposing the internal details of
//! file objects. This indirection plays a security role: actual file
//! objects reside in kernel space and are never directly accessible from
//! user space. By using descriptors as opaque references, the operating
//! system enforces strict isolation between user and kernel memory,
//! preventing accidental or malicious tampering with kernel-managed
//! resources.
//!
//! File descriptors are small integer values that index into the process's
//! file descriptor table. Two of them never appear in the table at all:
//!
//! - **Standard Input - File Descriptor 0**: Reads from the console.
//! - **Standard Output - File Descriptor 1**: Writes to the console.
//!
//! Descriptors handed out for opened files start at 2. The table itself is
//! an arena of slots with a free list on top: installing a file reuses the
//! most recently released slot, or appends a fresh one, and releasing a
//! descriptor pushes its slot onto the free list. Install, lookup, and
//! release are all constant-time, and a descriptor is never handed out
//! while a previous holder could still believe it owns it.
//!
//! A process never sees the table directly. The system call handlers in
//! [`crate::process`] translate descriptor words from the user stack into
//! [`FileDescriptor`]s and go through [`FileStruct`]; a word that does not
//! name a live descriptor is a protocol violation and costs the process its
//! life.

use alloc::vec::Vec;
use milos::{KernelError, fs::RegularFile};

/// Most files a process may hold open at once.
pub const OPEN_MAX: usize = 128;

/// First descriptor value backed by the table; 0 and 1 are the console.
const FD_BASE: i32 = 2;

/// Represents an index into a process's file descriptor table.
///
/// In most operating systems, each process maintains a **file descriptor
/// table** that maps small integers (file descriptors) to open file objects.
/// A [`FileDescriptor`] is a wrapper around an `i32` that provides
/// stronger type safety when handling these indices in the kernel.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct FileDescriptor(pub i32);

/// The per-descriptor state of an open regular file.
///
/// This struct pairs the kernel's handle on the file with the descriptor's
/// own bookkeeping: the stream position the next read or write starts at,
/// and whether this open denied writes to the file.
pub struct File {
    /// The kernel file handle backing the descriptor.
    pub file: RegularFile,
    /// The current position in the file (offset).
    ///
    /// This field keeps track of the position of the file pointer within
    /// the file, measured in bytes from the beginning. It is advanced by
    /// read and write operations and repositioned by seek.
    pub position: usize,
    /// Whether this open placed a write denial on the file.
    ///
    /// The denial is lifted when the descriptor dies, wherever that
    /// happens: an explicit close, a failed install, or process teardown.
    write_denied: bool,
}

impl File {
    /// Wraps an open file handle into descriptor state.
    ///
    /// With `deny_write` set, writes to the underlying file are denied
    /// until this [`File`] is dropped. This is how a process's own program
    /// image is protected while the process runs with a handle to it.
    pub fn new(file: RegularFile, deny_write: bool) -> Self {
        if deny_write {
            file.deny_write();
        }
        File {
            file,
            position: 0,
            write_denied: deny_write,
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.write_denied {
            self.file.allow_write();
        }
    }
}

/// The [`FileStruct`] represents the open-file state of a specific process,
/// corresponding to the Linux kernel's `struct files_struct`.
///
/// This struct owns the file descriptor table: an arena of slots holding
/// [`File`] entries, plus a free list of released slot indices. It is
/// responsible for handing out descriptors, resolving them on every file
/// system call, and reclaiming them on close, all in constant time.
pub struct FileStruct {
    slots: Vec<Option<File>>,
    free: Vec<usize>,
}

impl Default for FileStruct {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStruct {
    /// Creates an empty file descriptor table.
    ///
    /// Descriptors 0 and 1 are not part of the table; a fresh process can
    /// already use them for console I/O.
    pub fn new() -> Self {
        FileStruct {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Installs a [`File`] into the process's file descriptor table.
    ///
    /// This method assigns the most recently released slot to `file`, or
    /// grows the table by one slot when none is free, and returns the
    /// resulting [`FileDescriptor`].
    ///
    /// # Errors
    /// - Returns [`KernelError::TooManyOpenFile`] if the process already
    ///   has [`OPEN_MAX`] open files. `file` is dropped in that case, which
    ///   closes it.
    pub fn install_file(&mut self, file: File) -> Result<FileDescriptor, KernelError> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                if self.slots.len() == OPEN_MAX {
                    return Err(KernelError::TooManyOpenFile);
                }
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[slot] = Some(file);
        Ok(FileDescriptor(slot as i32 + FD_BASE))
    }

    /// Looks up the open file behind `fd`.
    ///
    /// # Errors
    /// - Returns [`KernelError::BadFileDescriptor`] if `fd` does not name a
    ///   live entry of the table. The console descriptors 0 and 1 are never
    ///   in the table.
    pub fn get(&self, fd: FileDescriptor) -> Result<&File, KernelError> {
        self.slots
            .get(Self::slot_of(fd)?)
            .and_then(Option::as_ref)
            .ok_or(KernelError::BadFileDescriptor)
    }

    /// Looks up the open file behind `fd`, mutably.
    ///
    /// # Errors
    /// - Returns [`KernelError::BadFileDescriptor`] if `fd` does not name a
    ///   live entry of the table.
    pub fn get_mut(&mut self, fd: FileDescriptor) -> Result<&mut File, KernelError> {
        self.slots
            .get_mut(Self::slot_of(fd)?)
            .and_then(Option::as_mut)
            .ok_or(KernelError::BadFileDescriptor)
    }

    /// Removes `fd` from the table, returning its [`File`].
    ///
    /// The slot becomes the first candidate for reuse. Releasing a
    /// descriptor a second time fails like any other stale descriptor.
    ///
    /// # Errors
    /// - Returns [`KernelError::BadFileDescriptor`] if `fd` does not name a
    ///   live entry of the table.
    pub fn release(&mut self, fd: FileDescriptor) -> Result<File, KernelError> {
        let slot = Self::slot_of(fd)?;
        let file = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(KernelError::BadFileDescriptor)?;
        self.free.push(slot);
        Ok(file)
    }

    fn slot_of(fd: FileDescriptor) -> Result<usize, KernelError> {
        if fd.0 < FD_BASE {
            return Err(KernelError::BadFileDescriptor);
        }
        Ok((fd.0 - FD_BASE) as usize)
    }
}
