//! The process model.
//!
//! A [`Process`] is the kernel-side state of one running user program: its
//! invocation name, its address space, its file descriptor table, and
//! handles to the kernel services it is allowed to reach (the filesystem,
//! the console, the process manager, and the power plane). The system call
//! handlers live here as methods; the dispatcher in the crate root decodes
//! a trapped request into one of them.
//!
//! ## Termination protocol
//!
//! A process stops running through exactly one gate: [`Process::terminate`]
//! records the exit status into a write-once cell shared with whoever waits
//! on the process, and announces the termination on the console. The first
//! recording wins; anything that happens to a process after it has an exit
//! status cannot change that status or print a second line. Both the
//! voluntary path (the `exit` call) and the involuntary one (a protocol
//! violation, via [`Process::kill`]) go through this gate, so a process
//! that dies for passing a kernel pointer reports `-1` the same way an
//! explicit `exit(-1)` would.

use crate::{
    file_struct::{File, FileDescriptor, FileStruct},
    syscall::SyscallAbi,
};
use alloc::{format, string::String, sync::Arc, vec, vec::Vec};
use milos::{
    KernelError,
    fs::FileSystem,
    power::Power,
    sync::atomic::{AtomicU64, Ordering},
    syscall::uaccess::{UserCString, UserU8SliceRO, UserU8SliceWO},
    task::{AddressSpace, Pid, ProcessManager},
    teletype::Console,
};

/// The word `-1` as user code sees it, reporting a soft failure.
const FAILURE: usize = usize::MAX;

/// Interprets argument `idx` of the call as a file descriptor.
///
/// An argument word that does not fit an `i32` names no descriptor.
fn fd_arg(abi: &SyscallAbi, idx: usize) -> Result<FileDescriptor, KernelError> {
    i32::try_from(abi.arg(idx))
        .map(FileDescriptor)
        .map_err(|_| KernelError::BadFileDescriptor)
}

/// Bit marking an [`ExitStatus`] cell as written.
const EXITED: u64 = 1 << 63;

/// Write-once exit status cell of a process.
///
/// The cell is shared between the process itself and the process manager,
/// which reads it on behalf of a waiting parent once the process has fully
/// exited. The status and the "has exited" flag are packed into one atomic
/// word, so recording is a single compare-exchange and there is no window
/// in which a process looks exited without a status.
#[derive(Clone)]
pub struct ExitStatus(Arc<AtomicU64>);

impl ExitStatus {
    /// Creates a cell in the "still running" state.
    pub fn new() -> Self {
        ExitStatus(Arc::new(AtomicU64::new(0)))
    }

    /// Records `status` if none has been recorded yet.
    ///
    /// Returns whether this call was the one that recorded it.
    pub fn record(&self, status: i32) -> bool {
        let packed = EXITED | u64::from(status as u32);
        self.0
            .compare_exchange(0, packed, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns the recorded status, or `None` while the process runs.
    pub fn get(&self) -> Option<i32> {
        let packed = self.0.load(Ordering::SeqCst);
        if packed & EXITED != 0 {
            Some(packed as u32 as i32)
        } else {
            None
        }
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel-side state of a user process.
pub struct Process {
    name: String,
    user: bool,
    exit_status: ExitStatus,
    mm: Arc<dyn AddressSpace>,
    fs: FileSystem,
    console: Console,
    pm: Arc<dyn ProcessManager>,
    power: Arc<dyn Power>,
    /// The open-file state of the process.
    pub file_struct: FileStruct,
}

impl Process {
    /// Creates the state of a process named `name`.
    ///
    /// The name is the full invocation string, program name first,
    /// optionally followed by space-separated arguments. Kernel tasks that
    /// reuse this plumbing pass `user = false`; they do not announce their
    /// termination on the console.
    pub fn new(
        name: String,
        user: bool,
        mm: Arc<dyn AddressSpace>,
        fs: FileSystem,
        console: Console,
        pm: Arc<dyn ProcessManager>,
        power: Arc<dyn Power>,
    ) -> Self {
        Process {
            name,
            user,
            exit_status: ExitStatus::new(),
            mm,
            fs,
            console,
            pm,
            power,
            file_struct: FileStruct::new(),
        }
    }

    /// Full invocation string the process was started with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the program image: the invocation string up to the first
    /// space.
    pub fn program_name(&self) -> &str {
        self.name.split(' ').next().unwrap_or("")
    }

    /// The exit status cell shared with the process manager.
    pub fn exit_status(&self) -> &ExitStatus {
        &self.exit_status
    }

    /// Address space of the process.
    pub fn address_space(&self) -> Arc<dyn AddressSpace> {
        self.mm.clone()
    }

    /// Marks the process as exited with `status`.
    ///
    /// The first terminator wins; later calls change nothing. A user
    /// process announces its termination on the console, exactly once, as
    /// `<program-name>: exit(<status>)`.
    pub fn terminate(&mut self, status: i32) {
        if self.exit_status.record(status) && self.user {
            let line = format!("{}: exit({})\n", self.program_name(), status);
            let _ = self.console.write(line.as_bytes());
        }
    }

    /// Terminates the process for violating the system call protocol.
    ///
    /// The recorded status is `-1`, indistinguishable from an explicit
    /// `exit(-1)`.
    pub fn kill(&mut self) {
        self.terminate(-1);
    }

    /// Shuts the machine down.
    ///
    /// # Syscall API
    /// ```c
    /// void halt(void);
    /// ```
    ///
    /// Does not return. No exit status is recorded and no termination line
    /// is printed; the machine is simply gone.
    pub fn halt(&self) -> ! {
        self.power.shutdown()
    }

    /// Terminates the calling process.
    ///
    /// # Syscall API
    /// ```c
    /// void exit(int status);
    /// ```
    /// - `status`: Exit status to report to a waiting parent. `0`
    ///   conventionally indicates success.
    ///
    /// Does not return to the caller; the trapped frame is never resumed.
    pub fn exit(&mut self, abi: &SyscallAbi) {
        let status = abi.arg(0) as i32;
        self.terminate(status);
    }

    /// Spawns a new process running the named program.
    ///
    /// # Syscall API
    /// ```c
    /// pid_t exec(const char *cmd_line);
    /// ```
    /// - `cmd_line`: Program name, optionally followed by space-separated
    ///   arguments.
    ///
    /// Returns the new process's pid, or -1 if the program cannot be
    /// loaded.
    pub fn exec(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let cmd_line = UserCString::new(abi.arg(0)).read(&*self.mm)?;
        match self.pm.spawn(&cmd_line) {
            Ok(Pid(pid)) => Ok(pid as usize),
            Err(_) => Ok(FAILURE),
        }
    }

    /// Waits for a child process to exit.
    ///
    /// # Syscall API
    /// ```c
    /// int wait(pid_t pid);
    /// ```
    /// - `pid`: The child to wait for.
    ///
    /// Blocks until the child exits and returns its exit status. Returns
    /// -1 without blocking if `pid` is not an unreaped child of the
    /// caller; an argument word that does not fit a pid names no child.
    /// Each child can be waited for at most once.
    pub fn wait(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let pid = match i32::try_from(abi.arg(0)) {
            Ok(pid) => Pid(pid),
            Err(_) => return Ok(FAILURE),
        };
        match self.pm.wait(pid) {
            Ok(status) => Ok(status as isize as usize),
            Err(_) => Ok(FAILURE),
        }
    }

    /// Creates a file.
    ///
    /// # Syscall API
    /// ```c
    /// bool create(const char *file, unsigned initial_size);
    /// ```
    /// - `file`: Name of the file to create.
    /// - `initial_size`: Size of the file in bytes.
    ///
    /// Returns whether the file was created. Creating a file does not open
    /// it.
    pub fn create(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let name = UserCString::new(abi.arg(0)).read(&*self.mm)?;
        let size = abi.arg(1);
        match self.fs.create(&name, size) {
            Ok(()) => Ok(1),
            Err(_) => Ok(0),
        }
    }

    /// Removes a file from the filesystem namespace.
    ///
    /// # Syscall API
    /// ```c
    /// bool remove(const char *file);
    /// ```
    /// - `file`: Name of the file to remove.
    ///
    /// Returns whether the name was removed. Descriptors already open on
    /// the file remain usable; the file's contents live on until the last
    /// of them is closed.
    pub fn remove(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let name = UserCString::new(abi.arg(0)).read(&*self.mm)?;
        match self.fs.remove(&name) {
            Ok(()) => Ok(1),
            Err(_) => Ok(0),
        }
    }

    /// Opens a file and returns a file descriptor for it.
    ///
    /// # Syscall API
    /// ```c
    /// int open(const char *file);
    /// ```
    /// - `file`: Name of the file to open.
    ///
    /// Returns a descriptor (always 2 or greater; 0 and 1 are the
    /// console), or -1 if the file does not exist or the descriptor table
    /// is full. When the opened file is the running program's own image,
    /// writes to it are denied until the descriptor is closed. No failure
    /// path leaks the opened file.
    pub fn open(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let name = UserCString::new(abi.arg(0)).read(&*self.mm)?;
        let handle = match self.fs.open(&name) {
            Ok(handle) => handle,
            Err(_) => return Ok(FAILURE),
        };
        let file = File::new(handle, name == self.program_name());
        match self.file_struct.install_file(file) {
            Ok(FileDescriptor(fd)) => Ok(fd as usize),
            // Installing dropped the file, closing it.
            Err(_) => Ok(FAILURE),
        }
    }

    /// Reports the size of an open file.
    ///
    /// # Syscall API
    /// ```c
    /// int filesize(int fd);
    /// ```
    /// - `fd`: Descriptor of the file.
    ///
    /// Returns the file's size in bytes.
    pub fn filesize(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = fd_arg(abi, 0)?;
        let file = self.file_struct.get(fd)?;
        Ok(file.file.size())
    }

    /// Reads from an open descriptor into a user buffer.
    ///
    /// # Syscall API
    /// ```c
    /// int read(int fd, void *buffer, unsigned size);
    /// ```
    /// - `fd`: Descriptor to read from.
    /// - `buffer`: Destination buffer in user space.
    /// - `size`: Number of bytes to read.
    ///
    /// Descriptor 0 reads from the console one byte at a time, translating
    /// carriage returns to newlines, until `size` bytes have arrived or
    /// the device reports end of input. Any other descriptor reads from
    /// the file at its current position; the position advances by the
    /// number of bytes actually read, which may be less than `size` near
    /// end of file, down to 0.
    pub fn read(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = fd_arg(abi, 0)?;
        let addr = abi.arg(1);
        let len = abi.arg(2);
        // Probe the whole destination before consuming any input; a read
        // into a bad buffer has no effect at all.
        UserU8SliceWO::new(addr, len).put(&*self.mm, &[])?;
        match fd.0 {
            0 => self.read_console(addr, len),
            1 => Err(KernelError::BadFileDescriptor),
            _ => self.read_file(fd, addr, len),
        }
    }

    fn read_console(&mut self, addr: usize, len: usize) -> Result<usize, KernelError> {
        let mut data = Vec::with_capacity(len.min(4096));
        while data.len() < len {
            match self.console.read_byte() {
                Ok(Some(b'\r')) => data.push(b'\n'),
                Ok(Some(byte)) => data.push(byte),
                Ok(None) | Err(_) => break,
            }
        }
        UserU8SliceWO::new(addr, len).put(&*self.mm, &data)?;
        Ok(data.len())
    }

    fn read_file(
        &mut self,
        fd: FileDescriptor,
        addr: usize,
        len: usize,
    ) -> Result<usize, KernelError> {
        let file = self.file_struct.get_mut(fd)?;
        let mut data = vec![0u8; len];
        let n = match file.file.read_at(file.position, &mut data) {
            Ok(n) => n,
            Err(_) => return Ok(0),
        };
        UserU8SliceWO::new(addr, len).put(&*self.mm, &data[..n])?;
        file.position += n;
        Ok(n)
    }

    /// Writes from a user buffer to an open descriptor.
    ///
    /// # Syscall API
    /// ```c
    /// int write(int fd, const void *buffer, unsigned size);
    /// ```
    /// - `fd`: Descriptor to write to.
    /// - `buffer`: Source buffer in user space.
    /// - `size`: Number of bytes to write.
    ///
    /// Descriptor 1 sends the whole buffer to the console in one piece, so
    /// buffers written by concurrently running processes never interleave
    /// within each other. Any other descriptor writes to the file at its
    /// current position and advances it by the number of bytes actually
    /// written, which comes up short when the file runs out of room, down
    /// to 0. Writes to a file whose image backs a running program are
    /// denied and report 0 bytes.
    pub fn write(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = fd_arg(abi, 0)?;
        let addr = abi.arg(1);
        let len = abi.arg(2);
        let data = UserU8SliceRO::new(addr, len).get(&*self.mm)?;
        match fd.0 {
            0 => Err(KernelError::BadFileDescriptor),
            1 => match self.console.write(&data) {
                Ok(n) => Ok(n),
                Err(_) => Ok(0),
            },
            _ => {
                let file = self.file_struct.get_mut(fd)?;
                match file.file.write_at(file.position, &data) {
                    Ok(n) => {
                        file.position += n;
                        Ok(n)
                    }
                    Err(_) => Ok(0),
                }
            }
        }
    }

    /// Moves the position of an open descriptor.
    ///
    /// # Syscall API
    /// ```c
    /// void seek(int fd, unsigned position);
    /// ```
    /// - `fd`: Descriptor to reposition.
    /// - `position`: New position, in bytes from the start of the file.
    ///
    /// The position may point past the end of the file; a later read
    /// reports end of file there, and a later write comes up short. Only
    /// the descriptor's own bookkeeping changes; the filesystem is not
    /// consulted.
    pub fn seek(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = fd_arg(abi, 0)?;
        let position = abi.arg(1);
        let file = self.file_struct.get_mut(fd)?;
        file.position = position;
        Ok(0)
    }

    /// Reports the position of an open descriptor.
    ///
    /// # Syscall API
    /// ```c
    /// unsigned tell(int fd);
    /// ```
    /// - `fd`: Descriptor to query.
    ///
    /// Returns the position the next read or write would start at.
    pub fn tell(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = fd_arg(abi, 0)?;
        Ok(self.file_struct.get(fd)?.position)
    }

    /// Closes an open descriptor.
    ///
    /// # Syscall API
    /// ```c
    /// void close(int fd);
    /// ```
    /// - `fd`: Descriptor to close.
    ///
    /// The descriptor is released for reuse and the kernel's handle on the
    /// file is dropped; a write denial taken when the descriptor was
    /// opened is lifted.
    pub fn close(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = fd_arg(abi, 0)?;
        self.file_struct.release(fd)?;
        Ok(0)
    }
}
