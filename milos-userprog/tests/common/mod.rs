//! Test rig for driving the system call layer from the outside.
//!
//! A [`Machine`] bundles one process with scripted stand-ins for every
//! kernel service it reaches: a [`UserImage`] serving as its address
//! space, a [`ScriptedTty`] console, a [`FakeFs`] filesystem and a
//! [`FakePm`] process manager. Tests poke argument data into the image,
//! push a call frame the way a trapping user program would, run the
//! dispatcher, and then inspect the return register, the image, the
//! console transcript and the exit status.

use milos::{
    KernelError,
    addressing::{PAGE_SIZE, Va},
    fs::{FileSystem, traits},
    power::Power,
    sync::SpinLock,
    syscall::{
        Registers,
        uaccess::{UserU8SliceRO, UserU8SliceWO},
    },
    task::{AddressSpace, Pid, ProcessManager, Task},
    teletype::{Console, ScriptedTty},
};
use milos_userprog::{Process, SyscallNumber};
use std::{
    collections::BTreeMap,
    ops::Range,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Longest file name [`FakeFs`] accepts, matching an on-disk directory
/// entry.
pub const NAME_MAX: usize = 14;

/// Image offset where [`Machine::call`] builds its call frames.
const FRAME: usize = 63 * PAGE_SIZE;

/// A chunk of host memory standing in for the mapped part of a user
/// address space.
///
/// Addresses inside the image are real heap addresses, which on a 64-bit
/// host fall inside the user half of the kernel's address model, so the
/// kernel's accessors operate on them unmodified. Everything outside the
/// image is unmapped as far as [`AddressSpace::access_ok`] is concerned.
pub struct UserImage {
    _backing: Vec<u8>,
    base: usize,
    size: usize,
}

impl UserImage {
    /// Allocates an image of `pages` mapped pages.
    pub fn new(pages: usize) -> Self {
        let mut backing = vec![0u8; (pages + 1) * PAGE_SIZE];
        let base = (backing.as_mut_ptr() as usize + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        UserImage {
            _backing: backing,
            base,
            size: pages * PAGE_SIZE,
        }
    }

    /// User-space address of byte `offset` of the image.
    pub fn addr(&self, offset: usize) -> usize {
        self.base + offset
    }

    /// One past the last mapped address.
    pub fn end(&self) -> usize {
        self.base + self.size
    }

    /// Number of mapped bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Plants `bytes` at `offset`, the way a user program would have
    /// prepared them before trapping.
    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        UserU8SliceWO::new(self.addr(offset), bytes.len())
            .put(self, bytes)
            .unwrap();
    }

    /// Reads `len` bytes back out of the image.
    pub fn peek(&self, offset: usize, len: usize) -> Vec<u8> {
        UserU8SliceRO::new(self.addr(offset), len).get(self).unwrap()
    }
}

impl AddressSpace for UserImage {
    fn access_ok(&self, addr: Range<Va>, _is_write: bool) -> bool {
        addr.start.into_usize() >= self.base && addr.end.into_usize() <= self.end()
    }
}

/// An in-memory file backing a [`FakeFs`] entry.
pub struct FakeInode {
    content: SpinLock<Vec<u8>>,
    denials: AtomicUsize,
}

impl FakeInode {
    fn new(content: Vec<u8>) -> Self {
        FakeInode {
            content: SpinLock::new(content),
            denials: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the file's bytes.
    pub fn contents(&self) -> Vec<u8> {
        let guard = self.content.lock();
        let out = guard.clone();
        guard.unlock();
        out
    }

    /// Number of write denials currently placed on the file.
    pub fn denials(&self) -> usize {
        self.denials.load(Ordering::SeqCst)
    }
}

impl traits::RegularFile for FakeInode {
    fn size(&self) -> usize {
        let guard = self.content.lock();
        let size = guard.len();
        guard.unlock();
        size
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
        let guard = self.content.lock();
        // A position past the end transfers nothing.
        let start = offset.min(guard.len());
        let n = (guard.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&guard[start..start + n]);
        guard.unlock();
        Ok(n)
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, KernelError> {
        if self.denials.load(Ordering::SeqCst) > 0 {
            return Err(KernelError::OperationNotPermitted);
        }
        let mut guard = self.content.lock();
        let start = offset.min(guard.len());
        let n = (guard.len() - start).min(buf.len());
        guard[start..start + n].copy_from_slice(&buf[..n]);
        guard.unlock();
        Ok(n)
    }

    fn deny_write(&self) {
        self.denials.fetch_add(1, Ordering::SeqCst);
    }

    fn allow_write(&self) {
        self.denials.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeFsInner {
    files: SpinLock<BTreeMap<String, Arc<FakeInode>>>,
}

/// A flat in-memory filesystem with Drop-observable inodes.
///
/// Clones share the namespace, so a test can keep one handle while the
/// kernel owns another through its [`FileSystem`] wrapper.
#[derive(Clone)]
pub struct FakeFs {
    inner: Arc<FakeFsInner>,
}

impl FakeFs {
    pub fn new() -> Self {
        FakeFs {
            inner: Arc::new(FakeFsInner {
                files: SpinLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Plants a file with the given contents, returning the inode so the
    /// test can watch it.
    pub fn seed(&self, name: &str, content: &[u8]) -> Arc<FakeInode> {
        let inode = Arc::new(FakeInode::new(content.to_vec()));
        let mut guard = self.inner.files.lock();
        guard.insert(String::from(name), inode.clone());
        guard.unlock();
        inode
    }
}

impl traits::FileSystem for FakeFs {
    fn open(&self, name: &str) -> Result<Arc<dyn traits::RegularFile>, KernelError> {
        let guard = self.inner.files.lock();
        let found = guard.get(name).cloned();
        guard.unlock();
        match found {
            Some(inode) => Ok(inode),
            None => Err(KernelError::NoSuchEntry),
        }
    }

    fn create(&self, name: &str, size: usize) -> Result<(), KernelError> {
        if name.len() > NAME_MAX {
            return Err(KernelError::NameTooLong);
        }
        let mut guard = self.inner.files.lock();
        let result = if guard.contains_key(name) {
            Err(KernelError::FileExist)
        } else {
            guard.insert(String::from(name), Arc::new(FakeInode::new(vec![0; size])));
            Ok(())
        };
        guard.unlock();
        result
    }

    fn remove(&self, name: &str) -> Result<(), KernelError> {
        let mut guard = self.inner.files.lock();
        let result = match guard.remove(name) {
            Some(_) => Ok(()),
            None => Err(KernelError::NoSuchEntry),
        };
        guard.unlock();
        result
    }
}

struct FakePmInner {
    programs: SpinLock<BTreeMap<String, i32>>,
    children: SpinLock<BTreeMap<i32, i32>>,
    log: SpinLock<Vec<String>>,
}

/// A scripted process manager.
///
/// Programs registered with [`add_program`] can be spawned; children
/// registered with [`add_child`] can be waited for exactly once. Every
/// spawn request is logged verbatim.
///
/// [`add_program`]: FakePm::add_program
/// [`add_child`]: FakePm::add_child
#[derive(Clone)]
pub struct FakePm {
    inner: Arc<FakePmInner>,
}

impl FakePm {
    pub fn new() -> Self {
        FakePm {
            inner: Arc::new(FakePmInner {
                programs: SpinLock::new(BTreeMap::new()),
                children: SpinLock::new(BTreeMap::new()),
                log: SpinLock::new(Vec::new()),
            }),
        }
    }

    /// Makes `name` a loadable program that spawns as `pid`.
    pub fn add_program(&self, name: &str, pid: i32) {
        let mut guard = self.inner.programs.lock();
        guard.insert(String::from(name), pid);
        guard.unlock();
    }

    /// Makes `pid` a waitable child that exited with `status`.
    pub fn add_child(&self, pid: i32, status: i32) {
        let mut guard = self.inner.children.lock();
        guard.insert(pid, status);
        guard.unlock();
    }

    /// Every command line passed to spawn so far, in order.
    pub fn spawned(&self) -> Vec<String> {
        let guard = self.inner.log.lock();
        let out = guard.clone();
        guard.unlock();
        out
    }
}

impl ProcessManager for FakePm {
    fn spawn(&self, cmd_line: &str) -> Result<Pid, KernelError> {
        let mut guard = self.inner.log.lock();
        guard.push(String::from(cmd_line));
        guard.unlock();
        let program = cmd_line.split(' ').next().unwrap_or("");
        let guard = self.inner.programs.lock();
        let found = guard.get(program).copied();
        guard.unlock();
        match found {
            Some(pid) => Ok(Pid(pid)),
            None => Err(KernelError::NoExec),
        }
    }

    fn wait(&self, pid: Pid) -> Result<i32, KernelError> {
        let mut guard = self.inner.children.lock();
        let found = guard.remove(&pid.0);
        guard.unlock();
        found.ok_or(KernelError::NoSuchEntry)
    }
}

/// A power plane whose shutdown is observable as a panic.
pub struct FakePower;

impl Power for FakePower {
    fn shutdown(&self) -> ! {
        panic!("the machine is now off");
    }
}

/// One process wired to scripted kernel services.
pub struct Machine {
    pub img: Arc<UserImage>,
    pub tty: ScriptedTty,
    pub fs: FakeFs,
    pub pm: FakePm,
    pub process: Process,
}

impl Machine {
    /// Boots a process named `name` with a console of its own.
    pub fn boot(name: &str) -> Machine {
        Machine::boot_with_tty(name, ScriptedTty::new())
    }

    /// Boots a process named `name` on an existing console device, so
    /// several machines can share one transcript.
    pub fn boot_with_tty(name: &str, tty: ScriptedTty) -> Machine {
        let img = Arc::new(UserImage::new(64));
        let fs = FakeFs::new();
        let pm = FakePm::new();
        let process = Process::new(
            String::from(name),
            true,
            img.clone(),
            FileSystem::new(fs.clone()),
            Console::new(Box::new(tty.clone())),
            Arc::new(pm.clone()),
            Arc::new(FakePower),
        );
        Machine {
            img,
            tty,
            fs,
            pm,
            process,
        }
    }

    /// Performs one system call the way a trapping user program would:
    /// the number and its arguments are pushed onto the user stack and
    /// the saved stack pointer leads to them.
    ///
    /// Returns the value the kernel left in `%rax`, sign-extended the way
    /// user code reads it. When the call kills the process, the register
    /// is untouched; check [`exited`] instead.
    ///
    /// [`exited`]: Machine::exited
    pub fn call(&mut self, no: SyscallNumber, args: &[usize]) -> isize {
        self.call_raw(usize::from(no), args)
    }

    /// Performs a system call with a raw, possibly out-of-table number.
    pub fn call_raw(&mut self, sysno: usize, args: &[usize]) -> isize {
        let word = core::mem::size_of::<usize>();
        self.img.poke(FRAME, &sysno.to_ne_bytes());
        for (n, arg) in args.iter().enumerate() {
            self.img.poke(FRAME + (n + 1) * word, &arg.to_ne_bytes());
        }
        let mut regs = Registers::new();
        *regs.rsp() = self.img.addr(FRAME);
        self.process.syscall(&mut regs);
        regs.gprs.rax as isize
    }

    /// Performs a system call with an arbitrary saved stack pointer.
    pub fn call_with_rsp(&mut self, rsp: usize) {
        let mut regs = Registers::new();
        *regs.rsp() = rsp;
        self.process.syscall(&mut regs);
    }

    /// The process's exit status, if it has terminated.
    pub fn exited(&self) -> Option<i32> {
        self.process.exit_status().get()
    }

    /// Everything written to the console so far, as text.
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.tty.output()).into_owned()
    }
}
