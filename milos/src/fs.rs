//! Filesystem abstraction.
//!
//! The layer is split in two. The [`traits`] module defines what a
//! filesystem implementation must provide: a flat namespace of regular
//! files with offset-based reads and writes. The handle types in this
//! module wrap an implementation and serialize every call into it behind a
//! single filesystem lock, because the implementations are not safe for
//! concurrent access from multiple threads.
//!
//! The lock is held strictly around the call into the implementation.
//! Callers pass kernel buffers; user memory is copied in or out before or
//! after the call, never while the lock is held.

/// Defines traits for file system operations.
pub mod traits {
    use crate::KernelError;
    use alloc::sync::Arc;

    /// Trait representing a filesystem.
    ///
    /// The namespace is flat: names do not contain directories and refer
    /// directly to regular files.
    pub trait FileSystem
    where
        Self: Send + Sync,
    {
        /// Opens the file named `name`.
        ///
        /// # Returns
        /// - `Ok(Arc<dyn RegularFile>)`: An inode handle for the file.
        /// - `Err(KernelError::NoSuchEntry)`: If no file has this name.
        fn open(&self, name: &str) -> Result<Arc<dyn RegularFile>, KernelError>;

        /// Creates a file named `name` holding `size` zero bytes.
        ///
        /// # Returns
        /// - `Ok(())`: If the file was created.
        /// - `Err(KernelError::FileExist)`: If the name is already taken.
        /// - `Err(KernelError::NameTooLong)`: If the name does not fit the
        ///   on-disk directory entry.
        fn create(&self, name: &str, size: usize) -> Result<(), KernelError>;

        /// Removes the file named `name` from the namespace.
        ///
        /// Open handles to the file stay valid; the file's contents are
        /// reclaimed once the last handle is dropped.
        ///
        /// # Returns
        /// - `Ok(())`: If the name was removed.
        /// - `Err(KernelError::NoSuchEntry)`: If no file has this name.
        fn remove(&self, name: &str) -> Result<(), KernelError>;
    }

    /// Trait representing a regular file in the filesystem.
    ///
    /// A regular file contains user data and supports positioned read and
    /// write operations. The implementation is oblivious to per-process
    /// state; file positions live with whoever holds the handle.
    pub trait RegularFile
    where
        Self: Send + Sync,
    {
        /// Returns the size of the file in bytes.
        fn size(&self) -> usize;

        /// Reads data from the file starting at byte `offset`.
        ///
        /// # Returns
        /// - `Ok(usize)`: The number of bytes read. Reads past the end of
        ///   the file return fewer bytes than requested, down to `Ok(0)`.
        /// - `Err(KernelError)`: An error occurred during the read.
        fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, KernelError>;

        /// Writes data into the file starting at byte `offset`.
        ///
        /// The file does not grow: a write that reaches the end of the
        /// file is shortened, down to `Ok(0)`.
        ///
        /// # Returns
        /// - `Ok(usize)`: The number of bytes written.
        /// - `Err(KernelError::OperationNotPermitted)`: If writes are
        ///   currently denied on this file.
        fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, KernelError>;

        /// Forbids writes to this file until a matching [`allow_write`].
        ///
        /// Denials nest; the file becomes writable again once every denial
        /// has been lifted.
        ///
        /// [`allow_write`]: Self::allow_write
        fn deny_write(&self);

        /// Lifts one write denial placed by [`deny_write`].
        ///
        /// [`deny_write`]: Self::deny_write
        fn allow_write(&self);
    }
}

use crate::{KernelError, sync::SpinLock};
use alloc::sync::Arc;

/// A handle to a filesystem.
///
/// All calls into the underlying implementation, from this handle and from
/// every [`RegularFile`] opened through it, are serialized behind one
/// filesystem lock.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use milos::{KernelError, fs::{self, traits}};
///
/// struct Empty;
/// impl traits::FileSystem for Empty {
///     fn open(&self, _: &str) -> Result<Arc<dyn traits::RegularFile>, KernelError> {
///         Err(KernelError::NoSuchEntry)
///     }
///     fn create(&self, _: &str, _: usize) -> Result<(), KernelError> {
///         Ok(())
///     }
///     fn remove(&self, _: &str) -> Result<(), KernelError> {
///         Err(KernelError::NoSuchEntry)
///     }
/// }
///
/// let fs = fs::FileSystem::new(Empty);
/// assert_eq!(fs.open("missing").err(), Some(KernelError::NoSuchEntry));
/// assert!(fs.create("log", 0).is_ok());
/// ```
#[derive(Clone)]
pub struct FileSystem {
    inner: Arc<dyn traits::FileSystem>,
    lock: Arc<SpinLock<()>>,
}

impl FileSystem {
    /// Creates a new [`FileSystem`] handle from a given implementation of
    /// [`traits::FileSystem`].
    ///
    /// The handle owns a fresh filesystem lock. Handles cloned from this
    /// one, and [`RegularFile`] handles opened through it, share that lock.
    pub fn new(fs: impl traits::FileSystem + 'static) -> Self {
        Self {
            inner: Arc::new(fs),
            lock: Arc::new(SpinLock::new(())),
        }
    }

    /// Opens the file named `name`, returning a handle to it.
    pub fn open(&self, name: &str) -> Result<RegularFile, KernelError> {
        let guard = self.lock.lock();
        let result = self.inner.open(name);
        guard.unlock();
        Ok(RegularFile {
            inner: result?,
            lock: self.lock.clone(),
        })
    }

    /// Creates a file named `name` holding `size` zero bytes.
    pub fn create(&self, name: &str, size: usize) -> Result<(), KernelError> {
        let guard = self.lock.lock();
        let result = self.inner.create(name, size);
        guard.unlock();
        result
    }

    /// Removes the file named `name` from the namespace.
    ///
    /// Open [`RegularFile`] handles are unaffected.
    pub fn remove(&self, name: &str) -> Result<(), KernelError> {
        let guard = self.lock.lock();
        let result = self.inner.remove(name);
        guard.unlock();
        result
    }
}

/// A handle to a regular file.
///
/// This struct provides a reference-counted handle to a file that supports
/// positioned reads and writes at the kernel level. Every method takes the
/// filesystem lock of the [`FileSystem`] the handle was opened from, for
/// exactly the duration of the call into the implementation.
#[derive(Clone)]
pub struct RegularFile {
    inner: Arc<dyn traits::RegularFile>,
    lock: Arc<SpinLock<()>>,
}

impl RegularFile {
    /// Returns the size of the file in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        let guard = self.lock.lock();
        let size = self.inner.size();
        guard.unlock();
        size
    }

    /// Reads data from the file at `offset` into the provided buffer.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes read, shortened at end of file.
    /// - `Err(KernelError)`: An error if the read operation fails.
    #[inline]
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
        let guard = self.lock.lock();
        let result = self.inner.read_at(offset, buf);
        guard.unlock();
        result
    }

    /// Writes data from the buffer into the file at `offset`.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes written, shortened at end of
    ///   file.
    /// - `Err(KernelError)`: An error if the write operation fails, in
    ///   particular [`KernelError::OperationNotPermitted`] while writes are
    ///   denied.
    #[inline]
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, KernelError> {
        let guard = self.lock.lock();
        let result = self.inner.write_at(offset, buf);
        guard.unlock();
        result
    }

    /// Forbids writes to this file until a matching [`allow_write`].
    ///
    /// [`allow_write`]: Self::allow_write
    #[inline]
    pub fn deny_write(&self) {
        let guard = self.lock.lock();
        self.inner.deny_write();
        guard.unlock();
    }

    /// Lifts one write denial placed by [`deny_write`].
    ///
    /// [`deny_write`]: Self::deny_write
    #[inline]
    pub fn allow_write(&self) {
        let guard = self.lock.lock();
        self.inner.allow_write();
        guard.unlock();
    }
}
