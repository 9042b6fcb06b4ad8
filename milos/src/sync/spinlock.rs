//! SMP-supported spinlock.

use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// The lock could not be acquired at this time because the operation would
/// otherwise block.
#[derive(Debug)]
pub struct WouldBlock;

/// A mutual exclusion primitive useful for protecting shared data.
///
/// This spinlock will block threads waiting for the lock to become available.
/// The spinlock can be created via a [`new`] constructor. Each spinlock has a
/// type parameter which represents the data that it is protecting. The data
/// can only be accessed through the guards returned from [`lock`] and
/// [`try_lock`], which guarantees that the data is only ever accessed when
/// the spinlock is locked.
///
/// [`new`]: Self::new
/// [`lock`]: Self::lock
/// [`try_lock`]: Self::try_lock
///
/// # Examples
///
/// ```
/// use milos::sync::SpinLock;
///
/// let lock = SpinLock::new(0);
/// let mut guard = lock.lock();
/// *guard += 1;
/// // The lock must be "explicitly" unlocked.
/// guard.unlock();
/// assert_eq!(lock.into_inner(), 1);
/// ```
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    _pad: [u8; 15],
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new spinlock in an unlocked state ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use milos::sync::SpinLock;
    ///
    /// let spinlock = SpinLock::new(0);
    /// # let _ = spinlock;
    /// ```
    #[inline]
    pub const fn new(t: T) -> SpinLock<T> {
        SpinLock {
            data: UnsafeCell::new(t),
            _pad: [0u8; 15],
            locked: AtomicBool::new(false),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquires a spinlock, blocking the current thread until it is able to
    /// do so.
    ///
    /// Upon returning, the thread is the only thread with the lock held. A
    /// guard is returned to allow scoped access of the lock. When the guard
    /// goes out of scope without [`SpinLockGuard::unlock`], panic occurs.
    ///
    /// The exact behavior on locking a spinlock in the thread which already
    /// holds the lock is left unspecified. However, this function will not
    /// return on the second call (it might panic or deadlock, for example).
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while self.locked.fetch_or(true, Ordering::SeqCst) {
            core::hint::spin_loop();
        }
        SpinLockGuard {
            caller: core::panic::Location::caller(),
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Attempts to acquire this lock.
    ///
    /// If the lock could not be acquired at this time, then [`Err`] is
    /// returned. Otherwise, a guard is returned. This function does not
    /// block.
    ///
    /// # Errors
    ///
    /// If the spinlock could not be acquired because it is already locked,
    /// then this call will return the [`WouldBlock`] error.
    ///
    /// # Examples
    ///
    /// ```
    /// use milos::sync::SpinLock;
    ///
    /// let spinlock = SpinLock::new(0);
    /// let guard = spinlock.lock();
    /// assert!(spinlock.try_lock().is_err());
    /// guard.unlock();
    /// assert!(spinlock.try_lock().is_ok_and(|g| {
    ///     g.unlock();
    ///     true
    /// }));
    /// ```
    #[track_caller]
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, WouldBlock> {
        if !self.locked.fetch_or(true, Ordering::SeqCst) {
            Ok(SpinLockGuard {
                caller: core::panic::Location::caller(),
                lock: self,
                _not_send: PhantomData,
            })
        } else {
            Err(WouldBlock)
        }
    }

    /// Consumes this spinlock, returning the underlying data.
    ///
    /// # Examples
    ///
    /// ```
    /// use milos::sync::SpinLock;
    ///
    /// let spinlock = SpinLock::new(0);
    /// assert_eq!(spinlock.into_inner(), 0);
    /// ```
    pub fn into_inner(self) -> T
    where
        T: Sized,
    {
        self.data.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    /// Creates a `SpinLock<T>`, with the `Default` value for T.
    fn default() -> SpinLock<T> {
        SpinLock::new(Default::default())
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

/// An implementation of a "scoped lock" of a spinlock. When this structure
/// is dropped (falls out of scope) without unlock, panic occurs.
///
/// The lock must be explicitly unlocked by the [`unlock`] method.
///
/// The data protected by the spinlock can be accessed through this guard.
///
/// This structure is created by the [`lock`] and [`try_lock`] methods on
/// [`SpinLock`].
///
/// [`lock`]: SpinLock::lock
/// [`try_lock`]: SpinLock::try_lock
/// [`unlock`]: Self::unlock
pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    caller: &'static core::panic::Location<'static>,
    lock: &'a SpinLock<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T: ?Sized> SpinLockGuard<'_, T> {
    /// Releases the underlying [`SpinLock`].
    ///
    /// As the guard does **not** automatically release the lock on drop,
    /// the caller must explicitly invoke `unlock` to mark the lock as
    /// available again.
    ///
    /// # Example
    /// ```
    /// use milos::sync::SpinLock;
    ///
    /// let lock = SpinLock::new(123);
    /// let guard = lock.lock();
    ///
    /// // Work with the locked data...
    ///
    /// // Explicitly release the lock.
    /// guard.unlock();
    /// ```
    pub fn unlock(self) {
        self.lock.locked.store(false, Ordering::SeqCst);
        core::mem::forget(self);
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        panic!(
            "`.unlock()` must be explicitly called before dropping SpinLockGuard.
The lock is held at {:?}.",
            self.caller
        );
    }
}
