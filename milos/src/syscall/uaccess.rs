//! The `uaccess` module provides abstractions for interacting with user-space
//! memory in a kernel context.
//!
//! This module defines several types of user-space pointers that allow the
//! kernel to access user-space data with various access modes, such as
//! read-only or write-only.
//!
//! The types provided by this module include:
//!
//! - [`UserPtrRO`]: A one-time, read-only pointer to a user-space object of
//!   type `T`. It allows the kernel to read from user-space but does not permit
//!   writing to the data.
//! - [`UserPtrWO`]: A one-time, write-only pointer to a user-space object of
//!   type `T`. It allows the kernel to write data to user-space but does not
//!   permit reading from it.
//! - [`UserU8SliceRO`]: A one-time, read-only pointer to a slice of `u8` in
//!   user-space. This type allows the kernel to read byte slices from
//!   user-space.
//! - [`UserU8SliceWO`]: A one-time, write-only pointer to a slice of `u8` in
//!   user-space. This type allows the kernel to write byte slices to
//!   user-space.
//! - [`UserCString`]: A utility to handle C-style null-terminated strings from
//!   user-space. It provides methods for reading and converting the string into
//!   a `String` in the kernel.
//!
//! These types use unsafe code to access memory directly. Every access is
//! validated up front: the range must lie inside
//! [`USER_BASE`]..[`USER_TOP`], must not wrap around the address space, and
//! every page it touches must pass [`AddressSpace::access_ok`] of the
//! address space handed in by the caller. Only when the whole range has
//! been accepted is a single byte copied, so an access that straddles a
//! mapped and an unmapped page fails without any partial effect. If the
//! memory is not accessible, the operation fails with
//! [`KernelError::BadAddress`] instead of causing undefined behavior.

use crate::{
    KernelError,
    addressing::{PAGE_MASK, PAGE_SIZE, USER_BASE, USER_TOP, Va},
    task::AddressSpace,
};
use alloc::{string::String, vec::Vec};

/// Longest C string [`UserCString::read`] will collect, in bytes.
const CSTRING_MAX: usize = PAGE_SIZE;

/// Validates the user-space range `addr..addr + len` for an access.
///
/// The range must lie within the user half of the address space, and every
/// page it touches must be mapped with sufficient permission. A zero-length
/// range is checked against the user bounds only; it touches no pages.
fn check_range(
    mm: &dyn AddressSpace,
    addr: usize,
    len: usize,
    is_write: bool,
) -> Result<(), KernelError> {
    let end = addr.checked_add(len).ok_or(KernelError::BadAddress)?;
    if addr < USER_BASE || end > USER_TOP {
        return Err(KernelError::BadAddress);
    }
    if len == 0 {
        return Ok(());
    }
    let mut page = addr & !PAGE_MASK;
    while page < end {
        let chunk = page.max(addr)..(page + PAGE_SIZE).min(end);
        let range = Va::new(chunk.start).ok_or(KernelError::BadAddress)?
            ..Va::new(chunk.end).ok_or(KernelError::BadAddress)?;
        if !mm.access_ok(range, is_write) {
            return Err(KernelError::BadAddress);
        }
        page += PAGE_SIZE;
    }
    Ok(())
}

/// A one-time, read-only pointer to a user-space object of type `T`.
///
/// This struct allows the kernel to read from user-space while ensuring
/// safe access patterns. It prevents TOCTOU (Time-of-Check to Time-of-Use)
/// attacks by taking ownership of the pointer during operations.
///
/// # Type Parameter
/// - `T`: The type of the data being accessed. Must implement `Copy`.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserPtrRO<T>
where
    T: Copy,
{
    addr: usize,
    _ty: core::marker::PhantomData<T>,
}

impl<T> UserPtrRO<T>
where
    T: Copy,
{
    /// Creates a new `UserPtrRO` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        UserPtrRO {
            addr,
            _ty: core::marker::PhantomData,
        }
    }

    /// Reads a value of type `T` from the user-space address.
    ///
    /// Takes ownership of `self` to prevent TOCTOU attacks. The access is
    /// validated against `mm`, the address space of the calling task.
    ///
    /// Returns `Ok(T)` if successful, otherwise
    /// `Err(KernelError::BadAddress)`.
    pub fn get(self, mm: &dyn AddressSpace) -> Result<T, KernelError> {
        check_range(mm, self.addr, core::mem::size_of::<T>(), false)?;
        Ok(unsafe { { self.addr as *const T }.read_unaligned() })
    }
}

/// A one-time, write-only pointer to a user-space object of type `T`.
///
/// This struct allows the kernel to write to user-space while ensuring
/// safe access patterns. It prevents TOCTOU (Time-of-Check to Time-of-Use)
/// attacks by taking ownership of the pointer during operations.
///
/// # Type Parameter
/// - `T`: The type of the data being accessed. Must implement `Copy`.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserPtrWO<T>
where
    T: Copy,
{
    addr: usize,
    _ty: core::marker::PhantomData<T>,
}

impl<T> UserPtrWO<T>
where
    T: Copy,
{
    /// Creates a new `UserPtrWO` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        UserPtrWO {
            addr,
            _ty: core::marker::PhantomData,
        }
    }

    /// Writes a value of type `T` to the user-space address.
    ///
    /// Takes ownership of `self` to prevent TOCTOU attacks. The access is
    /// validated against `mm`, the address space of the calling task.
    ///
    /// Returns `Ok(usize)` indicating the number of bytes written, or
    /// `Err(KernelError::BadAddress)` on failure.
    pub fn put(self, mm: &dyn AddressSpace, other: T) -> Result<usize, KernelError> {
        check_range(mm, self.addr, core::mem::size_of::<T>(), true)?;
        unsafe {
            // Safety: check_range verified the target is mapped writable.
            { self.addr as *mut T }.write_unaligned(other);
        }
        Ok(core::mem::size_of::<T>())
    }
}

/// A one-time, read-only pointer to a slice of `u8` in user-space.
///
/// This struct allows the kernel to safely read from a user-space buffer while
/// preventing TOCTOU attacks by taking ownership of the pointer during
/// operations.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserU8SliceRO {
    addr: usize,
    len: usize,
}

impl UserU8SliceRO {
    /// Creates a new `UserU8SliceRO` instance with the given user-space address
    /// and length.
    pub fn new(addr: usize, len: usize) -> Self {
        UserU8SliceRO { addr, len }
    }

    /// Reads data from the user-space buffer into a `Vec<u8>`.
    ///
    /// Takes ownership of `self` to prevent TOCTOU attacks. The access is
    /// validated against `mm`, the address space of the calling task.
    ///
    /// Returns `Ok(Vec<u8>)` containing the data if successful, otherwise
    /// `Err(KernelError::BadAddress)`.
    pub fn get(self, mm: &dyn AddressSpace) -> Result<Vec<u8>, KernelError> {
        check_range(mm, self.addr, self.len, false)?;
        let mut result = Vec::new();
        result.extend_from_slice(unsafe {
            core::slice::from_raw_parts(self.addr as *const u8, self.len)
        });
        Ok(result)
    }
}

/// A one-time, write-only pointer to a slice of `u8` in user-space.
///
/// This struct allows the kernel to safely write to a user-space buffer while
/// preventing TOCTOU attacks by taking ownership of the pointer during
/// operations.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserU8SliceWO {
    addr: usize,
    len: usize,
}

impl UserU8SliceWO {
    /// Creates a new `UserU8SliceWO` instance with the given user-space address
    /// and length.
    pub fn new(addr: usize, len: usize) -> Self {
        UserU8SliceWO { addr, len }
    }

    /// Writes data from a slice to the user-space buffer.
    ///
    /// Takes ownership of `self` to prevent TOCTOU attacks. The access is
    /// validated against `mm`, the address space of the calling task. The
    /// whole buffer must be writable, even when `other` fills only part of
    /// it.
    ///
    /// Returns `Ok(usize)` indicating the number of bytes written, or
    /// `Err(KernelError::BadAddress)` on failure.
    pub fn put(self, mm: &dyn AddressSpace, other: &[u8]) -> Result<usize, KernelError> {
        let size = self.len.min(other.len());
        check_range(mm, self.addr, self.len, true)?;
        unsafe {
            core::ptr::copy_nonoverlapping(other[..size].as_ptr(), self.addr as *mut u8, size);
        }
        Ok(size)
    }
}

/// A pointer to a null-terminated C-style string in user-space.
///
/// This struct provides a safe abstraction for reading strings from user-space.
/// It iterates over the bytes until a null-terminator (`0x00`) is encountered,
/// converting the byte sequence into a valid UTF-8 `String`.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserCString {
    addr: usize,
}

impl UserCString {
    /// Creates a new `UserCString` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Reads a null-terminated string from the user-space address.
    ///
    /// This function iterates over user-space memory, collecting bytes until
    /// a null terminator (`0x00`) is found. It then attempts to convert the
    /// byte sequence into a UTF-8 `String`.
    ///
    /// The walk is validated against `mm` byte by byte, so an unterminated
    /// string fails with `KernelError::BadAddress` as soon as it runs off
    /// the mapping. Strings longer than a page fail with
    /// `KernelError::NameTooLong`, and byte sequences that are not valid
    /// UTF-8 fail with `KernelError::InvalidArgument`.
    pub fn read(self, mm: &dyn AddressSpace) -> Result<String, KernelError> {
        let mut ptr = self.addr;
        let mut result = Vec::new();
        // Iterate over the bytes to find the null-terminator (0x00).
        // If the byte is 0, we've found the null-terminator.
        loop {
            match UserPtrRO::<u8>::new(ptr).get(mm) {
                Ok(0) => {
                    return core::str::from_utf8(&result)
                        .ok()
                        .map(String::from)
                        .ok_or(KernelError::InvalidArgument);
                }
                Ok(v) => {
                    if result.len() == CSTRING_MAX {
                        return Err(KernelError::NameTooLong);
                    }
                    ptr += 1;
                    result.push(v);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
