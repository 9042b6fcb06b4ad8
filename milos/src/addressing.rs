//! Virtual memory addressing scheme.
//!
//! This module provides the abstraction for virtual addresses. MilOS runs on
//! x86_64, where a virtual address is *canonical* only when bits 63..47 are a
//! sign extension of bit 47; the hardware faults on any other form. The
//! [`Va`] type can therefore only be constructed from a canonical address,
//! which lets the rest of the kernel pass addresses around without
//! re-checking their form.
//!
//! The module also fixes the boundaries of the user half of the address
//! space. User-mode mappings live in `[USER_BASE, USER_TOP)`: the zero page
//! is never mapped (so null and near-null pointers are always invalid), and
//! everything at or above [`USER_TOP`] belongs to the kernel. The user-memory
//! accessors in [`crate::syscall::uaccess`] enforce these bounds on every
//! access.

/// The size of a single page in memory, in bytes.
///
/// This constant represents the size of a memory page, which is 4 KiB. It is
/// used together with [`PAGE_SHIFT`] and [`PAGE_MASK`] to split an address
/// into its page frame and page offset, and by the user-memory accessors to
/// walk an address range one page at a time.
pub const PAGE_SIZE: usize = 0x1000;

/// The shift amount to get the page index from a given address.
///
/// ## Example:
/// ```
/// # use milos::addressing::PAGE_SHIFT;
/// let page_index = 0x4_2345usize >> PAGE_SHIFT;
/// assert_eq!(page_index, 0x42);
/// ```
pub const PAGE_SHIFT: usize = 12;

/// A mask for extracting the offset within a page from a given address.
///
/// ## Example:
/// ```
/// # use milos::addressing::PAGE_MASK;
/// let offset_within_page = 0x4_2345usize & PAGE_MASK;
/// assert_eq!(offset_within_page, 0x345);
/// ```
pub const PAGE_MASK: usize = 0xfff;

/// The lowest legal user-space address.
///
/// The zero page is reserved and never mapped in any address space, so every
/// address below this bound, the null pointer in particular, fails
/// validation unconditionally.
pub const USER_BASE: usize = PAGE_SIZE;

/// The exclusive upper bound of the user-space address range.
///
/// Addresses at or above this bound are the non-canonical hole and the
/// kernel half of the address space; user code must never be able to make
/// the kernel dereference them.
pub const USER_TOP: usize = 0x0000_8000_0000_0000;

/// Represents a virtual address.
///
/// The `Va` struct is a wrapper around the `usize` type representing a
/// virtual address. A `Va` can only be constructed through [`Va::new`],
/// which rejects non-canonical addresses, so holding a `Va` is proof that
/// the address has a form the hardware will accept.
///
/// Note that a canonical address is not necessarily a *mapped* address;
/// whether a page is present in the current address space is answered by
/// [`crate::task::AddressSpace::access_ok`].
///
/// ## Example:
/// ```
/// # use milos::addressing::Va;
/// let va = Va::new(0x1234_5678);
/// assert!(va.is_some());
///
/// let invalid_va = Va::new(0xdead_0000_0000_0000);
/// assert!(invalid_va.is_none());
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Va(usize);

impl Va {
    /// Creates a new virtual address if the address is canonical.
    ///
    /// # Returns
    /// - `Some(Va)`: If the address is in canonical form.
    /// - `None`: If the address is non-canonical.
    #[inline(always)]
    pub const fn new(addr: usize) -> Option<Self> {
        match addr & 0xffff_8000_0000_0000 {
            m if m == 0xffff_8000_0000_0000 || m == 0 => Some(Self(addr)),
            _ => None,
        }
    }

    /// Returns the raw `usize` representation of the virtual address.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Aligns the virtual address down to the nearest page boundary.
    ///
    /// # Example
    /// ```
    /// # use milos::addressing::Va;
    /// let va = Va::new(0x1234_5678).unwrap();
    /// assert_eq!(va.page_down().into_usize(), 0x1234_5000);
    /// ```
    #[inline]
    pub const fn page_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }
}

impl core::fmt::Debug for Va {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Va(0x{:x})", self.0)
    }
}

impl core::fmt::Display for Va {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Va(0x{:x})", self.0)
    }
}
