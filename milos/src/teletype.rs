//! A teletype (TTY) interface for character-based I/O.
//!
//! This module provides a trait [`Teletype`] that defines an interface for
//! reading from and writing to a teletype device, such as a serial port.
//! A device is installed into a [`Console`], the shared handle through which
//! the rest of the kernel performs console I/O. The [`ScriptedTty`] device
//! replays a prepared input script and captures everything written to it,
//! which is how console-facing code is exercised without hardware.

use crate::{KernelError, sync::SpinLock};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use crossbeam_queue::ArrayQueue;

/// The `Teletype` trait represents a generic character-based input/output
/// device.
///
/// Implementations of this trait define methods for:
/// - Writing data to the teletype (`write`)
/// - Reading data from the teletype (`read`)
///
/// This abstraction allows for different kinds of terminal or serial interfaces
/// to implement their own communication methods.
pub trait Teletype {
    /// Writes data to the teletype.
    ///
    /// # Arguments
    /// - `data`: A byte slice containing the data to be written.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully written.
    /// - `Err(KernelError)`: If the write operation failed.
    fn write(&mut self, data: &[u8]) -> Result<usize, KernelError>;

    /// Reads data from the teletype.
    ///
    /// # Arguments
    /// - `data`: A mutable byte slice where the read data will be stored.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully read. `Ok(0)` means
    ///   the device has no more input to deliver.
    /// - `Err(KernelError)`: If the read operation failed.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, KernelError>;
}

/// A shared handle to the console device.
///
/// The console serializes access to the underlying [`Teletype`] with a
/// [`SpinLock`]. A single [`write`] call covers the entire buffer under one
/// lock acquisition, so buffers written by concurrent processes never
/// interleave within each other.
///
/// [`write`]: Self::write
///
/// # Examples
///
/// ```
/// use milos::teletype::{Console, ScriptedTty};
///
/// let tty = ScriptedTty::new();
/// let console = Console::new(Box::new(tty.clone()));
/// console.write(b"hello").unwrap();
/// assert_eq!(tty.output(), b"hello");
/// ```
#[derive(Clone)]
pub struct Console(Arc<SpinLock<Box<dyn Teletype + Send>>>);

impl Console {
    /// Installs `tty` as the console device and returns a handle to it.
    pub fn new(tty: Box<dyn Teletype + Send>) -> Self {
        Console(Arc::new(SpinLock::new(tty)))
    }

    /// Writes the whole of `data` to the console.
    ///
    /// The device lock is held for the duration of the call, so the buffer
    /// reaches the device as one contiguous run of bytes.
    pub fn write(&self, data: &[u8]) -> Result<usize, KernelError> {
        let mut guard = self.0.lock();
        let result = guard.write(data);
        guard.unlock();
        result
    }

    /// Reads a single byte from the console.
    ///
    /// Returns `Ok(None)` when the device has no more input to deliver.
    pub fn read_byte(&self) -> Result<Option<u8>, KernelError> {
        let mut byte = [0u8; 1];
        let mut guard = self.0.lock();
        let result = guard.read(&mut byte);
        guard.unlock();
        match result {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) => Err(e),
        }
    }
}

/// Input ring capacity of a [`ScriptedTty`].
const SCRIPT_CAPACITY: usize = 4096;

struct ScriptedTtyInner {
    input: ArrayQueue<u8>,
    output: SpinLock<Vec<u8>>,
}

/// A teletype that replays a prepared input script and records its output.
///
/// Cloning the handle shares the underlying device, so one clone can be
/// installed into a [`Console`] while another is kept back to feed input and
/// inspect what the kernel wrote.
///
/// # Examples
///
/// ```
/// use milos::teletype::{Console, ScriptedTty};
///
/// let tty = ScriptedTty::new();
/// tty.feed(b"x");
/// let console = Console::new(Box::new(tty.clone()));
/// assert_eq!(console.read_byte().unwrap(), Some(b'x'));
/// assert_eq!(console.read_byte().unwrap(), None);
/// ```
#[derive(Clone)]
pub struct ScriptedTty {
    inner: Arc<ScriptedTtyInner>,
}

impl ScriptedTty {
    /// Creates a scripted teletype with an empty input script.
    pub fn new() -> Self {
        ScriptedTty {
            inner: Arc::new(ScriptedTtyInner {
                input: ArrayQueue::new(SCRIPT_CAPACITY),
                output: SpinLock::new(Vec::new()),
            }),
        }
    }

    /// Appends `data` to the input script.
    ///
    /// Returns the number of bytes queued before the input ring filled.
    pub fn feed(&self, data: &[u8]) -> usize {
        for (n, byte) in data.iter().enumerate() {
            if self.inner.input.push(*byte).is_err() {
                return n;
            }
        }
        data.len()
    }

    /// Returns a copy of everything written to the device so far.
    pub fn output(&self) -> Vec<u8> {
        let guard = self.inner.output.lock();
        let out = guard.clone();
        guard.unlock();
        out
    }
}

impl Default for ScriptedTty {
    fn default() -> Self {
        Self::new()
    }
}

impl Teletype for ScriptedTty {
    fn write(&mut self, data: &[u8]) -> Result<usize, KernelError> {
        let mut guard = self.inner.output.lock();
        guard.extend_from_slice(data);
        guard.unlock();
        Ok(data.len())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize, KernelError> {
        let mut n = 0;
        while n < data.len() {
            match self.inner.input.pop() {
                Some(byte) => {
                    data[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
