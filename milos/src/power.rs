//! Modules for system power operations.

/// Controls the machine power state.
///
/// The kernel reaches the power plane only through this trait, so hosted
/// builds can substitute a device that records the request instead of
/// cutting power.
pub trait Power: Send + Sync {
    /// Shutdown the machine.
    ///
    /// Nothing survives this call; buffered filesystem state is not
    /// flushed.
    fn shutdown(&self) -> !;
}
