//! Hardware channel abstraction.
//!
//! The `HardwareChannel` trait is the seam between the process image core
//! and the privileged `piControl` driver interface. Two implementations
//! live in `pimod_core`: the real ioctl-backed channel and an in-memory
//! simulator for development and testing without hardware.

use thiserror::Error;

/// Error type for hardware channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Operation attempted on a channel that is not open.
    #[error("hardware channel is not open")]
    NotOpen,

    /// Underlying file I/O on the channel device failed.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An ioctl call reported failure.
    #[error("ioctl {request} failed: errno {errno}")]
    Ioctl {
        /// Request code of the failing call.
        request: u64,
        /// Errno reported by the kernel.
        errno: i32,
    },

    /// Access outside the process image bounds.
    #[error("access at offset {offset} (len {len}) outside process image of {image} bytes")]
    OutOfRange {
        /// Requested byte offset.
        offset: usize,
        /// Requested span in bytes.
        len: usize,
        /// Process image length.
        image: usize,
    },

    /// Channel backend not available on this platform.
    #[error("channel unsupported: {0}")]
    Unsupported(&'static str),
}

/// Abstraction over the `piControl` driver interface.
///
/// All bit operations address the process image as `(byte offset, bit
/// index)`; bit writes are atomic with respect to other bits in the same
/// byte. Block operations move whole spans of the process image.
///
/// Every call fails with [`ChannelError::NotOpen`] once `close()` has been
/// called (or if the channel never opened).
pub trait HardwareChannel: Send + Sync {
    /// Set a single bit in the process image.
    fn bit_set(&self, offset: u16, bit: u8) -> Result<(), ChannelError>;

    /// Clear a single bit in the process image.
    fn bit_reset(&self, offset: u16, bit: u8) -> Result<(), ChannelError>;

    /// Read a single bit from the process image.
    fn bit_read(&self, offset: u16, bit: u8) -> Result<bool, ChannelError>;

    /// Reset hardware counters on the device at `position`.
    ///
    /// `mask` selects the counters to reset (bit N = counter N).
    fn counter_reset(&self, position: u16, mask: u16) -> Result<(), ChannelError>;

    /// Query lifetime relay switching cycles of the device at `position`,
    /// one count per relay channel.
    fn relay_cycles(&self, position: u16) -> Result<Vec<u32>, ChannelError>;

    /// Read `buf.len()` bytes of the process image starting at `offset`.
    fn read_block(&self, buf: &mut [u8], offset: usize) -> Result<(), ChannelError>;

    /// Write `buf.len()` bytes of the process image starting at `offset`.
    fn write_block(&self, buf: &[u8], offset: usize) -> Result<(), ChannelError>;

    /// Close the channel. Subsequent calls fail with `NotOpen`.
    /// Closing an already closed channel is a no-op.
    fn close(&self) -> Result<(), ChannelError>;

    /// Whether this channel redirects onto an in-memory image instead of
    /// the real driver. Bulk synchronization is skipped for simulated
    /// channels because the shared buffer already is the image.
    fn is_simulated(&self) -> bool {
        false
    }
}
