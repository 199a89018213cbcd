//! Simulated hardware channel.
//!
//! Redirects all driver operations onto the shared in-memory process
//! image, so the whole stack runs without a `piControl` device. The
//! simulator holds a clone of the context's image `Arc`; bulk
//! synchronization is therefore a no-op at the context level (the buffer
//! already is the image), while bit operations apply the equivalent
//! masked byte updates directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use pimod_common::channel::{ChannelError, HardwareChannel};
use pimod_common::consts::RELAY_CHANNELS;
use tracing::debug;

/// In-memory stand-in for the `piControl` driver.
pub struct SimChannel {
    image: Arc<Mutex<Vec<u8>>>,
    open: AtomicBool,
}

impl SimChannel {
    /// Create a simulated channel over the given process image.
    pub fn new(image: Arc<Mutex<Vec<u8>>>) -> Self {
        Self {
            image,
            open: AtomicBool::new(true),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, Vec<u8>>, ChannelError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ChannelError::NotOpen);
        }
        Ok(self.image.lock().expect("process image lock poisoned"))
    }

    fn check_bit(image: &[u8], offset: u16) -> Result<(), ChannelError> {
        if offset as usize >= image.len() {
            return Err(ChannelError::OutOfRange {
                offset: offset as usize,
                len: 1,
                image: image.len(),
            });
        }
        Ok(())
    }
}

impl HardwareChannel for SimChannel {
    fn bit_set(&self, offset: u16, bit: u8) -> Result<(), ChannelError> {
        let mut image = self.guard()?;
        Self::check_bit(&image, offset)?;
        image[offset as usize] |= 1 << bit;
        Ok(())
    }

    fn bit_reset(&self, offset: u16, bit: u8) -> Result<(), ChannelError> {
        let mut image = self.guard()?;
        Self::check_bit(&image, offset)?;
        image[offset as usize] &= !(1 << bit);
        Ok(())
    }

    fn bit_read(&self, offset: u16, bit: u8) -> Result<bool, ChannelError> {
        let image = self.guard()?;
        Self::check_bit(&image, offset)?;
        Ok((image[offset as usize] >> bit) & 1 == 1)
    }

    fn counter_reset(&self, position: u16, mask: u16) -> Result<(), ChannelError> {
        drop(self.guard()?);
        debug!(position, mask, "counter reset ignored in simulation");
        Ok(())
    }

    fn relay_cycles(&self, position: u16) -> Result<Vec<u32>, ChannelError> {
        drop(self.guard()?);
        debug!(position, "relay cycle query answered with zeros in simulation");
        Ok(vec![0; RELAY_CHANNELS])
    }

    fn read_block(&self, buf: &mut [u8], offset: usize) -> Result<(), ChannelError> {
        let image = self.guard()?;
        let end = offset + buf.len();
        if end > image.len() {
            return Err(ChannelError::OutOfRange {
                offset,
                len: buf.len(),
                image: image.len(),
            });
        }
        buf.copy_from_slice(&image[offset..end]);
        Ok(())
    }

    fn write_block(&self, buf: &[u8], offset: usize) -> Result<(), ChannelError> {
        let mut image = self.guard()?;
        let end = offset + buf.len();
        if end > image.len() {
            return Err(ChannelError::OutOfRange {
                offset,
                len: buf.len(),
                image: image.len(),
            });
        }
        image[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn close(&self) -> Result<(), ChannelError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
