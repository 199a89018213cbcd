//! Real `piControl` hardware channel.
//!
//! Talks to the kernel driver through `/dev/piControl0`: single-bit
//! access via ioctl (atomic with respect to other bits in the same
//! byte), counter and relay queries via their dedicated ioctls, and
//! bulk process image transfers via positioned reads/writes.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pimod_common::channel::{ChannelError, HardwareChannel};
use pimod_common::consts::{
    PICONTROL_BIT_READ, PICONTROL_BIT_RESET, PICONTROL_BIT_SET, PICONTROL_COUNTER_RESET,
    PICONTROL_RELAY_COUNTERS, RELAY_CHANNELS,
};
use tracing::{debug, info};

/// Argument of the single-bit ioctls: little-endian byte address,
/// bit index, value byte.
#[repr(C)]
struct SpiValue {
    address: u16,
    bit: u8,
    value: u8,
}

/// Argument of the DIO counter-reset ioctl.
#[repr(C, packed)]
struct DioCounterReset {
    address: u8,
    bitfield: u16,
}

/// Argument of the relay cycle-count ioctl.
#[repr(C, packed)]
struct RelayCounters {
    address: u8,
    counter: [u32; RELAY_CHANNELS],
}

mod ioctls {
    use super::{DioCounterReset, RelayCounters, SpiValue};
    use nix::{ioctl_readwrite_bad, ioctl_write_ptr_bad};

    ioctl_write_ptr_bad!(bit_set, super::PICONTROL_BIT_SET, SpiValue);
    ioctl_write_ptr_bad!(bit_reset, super::PICONTROL_BIT_RESET, SpiValue);
    ioctl_readwrite_bad!(bit_read, super::PICONTROL_BIT_READ, SpiValue);
    ioctl_write_ptr_bad!(counter_reset, super::PICONTROL_COUNTER_RESET, DioCounterReset);
    ioctl_readwrite_bad!(relay_counters, super::PICONTROL_RELAY_COUNTERS, RelayCounters);
}

/// Hardware channel backed by the `piControl` character device.
#[derive(Debug)]
pub struct PiControlChannel {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl PiControlChannel {
    /// Open the driver device.
    ///
    /// # Errors
    /// Returns `ChannelError::Io` when the device cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChannelError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        info!(path = %path.display(), "opened piControl device");
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Path of the underlying device.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_file<T>(
        &self,
        op: impl FnOnce(&File) -> Result<T, ChannelError>,
    ) -> Result<T, ChannelError> {
        let guard = self.file.lock().expect("piControl handle lock poisoned");
        let file = guard.as_ref().ok_or(ChannelError::NotOpen)?;
        op(file)
    }
}

fn ioctl_err(request: u64) -> impl FnOnce(nix::errno::Errno) -> ChannelError {
    move |e| ChannelError::Ioctl {
        request,
        errno: e as i32,
    }
}

impl HardwareChannel for PiControlChannel {
    fn bit_set(&self, offset: u16, bit: u8) -> Result<(), ChannelError> {
        self.with_file(|file| {
            let arg = SpiValue {
                address: offset,
                bit,
                value: 1,
            };
            unsafe { ioctls::bit_set(file.as_raw_fd(), &arg) }
                .map_err(ioctl_err(PICONTROL_BIT_SET))?;
            Ok(())
        })
    }

    fn bit_reset(&self, offset: u16, bit: u8) -> Result<(), ChannelError> {
        self.with_file(|file| {
            let arg = SpiValue {
                address: offset,
                bit,
                value: 0,
            };
            unsafe { ioctls::bit_reset(file.as_raw_fd(), &arg) }
                .map_err(ioctl_err(PICONTROL_BIT_RESET))?;
            Ok(())
        })
    }

    fn bit_read(&self, offset: u16, bit: u8) -> Result<bool, ChannelError> {
        self.with_file(|file| {
            let mut arg = SpiValue {
                address: offset,
                bit,
                value: 0,
            };
            unsafe { ioctls::bit_read(file.as_raw_fd(), &mut arg) }
                .map_err(ioctl_err(PICONTROL_BIT_READ))?;
            Ok(arg.value != 0)
        })
    }

    fn counter_reset(&self, position: u16, mask: u16) -> Result<(), ChannelError> {
        self.with_file(|file| {
            let arg = DioCounterReset {
                address: position as u8,
                bitfield: mask,
            };
            unsafe { ioctls::counter_reset(file.as_raw_fd(), &arg) }
                .map_err(ioctl_err(PICONTROL_COUNTER_RESET))?;
            debug!(position, mask, "reset hardware counters");
            Ok(())
        })
    }

    fn relay_cycles(&self, position: u16) -> Result<Vec<u32>, ChannelError> {
        self.with_file(|file| {
            let mut arg = RelayCounters {
                address: position as u8,
                counter: [0; RELAY_CHANNELS],
            };
            unsafe { ioctls::relay_counters(file.as_raw_fd(), &mut arg) }
                .map_err(ioctl_err(PICONTROL_RELAY_COUNTERS))?;
            Ok({ arg.counter }.to_vec())
        })
    }

    fn read_block(&self, buf: &mut [u8], offset: usize) -> Result<(), ChannelError> {
        self.with_file(|file| {
            file.read_exact_at(buf, offset as u64)?;
            Ok(())
        })
    }

    fn write_block(&self, buf: &[u8], offset: usize) -> Result<(), ChannelError> {
        self.with_file(|file| {
            file.write_all_at(buf, offset as u64)?;
            Ok(())
        })
    }

    fn close(&self) -> Result<(), ChannelError> {
        let mut guard = self.file.lock().expect("piControl handle lock poisoned");
        if guard.take().is_some() {
            info!(path = %self.path.display(), "closed piControl device");
        }
        Ok(())
    }
}
