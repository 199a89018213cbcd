//! Hardware channel implementations.
//!
//! Two backends implement the `HardwareChannel` trait from
//! `pimod_common`:
//!
//! - [`sim`] - in-memory simulator, available everywhere
//! - [`picontrol`] - the real `piControl` driver, Linux only

pub mod sim;

#[cfg(target_os = "linux")]
pub mod picontrol;

use std::path::Path;
use std::sync::{Arc, Mutex};

use pimod_common::channel::{ChannelError, HardwareChannel};

pub use sim::SimChannel;

#[cfg(target_os = "linux")]
pub use picontrol::PiControlChannel;

/// Open a hardware channel.
///
/// Simulated channels share the given process image; real channels open
/// the driver device at `device_path`.
///
/// # Errors
/// Returns `ChannelError::Io` when the device cannot be opened, or
/// `ChannelError::Unsupported` for real channels off Linux.
pub fn open(
    simulate: bool,
    image: &Arc<Mutex<Vec<u8>>>,
    device_path: &Path,
) -> Result<Arc<dyn HardwareChannel>, ChannelError> {
    if simulate {
        return Ok(Arc::new(SimChannel::new(Arc::clone(image))));
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(PiControlChannel::open(device_path)?))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = device_path;
        Err(ChannelError::Unsupported(
            "piControl channel requires Linux",
        ))
    }
}
