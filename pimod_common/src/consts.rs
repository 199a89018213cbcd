//! `piControl` driver constants.
//!
//! Request codes mirror the kernel driver header (`piControl.h`). The bit
//! access codes are the plain decimal values the driver has always used;
//! they are not `_IO`-encoded.

/// Default character device exposed by the `piControl` kernel module.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/piControl0";

/// Default locations of the piCtory topology document, probed in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["/etc/revpi/config.rsc", "/opt/KUNBUS/config.rsc"];

/// ioctl: set a single output bit in the process image.
pub const PICONTROL_BIT_SET: u64 = 19216;

/// ioctl: reset a single output bit in the process image.
pub const PICONTROL_BIT_RESET: u64 = 19217;

/// ioctl: read a single bit from the process image.
pub const PICONTROL_BIT_READ: u64 = 19218;

/// ioctl: reset hardware counters on a DIO module, selected by bitmask.
pub const PICONTROL_COUNTER_RESET: u64 = 19220;

/// ioctl: query lifetime relay switching cycles of an RO module.
pub const PICONTROL_RELAY_COUNTERS: u64 = 19221;

/// Size of the simulated process image when no topology demands more.
pub const SIM_IMAGE_LEN: usize = 4096;

/// Number of relay channels on a relay output module.
pub const RELAY_CHANNELS: usize = 4;
