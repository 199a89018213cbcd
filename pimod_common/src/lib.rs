//! pimod Common Library
//!
//! This crate provides the shared vocabulary for the pimod workspace:
//! the hardware topology configuration (piCtory-style `config.rsc`),
//! the `HardwareChannel` abstraction over the `piControl` kernel driver,
//! the error taxonomy, and driver constants.
//!
//! # Module Structure
//!
//! - [`config`] - Topology document, device filter, replace-I/O table
//! - [`channel`] - `HardwareChannel` trait and `ChannelError`
//! - [`error`] - `CoreError` taxonomy shared by all core operations
//! - [`consts`] - `piControl` device path and ioctl request codes

#![deny(missing_docs)]

pub mod channel;
pub mod config;
pub mod consts;
pub mod error;

pub use channel::{ChannelError, HardwareChannel};
pub use error::CoreError;
