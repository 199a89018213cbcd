//! Typed, named access to a memory-mapped process image.
//!
//! The crate builds an [`IoContext`] from a topology document describing
//! the devices attached to the I/O gateway. Every configured input and
//! output becomes a named [`Signal`] in the context's registry; reads
//! and writes go through the shared process image buffer, which is kept
//! in sync with the `piControl` driver either on demand or by a
//! periodic refresh loop.
//!
//! With simulation enabled the same API runs against an in-memory
//! image, so application logic can be developed and tested off-target.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use pimod_common::config::Topology;
//! use pimod_common::error::CoreError;
//! use pimod_core::{ContextOptions, IoContext};
//!
//! let topology = Topology::load(Path::new("/etc/revpi/config.rsc"))?;
//! let ctx = IoContext::new(&topology, ContextOptions::default())?;
//! ctx.sync_in()?;
//! let level = ctx
//!     .io()
//!     .get("TankLevel")
//!     .ok_or_else(|| CoreError::NotFound("TankLevel".to_string()))?
//!     .read()?;
//! # let _ = level;
//! # Ok::<(), CoreError>(())
//! ```

#![deny(missing_docs)]

pub mod channel;
pub mod context;
pub mod device;
pub mod registry;
pub mod signal;

pub use channel::sim::SimChannel;
pub use context::{ContextOptions, IoContext, RefreshStats};
pub use device::Device;
pub use registry::SignalRegistry;
pub use signal::{
    Direction, ListenerId, PackedFormat, RelayCycles, Signal, SignalKind, Value,
};
