//! Hardware topology configuration.
//!
//! Deserialized from a piCtory-style JSON document (`config.rsc`) at
//! startup. The document lists the physical modules on the controller
//! bus, each with its byte window into the process image and its
//! per-signal sub-offsets and bit positions.
//!
//! This module also carries the replace-I/O remap table (TOML), which
//! reinterprets configured byte ranges as differently-typed signals at
//! runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_CONFIG_PATHS;
use crate::error::CoreError;

// ─── Byte Order ─────────────────────────────────────────────────────

/// Byte order of multi-byte signal values in the process image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first (the `piControl` native order).
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

// ─── Topology Document ──────────────────────────────────────────────

/// One input or output entry of a device.
///
/// `offset` is relative to the owning device's byte window. Plain entries
/// become integer signals (or raw byte ranges when wider than 4 bytes);
/// the optional fields select the bit, counter and relay specializations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Signal name, globally unique across the topology.
    pub name: String,
    /// Byte offset relative to the device window.
    pub offset: usize,
    /// Byte span of the signal.
    pub length: usize,
    /// Bit index in `0..=7` for boolean signals.
    #[serde(default)]
    pub bit: Option<u8>,
    /// Signed integer interpretation. Default unsigned.
    #[serde(default)]
    pub signed: Option<bool>,
    /// Byte order override. Default little-endian.
    #[serde(default, rename = "byteOrder")]
    pub byte_order: Option<ByteOrder>,
    /// Hardware counter index on the owning module. Marks the entry as a
    /// counter signal with a reset operation.
    #[serde(default)]
    pub counter: Option<u8>,
    /// Marks an output entry as a relay channel with a lifetime
    /// switching-cycle query.
    #[serde(default)]
    pub relay: Option<bool>,
}

/// One physical module on the controller bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Module name, unique in the topology.
    pub name: String,
    /// Topology-assigned slot of the module.
    pub position: u16,
    /// Absolute byte offset of the module window in the process image.
    pub offset: usize,
    /// Byte span of the module window.
    pub length: usize,
    /// Module product identifier, informational.
    #[serde(default, rename = "productType")]
    pub product_type: Option<String>,
    /// Input signal entries.
    #[serde(default)]
    pub inputs: Vec<SignalSpec>,
    /// Output signal entries.
    #[serde(default)]
    pub outputs: Vec<SignalSpec>,
}

/// The parsed topology document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Configured devices, in document order.
    #[serde(rename = "Devices", alias = "devices")]
    pub devices: Vec<DeviceConfig>,
}

impl Topology {
    /// Parse a topology document from a JSON string.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the document does not parse.
    pub fn from_json(content: &str) -> Result<Self, CoreError> {
        serde_json::from_str(content).map_err(|e| {
            CoreError::Config(format!("could not parse piCtory configuration: {e}"))
        })
    }

    /// Load a topology document from a file.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Probe the default piCtory configuration locations.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if none of the default paths exist.
    pub fn find_default() -> Result<PathBuf, CoreError> {
        for p in DEFAULT_CONFIG_PATHS {
            let path = Path::new(p);
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }
        Err(CoreError::Config(
            "could not find piCtory configuration file".to_string(),
        ))
    }

    /// Required process image length: `max(offset + length)` over devices.
    pub fn image_len(&self) -> usize {
        self.devices
            .iter()
            .map(|d| d.offset + d.length)
            .max()
            .unwrap_or(0)
    }
}

// ─── Device Filter ──────────────────────────────────────────────────

/// Restricts which devices a context builds.
///
/// A device matches when its name appears in `names` or its position in
/// `positions`. An empty filter matches everything; a filter whose
/// selectors match nothing yields zero devices, which is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// Device names to select.
    #[serde(default)]
    pub names: Option<Vec<String>>,
    /// Device positions to select.
    #[serde(default)]
    pub positions: Option<Vec<u16>>,
}

impl DeviceFilter {
    /// Select a single device by name.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            names: Some(vec![name.into()]),
            positions: None,
        }
    }

    /// Select a single device by position.
    pub fn by_position(position: u16) -> Self {
        Self {
            names: None,
            positions: Some(vec![position]),
        }
    }

    /// Whether `device` passes the filter.
    pub fn matches(&self, device: &DeviceConfig) -> bool {
        if self.names.is_none() && self.positions.is_none() {
            return true;
        }
        let name_hit = self
            .names
            .as_ref()
            .is_some_and(|n| n.iter().any(|c| c == &device.name));
        let position_hit = self
            .positions
            .as_ref()
            .is_some_and(|p| p.contains(&device.position));
        name_hit || position_hit
    }
}

// ─── Replace-I/O Table ──────────────────────────────────────────────

/// One replace-I/O record: rebind the byte range of `source` as a new
/// packed signal named `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemapRecord {
    /// Name of the signal to create.
    pub target: String,
    /// Name of the existing signal whose byte range is reused.
    pub source: String,
    /// Packed format token (`b B h H i I q f d`).
    pub format: String,
    /// Byte order of the packed value. Default little-endian.
    #[serde(default, rename = "byteOrder", alias = "byte_order")]
    pub byte_order: ByteOrder,
}

/// Ordered replace-I/O table, applied record by record. Later records may
/// reference signals created by earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemapTable {
    /// The records, in application order.
    #[serde(default, rename = "replace")]
    pub records: Vec<RemapRecord>,
}

impl RemapTable {
    /// Parse a remap table from a TOML string.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the table does not parse.
    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content)
            .map_err(|e| CoreError::Config(format!("could not parse remap table: {e}")))
    }

    /// Load a remap table from a file.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }
}
