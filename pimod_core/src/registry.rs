//! Signal registry — name-keyed signal collection and replace-I/O.
//!
//! Inserting a name that already exists overwrites the previous entry
//! and logs a warning rather than failing: replace-I/O relies on exactly
//! this to rebind a configured byte range under a new name and format.

use std::collections::HashMap;
use std::sync::Arc;

use pimod_common::config::{ByteOrder, RemapTable};
use pimod_common::error::CoreError;
use tracing::{info, warn};

use crate::signal::{PackedFormat, Signal, SignalKind, SignalParts};

/// Name-keyed collection of signals.
#[derive(Default)]
pub struct SignalRegistry {
    signals: HashMap<String, Arc<Signal>>,
}

impl SignalRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a signal under its name.
    ///
    /// An existing entry with the same name is overwritten; this is
    /// surfaced as a warning, not an error.
    pub fn insert(&mut self, signal: Arc<Signal>) {
        let name = signal.name().to_string();
        if self.signals.insert(name.clone(), signal).is_some() {
            warn!(name, "duplicate I/O name, previous signal overwritten");
        }
    }

    /// Look up a signal by name.
    pub fn get(&self, name: &str) -> Option<Arc<Signal>> {
        self.signals.get(name).cloned()
    }

    /// Whether a signal with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Iterate over registered signal names (no particular order).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.keys().map(String::as_str)
    }

    /// Rebind the byte range of `old_name` as a new packed signal.
    ///
    /// The new signal reuses the old signal's offset, bit, direction and
    /// owning device, reinterprets the bytes per `format`, is inserted
    /// under `new_name`, and the `old_name` entry is removed.
    ///
    /// # Errors
    /// `CoreError::NotFound` when `old_name` is absent,
    /// `CoreError::Construction` for an unknown format token or a packed
    /// span that does not fit the process image.
    pub fn replace(
        &mut self,
        old_name: &str,
        new_name: &str,
        format: &str,
        byte_order: ByteOrder,
    ) -> Result<Arc<Signal>, CoreError> {
        let old = self
            .signals
            .get(old_name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(old_name.to_string()))?;

        let packed = PackedFormat::parse(format).ok_or_else(|| CoreError::Construction {
            name: new_name.to_string(),
            reason: format!("unknown format token '{format}'"),
        })?;

        let signal = Signal::new(
            SignalParts {
                name: new_name.to_string(),
                offset: old.offset(),
                length: packed.size(),
                bit: old.bit(),
                direction: old.direction(),
                kind: SignalKind::Packed { format: packed },
                byte_order,
                device_position: old.device_position(),
            },
            Arc::clone(old.image()),
            Arc::clone(old.channel()),
        )?;

        self.signals.remove(old_name);
        self.insert(Arc::clone(&signal));
        info!(
            source = old_name,
            target = new_name,
            format,
            "replaced I/O signal"
        );
        Ok(signal)
    }

    /// Apply a remap table, record by record in table order. Later
    /// records may reference signals created by earlier ones.
    ///
    /// # Errors
    /// Fails on the first record that cannot be applied.
    pub fn apply_remap(&mut self, table: &RemapTable) -> Result<(), CoreError> {
        for record in &table.records {
            self.replace(&record.source, &record.target, &record.format, record.byte_order)?;
        }
        if !table.records.is_empty() {
            info!(records = table.records.len(), "applied replace-I/O table");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRegistry")
            .field("len", &self.signals.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::sim::SimChannel;
    use crate::signal::{Direction, Value};
    use pimod_common::channel::HardwareChannel;
    use std::sync::Mutex;

    fn harness(len: usize) -> (std::sync::Arc<Mutex<Vec<u8>>>, Arc<dyn HardwareChannel>) {
        let image = Arc::new(Mutex::new(vec![0u8; len]));
        let channel: Arc<dyn HardwareChannel> = Arc::new(SimChannel::new(Arc::clone(&image)));
        (image, channel)
    }

    fn make_bit(
        name: &str,
        offset: usize,
        bit: u8,
        image: &std::sync::Arc<Mutex<Vec<u8>>>,
        channel: &Arc<dyn HardwareChannel>,
    ) -> Arc<Signal> {
        Signal::new(
            SignalParts {
                name: name.to_string(),
                offset,
                length: 1,
                bit: Some(bit),
                direction: Direction::Output,
                kind: SignalKind::Bit,
                byte_order: ByteOrder::Little,
                device_position: 32,
            },
            Arc::clone(image),
            Arc::clone(channel),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let (image, channel) = harness(16);
        let mut registry = SignalRegistry::new();

        registry.insert(make_bit("Output1", 0, 0, &image, &channel));
        registry.insert(make_bit("Output1", 4, 3, &image, &channel));

        assert_eq!(registry.len(), 1);
        let sig = registry.get("Output1").unwrap();
        assert_eq!(sig.offset(), 4);
        assert_eq!(sig.bit(), Some(3));
    }

    #[test]
    fn replace_rebinds_as_packed_float() {
        let (image, channel) = harness(16);
        let mut registry = SignalRegistry::new();
        registry.insert(make_bit("Output1", 5, 0, &image, &channel));

        registry
            .replace("Output1", "MyFloat", "f", ByteOrder::Big)
            .unwrap();

        assert!(!registry.contains("Output1"));
        let float = registry.get("MyFloat").unwrap();
        assert_eq!(float.offset(), 5);
        assert_eq!(float.length(), 4);

        float.write(3.5f64).unwrap();
        assert_eq!(float.read().unwrap(), Value::Float(3.5));

        // Big-endian layout of 3.5f32 at offset 5.
        let image = image.lock().unwrap();
        assert_eq!(&image[5..9], &3.5f32.to_be_bytes());
    }

    #[test]
    fn replace_missing_source() {
        let mut registry = SignalRegistry::new();
        let err = registry
            .replace("NoSuch", "Target", "f", ByteOrder::Little)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn replace_unknown_format() {
        let (image, channel) = harness(16);
        let mut registry = SignalRegistry::new();
        registry.insert(make_bit("Output1", 0, 0, &image, &channel));

        let err = registry
            .replace("Output1", "Target", "z", ByteOrder::Little)
            .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));
        // Failed replace leaves the source untouched.
        assert!(registry.contains("Output1"));
    }

    #[test]
    fn replace_outside_image() {
        let (image, channel) = harness(8);
        let mut registry = SignalRegistry::new();
        registry.insert(make_bit("Output1", 6, 0, &image, &channel));

        // 8-byte double at offset 6 does not fit an 8-byte image.
        let err = registry
            .replace("Output1", "Target", "d", ByteOrder::Little)
            .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));
        assert!(registry.contains("Output1"));
    }

    #[test]
    fn remap_table_applies_in_order() {
        let (image, channel) = harness(16);
        let mut registry = SignalRegistry::new();
        registry.insert(make_bit("Output1", 0, 0, &image, &channel));

        // Second record sources the signal created by the first.
        let table = RemapTable::from_toml(
            r#"
[[replace]]
target = "Stage1"
source = "Output1"
format = "H"

[[replace]]
target = "Stage2"
source = "Stage1"
format = "f"
byteOrder = "big"
"#,
        )
        .unwrap();

        registry.apply_remap(&table).unwrap();
        assert!(!registry.contains("Output1"));
        assert!(!registry.contains("Stage1"));
        let sig = registry.get("Stage2").unwrap();
        assert_eq!(sig.length(), 4);
        assert_eq!(sig.byte_order(), ByteOrder::Big);
    }
}
