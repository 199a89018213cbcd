//! Devices — physical modules and their signals.
//!
//! A `Device` is computed once from one topology entry: its byte window
//! in the process image plus one signal per input/output entry. Signal
//! offsets in the topology are relative to the device window; the
//! absolute image offset is resolved here.

use std::sync::{Arc, Mutex};

use pimod_common::channel::HardwareChannel;
use pimod_common::config::{DeviceConfig, SignalSpec};
use pimod_common::error::CoreError;
use tracing::debug;

use crate::registry::SignalRegistry;
use crate::signal::{Direction, Signal, SignalKind, SignalParts};

/// A named, positioned group of signals for one physical module.
/// Immutable after construction.
#[derive(Debug)]
pub struct Device {
    name: String,
    position: u16,
    offset: usize,
    length: usize,
    product_type: Option<String>,
    inputs: Vec<Arc<Signal>>,
    outputs: Vec<Arc<Signal>>,
}

impl Device {
    /// Build a device and its signals, registering every signal.
    pub(crate) fn build(
        config: &DeviceConfig,
        image: &Arc<Mutex<Vec<u8>>>,
        channel: &Arc<dyn HardwareChannel>,
        registry: &mut SignalRegistry,
    ) -> Result<Self, CoreError> {
        let mut build_signals = |specs: &[SignalSpec],
                                 direction: Direction|
         -> Result<Vec<Arc<Signal>>, CoreError> {
            let mut signals = Vec::with_capacity(specs.len());
            for spec in specs {
                let signal = Signal::new(
                    SignalParts {
                        name: spec.name.clone(),
                        offset: config.offset + spec.offset,
                        length: spec.length,
                        bit: spec.bit,
                        direction,
                        kind: kind_of(spec),
                        byte_order: spec.byte_order.unwrap_or_default(),
                        device_position: config.position,
                    },
                    Arc::clone(image),
                    Arc::clone(channel),
                )?;
                registry.insert(Arc::clone(&signal));
                signals.push(signal);
            }
            Ok(signals)
        };

        let inputs = build_signals(&config.inputs, Direction::Input)?;
        let outputs = build_signals(&config.outputs, Direction::Output)?;

        debug!(
            device = config.name,
            position = config.position,
            inputs = inputs.len(),
            outputs = outputs.len(),
            "built device"
        );

        Ok(Self {
            name: config.name.clone(),
            position: config.position,
            offset: config.offset,
            length: config.length,
            product_type: config.product_type.clone(),
            inputs,
            outputs,
        })
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topology-assigned slot.
    pub fn position(&self) -> u16 {
        self.position
    }

    /// Absolute byte offset of the device window.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte span of the device window.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Module product identifier, when the topology carries one.
    pub fn product_type(&self) -> Option<&str> {
        self.product_type.as_deref()
    }

    /// Input signals, in topology order.
    pub fn inputs(&self) -> &[Arc<Signal>] {
        &self.inputs
    }

    /// Output signals, in topology order.
    pub fn outputs(&self) -> &[Arc<Signal>] {
        &self.outputs
    }
}

/// Derive the signal specialization from a topology entry.
///
/// Explicit `counter` and `relay` fields win over the bit/width
/// heuristics; plain entries wider than 4 bytes stay raw.
fn kind_of(spec: &SignalSpec) -> SignalKind {
    if let Some(index) = spec.counter {
        return SignalKind::Counter { index };
    }
    if spec.relay.unwrap_or(false) {
        return SignalKind::Relay;
    }
    if spec.bit.is_some() {
        return SignalKind::Bit;
    }
    if spec.length <= 4 {
        SignalKind::Int {
            signed: spec.signed.unwrap_or(false),
        }
    } else {
        SignalKind::Raw
    }
}
