//! Signal types — named, typed views over the process image.
//!
//! A `Signal` addresses a byte range (optionally a single bit) of the
//! shared process image and knows how to decode and encode its logical
//! value. The specializations form a closed set ([`SignalKind`]) so the
//! simulator can handle every variant exhaustively:
//!
//! - `Bit` - boolean at `(offset, bit)`, written through atomic
//!   bit-set/bit-reset channel calls
//! - `Int` - byte-order-aware signed/unsigned integer, 1-4 bytes
//! - `Counter` - hardware counter with a reset operation
//! - `Relay` - relay output with a lifetime switching-cycle query
//! - `Packed` - arbitrary packed numeric format (replace-I/O)
//! - `Raw` - untyped byte range
//!
//! Every write that changes the decoded value fires the registered
//! change listeners synchronously, before the write call returns.

pub mod value;

pub use value::{PackedFormat, Value};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use pimod_common::channel::HardwareChannel;
use pimod_common::config::ByteOrder;
use pimod_common::error::CoreError;

use self::value::{decode_int, encode_int};

/// Direction of a signal relative to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Physical input, refreshed from the driver.
    Input,
    /// Physical output, pushed to the driver.
    Output,
}

/// Closed set of signal specializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Untyped byte range, read and written as raw bytes.
    Raw,
    /// Single boolean bit.
    Bit,
    /// Fixed-width integer.
    Int {
        /// Two's-complement interpretation when set.
        signed: bool,
    },
    /// Hardware counter input (unsigned integer plus reset).
    Counter {
        /// Counter index on the owning module.
        index: u8,
    },
    /// Relay output channel (bit-addressed) or whole relay bank.
    Relay,
    /// Packed numeric format created by replace-I/O.
    Packed {
        /// The packed encoding.
        format: PackedFormat,
    },
}

/// Lifetime relay switching-cycle counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCycles {
    /// Count for one relay channel.
    Channel(u32),
    /// Ordered per-channel counts for a whole relay bank.
    Device(Vec<u32>),
}

/// Handle for removing a registered change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

type ChangeListener = Box<dyn Fn(&str, &Value) + Send>;

/// Construction parameters for a [`Signal`].
pub(crate) struct SignalParts {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub bit: Option<u8>,
    pub direction: Direction,
    pub kind: SignalKind,
    pub byte_order: ByteOrder,
    pub device_position: u16,
}

/// A named, typed view over a byte/bit range of the process image.
///
/// Signals do not own the image; they hold a back-reference to the
/// context's buffer and address it by offset. All reads and writes go
/// through the context's single image lock or through the hardware
/// channel's bit calls, never through a raw buffer handle.
pub struct Signal {
    name: String,
    offset: usize,
    length: usize,
    bit: Option<u8>,
    direction: Direction,
    kind: SignalKind,
    byte_order: ByteOrder,
    device_position: u16,
    image: Arc<Mutex<Vec<u8>>>,
    channel: Arc<dyn HardwareChannel>,
    listeners: Mutex<Vec<(usize, ChangeListener)>>,
    next_listener: AtomicUsize,
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("bit", &self.bit)
            .field("direction", &self.direction)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Signal {
    /// Build a signal after validating its byte/bit geometry.
    pub(crate) fn new(
        parts: SignalParts,
        image: Arc<Mutex<Vec<u8>>>,
        channel: Arc<dyn HardwareChannel>,
    ) -> Result<Arc<Self>, CoreError> {
        let construction = |reason: String| CoreError::Construction {
            name: parts.name.clone(),
            reason,
        };

        if parts.length == 0 {
            return Err(construction("zero byte length".to_string()));
        }
        match parts.kind {
            SignalKind::Bit => {
                match parts.bit {
                    Some(b) if b <= 7 => {}
                    Some(b) => return Err(construction(format!("bit index {b} outside 0..=7"))),
                    None => return Err(construction("bit signal without bit index".to_string())),
                }
                if parts.length != 1 {
                    return Err(construction(format!(
                        "bit signal spans {} bytes instead of 1",
                        parts.length
                    )));
                }
            }
            SignalKind::Relay => match parts.bit {
                Some(b) if b > 7 => {
                    return Err(construction(format!("bit index {b} outside 0..=7")));
                }
                Some(_) => {
                    if parts.length != 1 {
                        return Err(construction(format!(
                            "relay channel spans {} bytes instead of 1",
                            parts.length
                        )));
                    }
                }
                None => {
                    if parts.length > 4 {
                        return Err(construction(format!(
                            "relay bank width {} outside 1..=4 bytes",
                            parts.length
                        )));
                    }
                }
            },
            SignalKind::Int { .. } | SignalKind::Counter { .. } => {
                if parts.length > 4 {
                    return Err(construction(format!(
                        "integer width {} outside 1..=4 bytes",
                        parts.length
                    )));
                }
            }
            SignalKind::Packed { format } => {
                if parts.length != format.size() {
                    return Err(construction(format!(
                        "length {} does not match packed size {}",
                        parts.length,
                        format.size()
                    )));
                }
            }
            SignalKind::Raw => {}
        }

        // Bit operations address the image with a u16 byte offset.
        let bit_addressed = matches!(parts.kind, SignalKind::Bit)
            || (matches!(parts.kind, SignalKind::Relay) && parts.bit.is_some());
        if bit_addressed && parts.offset > u16::MAX as usize {
            return Err(construction(format!(
                "offset {} outside the bit-addressable range 0..=65535",
                parts.offset
            )));
        }

        let image_len = image.lock().expect("process image lock poisoned").len();
        if parts.offset + parts.length > image_len {
            return Err(construction(format!(
                "byte range {}..{} outside process image of {} bytes",
                parts.offset,
                parts.offset + parts.length,
                image_len
            )));
        }

        Ok(Arc::new(Self {
            name: parts.name,
            offset: parts.offset,
            length: parts.length,
            bit: parts.bit,
            direction: parts.direction,
            kind: parts.kind,
            byte_order: parts.byte_order,
            device_position: parts.device_position,
            image,
            channel,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicUsize::new(0),
        }))
    }

    /// Signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute byte offset in the process image.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte span of the signal.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Bit index for bit-addressed signals.
    pub fn bit(&self) -> Option<u8> {
        self.bit
    }

    /// Direction of the signal.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Specialization of the signal.
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Byte order of multi-byte values.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub(crate) fn device_position(&self) -> u16 {
        self.device_position
    }

    pub(crate) fn image(&self) -> &Arc<Mutex<Vec<u8>>> {
        &self.image
    }

    pub(crate) fn channel(&self) -> &Arc<dyn HardwareChannel> {
        &self.channel
    }

    /// Bit index, present only when the signal is bit-addressed.
    fn bit_index(&self) -> Option<u8> {
        match self.kind {
            SignalKind::Bit => self.bit,
            SignalKind::Relay => self.bit,
            _ => None,
        }
    }

    fn image_guard(&self) -> MutexGuard<'_, Vec<u8>> {
        self.image.lock().expect("process image lock poisoned")
    }

    /// Read the signal's logical value.
    ///
    /// Bit-addressed signals read through the channel's single-bit call;
    /// everything else copies the signal's bytes from the image and
    /// decodes them per the signal's rule.
    ///
    /// # Errors
    /// Returns `CoreError::Channel` when the hardware channel fails.
    pub fn read(&self) -> Result<Value, CoreError> {
        if let Some(bit) = self.bit_index() {
            let v = self.channel.bit_read(self.offset as u16, bit)?;
            return Ok(Value::Bool(v));
        }
        let bytes = {
            let image = self.image_guard();
            image[self.offset..self.offset + self.length].to_vec()
        };
        Ok(self.decode(&bytes))
    }

    /// Write a logical value to the signal.
    ///
    /// The current value is decoded first to detect a transition; change
    /// listeners fire synchronously, before this call returns, and only
    /// when the decoded value actually changed. Bit writes are issued as
    /// atomic bit-set/bit-reset channel calls, never as read-modify-write
    /// of the containing byte.
    ///
    /// # Errors
    /// `CoreError::InvalidValue` when the value cannot be represented in
    /// the signal's width or type, `CoreError::LengthMismatch` for raw
    /// byte writes of the wrong length, `CoreError::Channel` on hardware
    /// failures.
    pub fn write(&self, value: impl Into<Value>) -> Result<(), CoreError> {
        let value = value.into();
        let old = self.read()?;

        if let Some(bit) = self.bit_index() {
            let Value::Bool(v) = value else {
                return Err(CoreError::InvalidValue {
                    name: self.name.clone(),
                    reason: "bit signal expects a boolean".to_string(),
                });
            };
            if v {
                self.channel.bit_set(self.offset as u16, bit)?;
            } else {
                self.channel.bit_reset(self.offset as u16, bit)?;
            }
        } else {
            let bytes = self.encode(&value)?;
            let mut image = self.image_guard();
            image[self.offset..self.offset + self.length].copy_from_slice(&bytes);
        }

        let new = self.read()?;
        if new != old {
            self.notify(&new);
        }
        Ok(())
    }

    /// Register a change listener, invoked with `(name, new_value)` once
    /// per write that changes the decoded value.
    pub fn on_change(&self, listener: impl Fn(&str, &Value) + Send + 'static) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listener list lock poisoned")
            .push((id, Box::new(listener)));
        ListenerId(id)
    }

    /// Remove a previously registered listener. Returns whether it was
    /// still registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("listener list lock poisoned");
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id.0);
        listeners.len() != before
    }

    fn notify(&self, new: &Value) {
        let listeners = self.listeners.lock().expect("listener list lock poisoned");
        for (_, listener) in listeners.iter() {
            listener(&self.name, new);
        }
    }

    /// Reset the hardware counter behind this signal.
    ///
    /// Issues a counter-reset call scoped to the owning device's position
    /// and this signal's counter index. The simulated channel logs and
    /// ignores the call.
    ///
    /// # Errors
    /// `CoreError::InvalidValue` when the signal is not a counter.
    pub fn reset(&self) -> Result<(), CoreError> {
        let SignalKind::Counter { index } = self.kind else {
            return Err(CoreError::InvalidValue {
                name: self.name.clone(),
                reason: "signal is not a counter".to_string(),
            });
        };
        self.channel
            .counter_reset(self.device_position, 1u16 << index)?;
        Ok(())
    }

    /// Query the lifetime switching-cycle count of this relay signal.
    ///
    /// A channel-addressed relay yields its own count; a whole-bank relay
    /// signal yields the ordered per-channel counts. The simulated
    /// channel reports zeros.
    ///
    /// # Errors
    /// `CoreError::InvalidValue` when the signal is not a relay.
    pub fn cycles_used(&self) -> Result<RelayCycles, CoreError> {
        if !matches!(self.kind, SignalKind::Relay) {
            return Err(CoreError::InvalidValue {
                name: self.name.clone(),
                reason: "signal is not a relay".to_string(),
            });
        }
        let counts = self.channel.relay_cycles(self.device_position)?;
        match self.bit {
            Some(ch) => Ok(RelayCycles::Channel(
                counts.get(ch as usize).copied().unwrap_or(0),
            )),
            None => Ok(RelayCycles::Device(counts)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Value {
        match self.kind {
            SignalKind::Raw => Value::Bytes(bytes.to_vec()),
            SignalKind::Bit => {
                let bit = self.bit.unwrap_or(0);
                Value::Bool((bytes[0] >> bit) & 1 == 1)
            }
            SignalKind::Int { signed } => Value::Int(decode_int(bytes, self.byte_order, signed)),
            SignalKind::Counter { .. } | SignalKind::Relay => {
                Value::Int(decode_int(bytes, self.byte_order, false))
            }
            SignalKind::Packed { format } => format.decode(bytes, self.byte_order),
        }
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CoreError> {
        match self.kind {
            SignalKind::Raw => {
                let Value::Bytes(bytes) = value else {
                    return Err(CoreError::InvalidValue {
                        name: self.name.clone(),
                        reason: "raw signal expects bytes".to_string(),
                    });
                };
                if bytes.len() != self.length {
                    return Err(CoreError::LengthMismatch {
                        name: self.name.clone(),
                        expected: self.length,
                        got: bytes.len(),
                    });
                }
                Ok(bytes.clone())
            }
            SignalKind::Int { signed } => self.encode_as_int(value, signed),
            SignalKind::Counter { .. } | SignalKind::Relay => self.encode_as_int(value, false),
            SignalKind::Packed { format } => {
                format
                    .encode(value, self.byte_order)
                    .map_err(|reason| CoreError::InvalidValue {
                        name: self.name.clone(),
                        reason,
                    })
            }
            SignalKind::Bit => Err(CoreError::InvalidValue {
                name: self.name.clone(),
                reason: "bit signal expects a boolean".to_string(),
            }),
        }
    }

    fn encode_as_int(&self, value: &Value, signed: bool) -> Result<Vec<u8>, CoreError> {
        let Value::Int(v) = value else {
            return Err(CoreError::InvalidValue {
                name: self.name.clone(),
                reason: "integer signal expects an integer".to_string(),
            });
        };
        encode_int(*v, self.length, self.byte_order, signed).ok_or_else(|| {
            CoreError::InvalidValue {
                name: self.name.clone(),
                reason: format!(
                    "{v} outside {}-byte {} range",
                    self.length,
                    if signed { "signed" } else { "unsigned" }
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::sim::SimChannel;
    use std::sync::atomic::AtomicUsize;

    fn harness(len: usize) -> (Arc<Mutex<Vec<u8>>>, Arc<dyn HardwareChannel>) {
        let image = Arc::new(Mutex::new(vec![0u8; len]));
        let channel: Arc<dyn HardwareChannel> = Arc::new(SimChannel::new(Arc::clone(&image)));
        (image, channel)
    }

    fn bit_signal(
        name: &str,
        offset: usize,
        bit: u8,
        image: &Arc<Mutex<Vec<u8>>>,
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

    fn int_signal(
        name: &str,
        offset: usize,
        length: usize,
        signed: bool,
        order: ByteOrder,
        image: &Arc<Mutex<Vec<u8>>>,
        channel: &Arc<dyn HardwareChannel>,
    ) -> Arc<Signal> {
        Signal::new(
            SignalParts {
                name: name.to_string(),
                offset,
                length,
                bit: None,
                direction: Direction::Input,
                kind: SignalKind::Int { signed },
                byte_order: order,
                device_position: 32,
            },
            Arc::clone(image),
            Arc::clone(channel),
        )
        .unwrap()
    }

    #[test]
    fn bit_roundtrip() {
        let (image, channel) = harness(16);
        let sig = bit_signal("Output1", 5, 0, &image, &channel);

        sig.write(true).unwrap();
        assert_eq!(sig.read().unwrap(), Value::Bool(true));
        sig.write(false).unwrap();
        assert_eq!(sig.read().unwrap(), Value::Bool(false));
    }

    #[test]
    fn bits_in_shared_byte_do_not_corrupt_each_other() {
        let (image, channel) = harness(16);
        let b0 = bit_signal("B0", 3, 0, &image, &channel);
        let b1 = bit_signal("B1", 3, 1, &image, &channel);

        b0.write(true).unwrap();
        b1.write(true).unwrap();
        assert_eq!(b0.read().unwrap(), Value::Bool(true));
        assert_eq!(b1.read().unwrap(), Value::Bool(true));

        b0.write(false).unwrap();
        assert_eq!(b0.read().unwrap(), Value::Bool(false));
        assert_eq!(b1.read().unwrap(), Value::Bool(true));
    }

    #[test]
    fn change_fires_once_per_transition() {
        let (image, channel) = harness(16);
        let sig = bit_signal("Output1", 0, 2, &image, &channel);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        sig.on_change(move |name, value| {
            assert_eq!(name, "Output1");
            assert_eq!(value, &Value::Bool(true));
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });

        sig.write(true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Re-asserting the same value must not fire again.
        sig.write(true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_removal() {
        let (image, channel) = harness(16);
        let sig = bit_signal("Output1", 0, 0, &image, &channel);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        let id = sig.on_change(move |_, _| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sig.remove_listener(id));
        assert!(!sig.remove_listener(id));

        sig.write(true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn int_roundtrip_widths_and_orders() {
        let (image, channel) = harness(32);
        for (i, width) in [1usize, 2, 3, 4].iter().enumerate() {
            for signed in [false, true] {
                for order in [ByteOrder::Little, ByteOrder::Big] {
                    let sig = int_signal(
                        &format!("Int{i}"),
                        i * 4,
                        *width,
                        signed,
                        order,
                        &image,
                        &channel,
                    );
                    for v in [0i64, 1, 100] {
                        sig.write(v).unwrap();
                        assert_eq!(sig.read().unwrap(), Value::Int(v));
                    }
                    if signed {
                        sig.write(-5i64).unwrap();
                        assert_eq!(sig.read().unwrap(), Value::Int(-5));
                    }
                }
            }
        }
    }

    #[test]
    fn int_overflow_is_invalid_value() {
        let (image, channel) = harness(16);
        let sig = int_signal("Word1", 0, 2, false, ByteOrder::Little, &image, &channel);

        assert!(sig.write(65535i64).is_ok());
        let err = sig.write(65536i64).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
        let err = sig.write(-1i64).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
    }

    #[test]
    fn int_type_mismatch() {
        let (image, channel) = harness(16);
        let sig = int_signal("Word1", 0, 2, false, ByteOrder::Little, &image, &channel);
        let err = sig.write(true).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
    }

    #[test]
    fn int_change_notification() {
        let (image, channel) = harness(16);
        let sig = int_signal("Word1", 0, 2, false, ByteOrder::Little, &image, &channel);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        sig.on_change(move |_, value| {
            seen_cb.lock().unwrap().push(value.clone());
        });

        sig.write(7i64).unwrap();
        sig.write(7i64).unwrap();
        sig.write(9i64).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::Int(7), Value::Int(9)]
        );
    }

    #[test]
    fn raw_length_mismatch() {
        let (image, channel) = harness(16);
        let sig = Signal::new(
            SignalParts {
                name: "Blob".to_string(),
                offset: 0,
                length: 6,
                bit: None,
                direction: Direction::Output,
                kind: SignalKind::Raw,
                byte_order: ByteOrder::Little,
                device_position: 32,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap();

        sig.write(vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(sig.read().unwrap(), Value::Bytes(vec![1, 2, 3, 4, 5, 6]));

        let err = sig.write(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LengthMismatch {
                expected: 6,
                got: 3,
                ..
            }
        ));
    }

    #[test]
    fn packed_float_roundtrip() {
        let (image, channel) = harness(16);
        let sig = Signal::new(
            SignalParts {
                name: "MyFloat".to_string(),
                offset: 4,
                length: 4,
                bit: None,
                direction: Direction::Output,
                kind: SignalKind::Packed {
                    format: PackedFormat::F32,
                },
                byte_order: ByteOrder::Big,
                device_position: 32,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap();

        sig.write(3.5f64).unwrap();
        assert_eq!(sig.read().unwrap(), Value::Float(3.5));
    }

    #[test]
    fn construction_rejects_bad_geometry() {
        let (image, channel) = harness(16);

        // Zero length.
        let err = Signal::new(
            SignalParts {
                name: "Zero".to_string(),
                offset: 0,
                length: 0,
                bit: None,
                direction: Direction::Input,
                kind: SignalKind::Raw,
                byte_order: ByteOrder::Little,
                device_position: 0,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));

        // Bit index out of range.
        let err = Signal::new(
            SignalParts {
                name: "Bit8".to_string(),
                offset: 0,
                length: 1,
                bit: Some(8),
                direction: Direction::Input,
                kind: SignalKind::Bit,
                byte_order: ByteOrder::Little,
                device_position: 0,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));

        // Range outside the image.
        let err = Signal::new(
            SignalParts {
                name: "Out".to_string(),
                offset: 14,
                length: 4,
                bit: None,
                direction: Direction::Input,
                kind: SignalKind::Raw,
                byte_order: ByteOrder::Little,
                device_position: 0,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));
    }

    #[test]
    fn bit_signal_spans_exactly_one_byte() {
        let (image, channel) = harness(16);
        let err = Signal::new(
            SignalParts {
                name: "Wide".to_string(),
                offset: 0,
                length: 5,
                bit: Some(0),
                direction: Direction::Output,
                kind: SignalKind::Bit,
                byte_order: ByteOrder::Little,
                device_position: 32,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));
    }

    #[test]
    fn relay_widths_are_bounded() {
        let (image, channel) = harness(16);

        let relay = |name: &str, length: usize, bit: Option<u8>| {
            Signal::new(
                SignalParts {
                    name: name.to_string(),
                    offset: 0,
                    length,
                    bit,
                    direction: Direction::Output,
                    kind: SignalKind::Relay,
                    byte_order: ByteOrder::Little,
                    device_position: 33,
                },
                Arc::clone(&image),
                Arc::clone(&channel),
            )
        };

        // A 4-byte bank reads and writes as an unsigned integer.
        let bank = relay("Bank", 4, None).unwrap();
        bank.write(7i64).unwrap();
        assert_eq!(bank.read().unwrap(), Value::Int(7));

        // Wider banks cannot be encoded and are rejected up front.
        assert!(matches!(
            relay("WideBank", 10, None).unwrap_err(),
            CoreError::Construction { .. }
        ));

        // A channel-addressed relay spans exactly one byte.
        assert!(matches!(
            relay("WideChannel", 2, Some(0)).unwrap_err(),
            CoreError::Construction { .. }
        ));
    }

    #[test]
    fn bit_offsets_fit_the_channel_address() {
        let (image, channel) = harness(70_000);

        let err = Signal::new(
            SignalParts {
                name: "TooFar".to_string(),
                offset: 66_000,
                length: 1,
                bit: Some(0),
                direction: Direction::Output,
                kind: SignalKind::Bit,
                byte_order: ByteOrder::Little,
                device_position: 32,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Construction { .. }));

        // Byte-addressed signals are not limited to the u16 range.
        let raw = Signal::new(
            SignalParts {
                name: "FarBytes".to_string(),
                offset: 66_000,
                length: 2,
                bit: None,
                direction: Direction::Output,
                kind: SignalKind::Int { signed: false },
                byte_order: ByteOrder::Little,
                device_position: 32,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap();
        raw.write(300i64).unwrap();
        assert_eq!(raw.read().unwrap(), Value::Int(300));
    }

    #[test]
    fn counter_reset_in_simulation() {
        let (image, channel) = harness(16);
        let counter = Signal::new(
            SignalParts {
                name: "Counter1".to_string(),
                offset: 2,
                length: 4,
                bit: None,
                direction: Direction::Input,
                kind: SignalKind::Counter { index: 0 },
                byte_order: ByteOrder::Little,
                device_position: 32,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap();

        // Simulated channel ignores the reset.
        counter.reset().unwrap();

        // reset() on a non-counter is rejected.
        let plain = int_signal("Plain", 8, 2, false, ByteOrder::Little, &image, &channel);
        assert!(matches!(
            plain.reset().unwrap_err(),
            CoreError::InvalidValue { .. }
        ));
    }

    #[test]
    fn relay_cycles_in_simulation() {
        let (image, channel) = harness(16);
        let relay = Signal::new(
            SignalParts {
                name: "Relay1".to_string(),
                offset: 8,
                length: 1,
                bit: Some(1),
                direction: Direction::Output,
                kind: SignalKind::Relay,
                byte_order: ByteOrder::Little,
                device_position: 33,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap();

        assert_eq!(relay.cycles_used().unwrap(), RelayCycles::Channel(0));

        // Relay channels still behave as ordinary bit outputs.
        relay.write(true).unwrap();
        assert_eq!(relay.read().unwrap(), Value::Bool(true));

        let bank = Signal::new(
            SignalParts {
                name: "RelayBank".to_string(),
                offset: 9,
                length: 1,
                bit: None,
                direction: Direction::Output,
                kind: SignalKind::Relay,
                byte_order: ByteOrder::Little,
                device_position: 33,
            },
            Arc::clone(&image),
            Arc::clone(&channel),
        )
        .unwrap();
        assert_eq!(
            bank.cycles_used().unwrap(),
            RelayCycles::Device(vec![0, 0, 0, 0])
        );
    }
}
