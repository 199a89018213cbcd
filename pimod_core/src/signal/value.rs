//! Logical signal values and byte-level encoding.
//!
//! Multi-byte integers are packed byte-order-aware with range checks;
//! `PackedFormat` covers the replace-I/O format tokens (one packed
//! numeric value per signal, e.g. `"f"` for a 4-byte float).

use pimod_common::config::ByteOrder;

/// Logical value of a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean bit value.
    Bool(bool),
    /// Integer value (signed or unsigned widths up to 8 bytes).
    Int(i64),
    /// Floating point value of a packed-format signal.
    Float(f64),
    /// Raw bytes of an untyped byte range.
    Bytes(Vec<u8>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

// ─── Integer Packing ────────────────────────────────────────────────

/// Decode a byte-order-aware integer of `bytes.len()` bytes.
pub(crate) fn decode_int(bytes: &[u8], order: ByteOrder, signed: bool) -> i64 {
    let mut raw: u64 = 0;
    match order {
        ByteOrder::Little => {
            for (i, b) in bytes.iter().enumerate() {
                raw |= (*b as u64) << (8 * i);
            }
        }
        ByteOrder::Big => {
            for b in bytes {
                raw = (raw << 8) | *b as u64;
            }
        }
    }
    let bits = bytes.len() as u32 * 8;
    if signed && bits < 64 && (raw >> (bits - 1)) & 1 == 1 {
        raw |= !0u64 << bits;
    }
    raw as i64
}

/// Encode `value` into `width` bytes with the given order.
///
/// Returns `None` when the value is outside the representable range for
/// the width and signedness.
pub(crate) fn encode_int(
    value: i64,
    width: usize,
    order: ByteOrder,
    signed: bool,
) -> Option<Vec<u8>> {
    let bits = width as u32 * 8;
    let in_range = if bits >= 64 {
        signed || value >= 0
    } else if signed {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        value >= min && value <= max
    } else {
        let max = (1i64 << bits) - 1;
        value >= 0 && value <= max
    };
    if !in_range {
        return None;
    }
    let le = (value as u64).to_le_bytes();
    let mut out = le[..width].to_vec();
    if order == ByteOrder::Big {
        out.reverse();
    }
    Some(out)
}

// ─── Packed Formats ─────────────────────────────────────────────────

/// Packed numeric format of a replace-I/O signal.
///
/// Tokens follow the conventional single-character format codes:
/// `b`/`B` 1-byte signed/unsigned, `h`/`H` 2-byte, `i`/`I` 4-byte,
/// `q` 8-byte signed, `f` 4-byte float, `d` 8-byte float.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedFormat {
    /// 1-byte signed integer (`b`).
    I8,
    /// 1-byte unsigned integer (`B`).
    U8,
    /// 2-byte signed integer (`h`).
    I16,
    /// 2-byte unsigned integer (`H`).
    U16,
    /// 4-byte signed integer (`i`).
    I32,
    /// 4-byte unsigned integer (`I`).
    U32,
    /// 8-byte signed integer (`q`).
    I64,
    /// 4-byte IEEE 754 float (`f`).
    F32,
    /// 8-byte IEEE 754 float (`d`).
    F64,
}

impl PackedFormat {
    /// Parse a format token.
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "b" => Self::I8,
            "B" => Self::U8,
            "h" => Self::I16,
            "H" => Self::U16,
            "i" => Self::I32,
            "I" => Self::U32,
            "q" => Self::I64,
            "f" => Self::F32,
            "d" => Self::F64,
            _ => return None,
        })
    }

    /// Packed size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    fn int_params(&self) -> Option<bool> {
        match self {
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => Some(true),
            Self::U8 | Self::U16 | Self::U32 => Some(false),
            Self::F32 | Self::F64 => None,
        }
    }

    /// Decode `bytes` (exactly `self.size()` long) to a logical value.
    pub(crate) fn decode(&self, bytes: &[u8], order: ByteOrder) -> Value {
        match self {
            Self::F32 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(bytes);
                let v = match order {
                    ByteOrder::Little => f32::from_le_bytes(raw),
                    ByteOrder::Big => f32::from_be_bytes(raw),
                };
                Value::Float(v as f64)
            }
            Self::F64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let v = match order {
                    ByteOrder::Little => f64::from_le_bytes(raw),
                    ByteOrder::Big => f64::from_be_bytes(raw),
                };
                Value::Float(v)
            }
            _ => {
                let signed = self.int_params().unwrap_or(false);
                Value::Int(decode_int(bytes, order, signed))
            }
        }
    }

    /// Encode a logical value to `self.size()` bytes.
    ///
    /// Returns `Err(reason)` when the value's type or range does not fit
    /// the format.
    pub(crate) fn encode(&self, value: &Value, order: ByteOrder) -> Result<Vec<u8>, String> {
        match self {
            Self::F32 => {
                let v = float_of(value).ok_or("expects a numeric value")? as f32;
                Ok(match order {
                    ByteOrder::Little => v.to_le_bytes().to_vec(),
                    ByteOrder::Big => v.to_be_bytes().to_vec(),
                })
            }
            Self::F64 => {
                let v = float_of(value).ok_or("expects a numeric value")?;
                Ok(match order {
                    ByteOrder::Little => v.to_le_bytes().to_vec(),
                    ByteOrder::Big => v.to_be_bytes().to_vec(),
                })
            }
            _ => {
                let Value::Int(v) = value else {
                    return Err("expects an integer value".to_string());
                };
                let signed = self.int_params().unwrap_or(false);
                encode_int(*v, self.size(), order, signed).ok_or_else(|| {
                    format!("{v} outside {}-byte range", self.size())
                })
            }
        }
    }
}

fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        _ => None,
    }
}
