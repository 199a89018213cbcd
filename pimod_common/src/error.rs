//! Error taxonomy for process image operations.

use thiserror::Error;

use crate::channel::ChannelError;

/// Error type for all core operations.
///
/// Fatality is graded: `Config` and `Construction` abort startup,
/// `NotFound` aborts the replace-I/O operation that raised it,
/// `InvalidValue` and `LengthMismatch` are local to a single signal
/// write, and `Channel` terminates an in-progress refresh loop.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Topology document missing or unparseable. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid byte/bit geometry for a signal. Indicates a bad topology
    /// document or remap table.
    #[error("invalid geometry for signal '{name}': {reason}")]
    Construction {
        /// Name of the offending signal.
        name: String,
        /// What is wrong with its geometry.
        reason: String,
    },

    /// Replace-I/O referenced an unknown signal name.
    #[error("signal not found: {0}")]
    NotFound(String),

    /// Value cannot be represented in the signal's byte width or type.
    #[error("invalid value for signal '{name}': {reason}")]
    InvalidValue {
        /// Name of the signal being written.
        name: String,
        /// Why the value is not representable.
        reason: String,
    },

    /// Raw byte write of the wrong length for a signal's span.
    #[error("length mismatch for signal '{name}': expected {expected} bytes, got {got}")]
    LengthMismatch {
        /// Name of the signal being written.
        name: String,
        /// Byte span of the signal.
        expected: usize,
        /// Length of the buffer passed in.
        got: usize,
    },

    /// I/O failure talking to the driver. Not retried transparently.
    #[error("hardware channel error: {0}")]
    Channel(#[from] ChannelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = CoreError::NotFound("Output1".to_string());
        assert!(err.to_string().contains("Output1"));

        let err = CoreError::LengthMismatch {
            name: "Word1".to_string(),
            expected: 2,
            got: 3,
        };
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn channel_error_converts() {
        let err: CoreError = ChannelError::NotOpen.into();
        assert!(matches!(err, CoreError::Channel(ChannelError::NotOpen)));
    }
}
