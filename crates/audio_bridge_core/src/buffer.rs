//! Host-side sample container accepted by buffer-valued options.

use crate::error::{BridgeError, NativeErrorKind, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: f32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Allocate a silent buffer.
    pub fn new(number_of_channels: usize, length: usize, sample_rate: f32) -> Result<Self> {
        if number_of_channels == 0 {
            return Err(BridgeError::Native {
                kind: NativeErrorKind::NotSupportedError,
                message: "AudioBuffer requires at least one channel".into(),
            });
        }
        if length == 0 {
            return Err(BridgeError::Native {
                kind: NativeErrorKind::NotSupportedError,
                message: "AudioBuffer length must be greater than zero".into(),
            });
        }
        Ok(Self {
            sample_rate,
            channels: vec![vec![0.0; length]; number_of_channels],
        })
    }

    /// Build a buffer from channel data. All channels must share a length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: f32) -> Result<Self> {
        let length = channels.first().map(Vec::len).unwrap_or(0);
        if channels.iter().any(|c| c.len() != length) {
            return Err(BridgeError::Native {
                kind: NativeErrorKind::NotSupportedError,
                message: "AudioBuffer channels must all have the same length".into(),
            });
        }
        let mut buffer = Self::new(channels.len(), length, sample_rate)?;
        buffer.channels = channels;
        Ok(buffer)
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn length(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}
