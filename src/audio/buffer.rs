use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BufferError {
    #[error("Invalid sample rate: {0} Hz (must be positive and finite)")]
    InvalidSampleRate(f64),

    #[error("Channel {channel} has {len} samples, expected {expected}")]
    RaggedChannels {
        channel: usize,
        len: usize,
        expected: usize,
    },
}

/// Decoded PCM, one `Vec` per channel, tagged with its sample rate.
///
/// Immutable once built. Share it between threads with `Arc` instead of
/// copying; resampling and analysis always produce new values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
}

impl SampleBuffer {
    /// The "nothing loaded" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: f64) -> Result<Self, BufferError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(BufferError::InvalidSampleRate(sample_rate));
        }

        let expected = channels.first().map_or(0, Vec::len);
        if let Some((channel, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != expected)
        {
            return Err(BufferError::RaggedChannels {
                channel,
                len: ch.len(),
                expected,
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Buffer of `num_channels` channels, each filled with `value`.
    #[cfg(test)]
    pub fn filled(num_channels: usize, num_samples: usize, value: f32, sample_rate: f64) -> Self {
        Self::from_channels(vec![vec![value; num_samples]; num_channels], sample_rate)
            .expect("uniform channels are never ragged")
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.num_samples() as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}
