use serde::Serialize;

/// Quietest level (dB) reported for a zero gain.
pub const DECIBEL_FLOOR: f32 = -100.0;

/// Histogram covers 0 dB down to -80 dB in 1 dB steps.
pub const HISTOGRAM_RANGE_DB: usize = 80;

/// Peak and RMS of one analysis window (channel 0, linear gain).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LevelWindow {
    pub peak: f32,
    pub rms: f32,
}

/// Convert a linear gain to decibels, clamped at [`DECIBEL_FLOOR`].
pub fn gain_to_decibels(gain: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(DECIBEL_FLOOR)
    } else {
        DECIBEL_FLOOR
    }
}

/// Counts of windows per whole-decibel RMS level.
///
/// Bucket `i` holds windows that round to `-i` dB, so index 0 is full scale
/// and index 80 is -80 dB.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecibelHistogram {
    bins: Vec<u32>,
}

impl Default for DecibelHistogram {
    fn default() -> Self {
        Self {
            bins: vec![0; HISTOGRAM_RANGE_DB + 1],
        }
    }
}

impl DecibelHistogram {
    /// Bucket for a decibel value, or `None` when it lies outside (-80, 0].
    pub fn bucket_for(db: f32) -> Option<usize> {
        if db <= -(HISTOGRAM_RANGE_DB as f32) || db > 0.0 || db.is_nan() {
            return None;
        }
        // f32::round rounds half away from zero
        Some((db.abs().round() as usize).min(HISTOGRAM_RANGE_DB))
    }

    /// Count one window at `rms`; returns whether it landed in a bucket.
    pub fn record(&mut self, rms: f32) -> bool {
        match Self::bucket_for(gain_to_decibels(rms)) {
            Some(bucket) => {
                self.bins[bucket] += 1;
                true
            }
            None => false,
        }
    }

    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    /// Count at `-db` decibels (e.g. `count(12)` is the -12 dB bucket).
    #[cfg(test)]
    pub fn count(&self, db: usize) -> u32 {
        self.bins.get(db).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.bins.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Output of one loudness analysis run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoudnessAnalysisResult {
    pub windows: Vec<LevelWindow>,
    pub histogram: DecibelHistogram,
}

impl LoudnessAnalysisResult {
    /// Cumulative mean of the RMS sequence: element `i` averages windows `0..=i`.
    pub fn rolling_rms_average(&self) -> Vec<f32> {
        let mut sum = 0.0f64;
        self.windows
            .iter()
            .enumerate()
            .map(|(i, w)| {
                sum += w.rms as f64;
                (sum / (i + 1) as f64) as f32
            })
            .collect()
    }

    /// Index and value of the window with the highest RMS.
    pub fn loudest_window(&self) -> Option<(usize, LevelWindow)> {
        self.windows
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.rms.total_cmp(&b.rms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decibel_conversion_clamps_silence() {
        assert_eq!(gain_to_decibels(1.0), 0.0);
        assert_eq!(gain_to_decibels(0.0), DECIBEL_FLOOR);
        assert_eq!(gain_to_decibels(-0.5), DECIBEL_FLOOR);
        assert_eq!(gain_to_decibels(1e-9), DECIBEL_FLOOR);
        assert!((gain_to_decibels(0.5) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(DecibelHistogram::bucket_for(0.0), Some(0));
        assert_eq!(DecibelHistogram::bucket_for(0.1), None);
        assert_eq!(DecibelHistogram::bucket_for(-0.49), Some(0));
        assert_eq!(DecibelHistogram::bucket_for(-0.5), Some(1));
        assert_eq!(DecibelHistogram::bucket_for(-12.4), Some(12));
        assert_eq!(DecibelHistogram::bucket_for(-79.6), Some(80));
        assert_eq!(DecibelHistogram::bucket_for(-80.0), None);
        assert_eq!(DecibelHistogram::bucket_for(-100.0), None);
        assert_eq!(DecibelHistogram::bucket_for(f32::NAN), None);
    }

    #[test]
    fn record_skips_out_of_range() {
        let mut histogram = DecibelHistogram::default();
        assert!(histogram.record(1.0));
        assert!(histogram.record(0.5));
        assert!(!histogram.record(0.0));
        assert!(!histogram.record(1.5));
        assert_eq!(histogram.count(0), 1);
        assert_eq!(histogram.count(6), 1);
        assert_eq!(histogram.total(), 2);
        assert_eq!(histogram.bins().len(), 81);
    }

    #[test]
    fn rolling_average_is_cumulative() {
        let result = LoudnessAnalysisResult {
            windows: vec![
                LevelWindow { peak: 1.0, rms: 0.2 },
                LevelWindow { peak: 1.0, rms: 0.4 },
                LevelWindow { peak: 1.0, rms: 0.9 },
            ],
            histogram: DecibelHistogram::default(),
        };
        let avg = result.rolling_rms_average();
        assert_eq!(avg.len(), 3);
        assert!((avg[0] - 0.2).abs() < 1e-6);
        assert!((avg[1] - 0.3).abs() < 1e-6);
        assert!((avg[2] - 0.5).abs() < 1e-6);
        assert_eq!(result.loudest_window().map(|(i, _)| i), Some(2));
    }

    #[test]
    fn histogram_serializes_as_plain_array() {
        let json = serde_json::to_value(DecibelHistogram::default()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(81));
    }
}
