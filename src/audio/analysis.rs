use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use super::buffer::SampleBuffer;
use super::features::{DecibelHistogram, LevelWindow, LoudnessAnalysisResult};

/// What to analyze and how long each window is.
#[derive(Clone, Debug)]
pub struct LoudnessAnalysisOptions {
    pub buffer: Arc<SampleBuffer>,
    pub window_length: Duration,
}

impl LoudnessAnalysisOptions {
    pub fn run(&self) -> LoudnessAnalysisResult {
        analyze(&self.buffer, self.window_length)
    }
}

/// Length of `duration` in samples at `sample_rate`, not truncated.
pub fn to_sample_count(duration: Duration, sample_rate: f64) -> f64 {
    duration.as_secs_f64() * sample_rate
}

/// Split channel 0 of `buffer` into back-to-back windows of `window_length`
/// and measure each one, then bin the RMS levels into a decibel histogram.
///
/// The trailing partial window is dropped. Empty buffers, buffers shorter
/// than one window and windows shorter than one sample all give an empty
/// result.
pub fn analyze(buffer: &SampleBuffer, window_length: Duration) -> LoudnessAnalysisResult {
    let windows = measure_windows(buffer, window_length);

    let mut histogram = DecibelHistogram::default();
    let binned = windows.iter().filter(|w| histogram.record(w.rms)).count();

    log::debug!(
        "Analyzed {} windows of {:?}, {} binned",
        windows.len(),
        window_length,
        binned
    );

    LoudnessAnalysisResult { windows, histogram }
}

fn measure_windows(buffer: &SampleBuffer, window_length: Duration) -> Vec<LevelWindow> {
    let Some(samples) = buffer.channel(0) else {
        return Vec::new();
    };

    let window_size = to_sample_count(window_length, buffer.sample_rate()) as usize;
    if window_size == 0 {
        log::warn!(
            "Window of {:?} is shorter than one sample at {}Hz",
            window_length,
            buffer.sample_rate()
        );
        return Vec::new();
    }

    let num_windows = samples.len() / window_size;

    (0..num_windows)
        .into_par_iter()
        .map(|i| {
            let start = i * window_size;
            level_of(&samples[start..start + window_size])
        })
        .collect()
}

fn level_of(window: &[f32]) -> LevelWindow {
    let peak = window.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    let sum_sq: f64 = window.iter().map(|&s| s as f64 * s as f64).sum();
    let rms = (sum_sq / window.len() as f64).sqrt() as f32;
    LevelWindow { peak, rms }
}
