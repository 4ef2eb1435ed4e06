use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::audio::features::{gain_to_decibels, DecibelHistogram, LevelWindow};
use crate::session::{AnalysisEntry, LoadedAudio};

#[derive(Serialize)]
struct JsonReport<'a> {
    window_ms: f64,
    sample_rate: f64,
    windows: &'a [LevelWindow],
    histogram: &'a DecibelHistogram,
    rolling_rms: Vec<f32>,
}

pub fn render_json(audio: &LoadedAudio, entries: &[AnalysisEntry]) -> Result<String> {
    let reports: Vec<JsonReport> = entries
        .iter()
        .map(|entry| JsonReport {
            window_ms: entry.window_length.as_secs_f64() * 1000.0,
            sample_rate: audio.buffer.sample_rate(),
            windows: &entry.result.windows,
            histogram: &entry.result.histogram,
            rolling_rms: entry.result.rolling_rms_average(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&reports)?)
}

pub fn render_text(audio: &LoadedAudio, entries: &[AnalysisEntry], bar_width: usize) -> String {
    TextReport {
        audio,
        entries,
        bar_width,
    }
    .to_string()
}

struct TextReport<'a> {
    audio: &'a LoadedAudio,
    entries: &'a [AnalysisEntry],
    bar_width: usize,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let audio = self.audio;
        writeln!(f, "File:     {}", audio.path.display())?;
        if audio.buffer.is_empty() {
            return writeln!(f, "No audio data (file missing, unreadable or empty).");
        }
        writeln!(
            f,
            "Source:   {} channel(s), {:.0}Hz, {} samples ({})",
            audio.source_channels,
            audio.source_rate,
            audio.source_samples,
            format_time(audio.source_samples as f64 / audio.source_rate)
        )?;
        writeln!(f, "Analysis: {:.0}Hz, channel 0", audio.buffer.sample_rate())?;

        for entry in self.entries {
            writeln!(f)?;
            write_entry(f, entry, self.bar_width)?;
        }
        Ok(())
    }
}

fn write_entry(
    f: &mut fmt::Formatter<'_>,
    entry: &AnalysisEntry,
    bar_width: usize,
) -> fmt::Result {
    let result = &entry.result;
    let window_secs = entry.window_length.as_secs_f64();

    writeln!(
        f,
        "== Window {} ms: {} window(s)",
        format_ms(entry.window_length),
        result.windows.len()
    )?;
    if result.windows.is_empty() {
        return writeln!(f, "   (audio is shorter than one window)");
    }

    if let Some((index, loudest)) = result.loudest_window() {
        writeln!(
            f,
            "   Loudest at {}: peak {:.1} dBFS, RMS {:.1} dBFS",
            format_time(index as f64 * window_secs),
            gain_to_decibels(loudest.peak),
            gain_to_decibels(loudest.rms)
        )?;
    }

    writeln!(
        f,
        "   {:>10}  {:>9}  {:>9}  {:>9}",
        "time", "peak dB", "rms dB", "avg dB"
    )?;
    let averages = result.rolling_rms_average();
    for (i, (window, avg)) in result.windows.iter().zip(averages).enumerate() {
        writeln!(
            f,
            "   {:>10}  {:>9.1}  {:>9.1}  {:>9.1}",
            format_time(i as f64 * window_secs),
            gain_to_decibels(window.peak),
            gain_to_decibels(window.rms),
            gain_to_decibels(avg)
        )?;
    }

    let histogram = &result.histogram;
    if histogram.is_empty() {
        return writeln!(f, "   RMS histogram: no windows between 0 and -80 dB");
    }
    writeln!(
        f,
        "   RMS histogram ({} of {} windows between 0 and -80 dB)",
        histogram.total(),
        result.windows.len()
    )?;
    let max = histogram.bins().iter().copied().max().unwrap_or(0);
    for (db, &count) in histogram.bins().iter().enumerate() {
        if count == 0 {
            continue;
        }
        writeln!(
            f,
            "   {:>4} dB | {:<width$} {}",
            -(db as i32),
            "#".repeat(bar_len(count, max, bar_width)),
            count,
            width = bar_width
        )?;
    }
    Ok(())
}

fn bar_len(count: u32, max: u32, width: usize) -> usize {
    if max == 0 || width == 0 {
        return 0;
    }
    ((count as f64 / max as f64) * width as f64).round().max(1.0) as usize
}

fn format_ms(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms.fract() == 0.0 {
        format!("{}", ms as u64)
    } else {
        format!("{:.2}", ms)
    }
}

fn format_time(secs: f64) -> String {
    let total = secs.max(0.0);
    let whole = total as u64;
    let centis = ((total - whole as f64) * 100.0) as u64;
    if whole >= 3600 {
        format!(
            "{:02}:{:02}:{:02}.{:02}",
            whole / 3600,
            (whole % 3600) / 60,
            whole % 60,
            centis
        )
    } else {
        format!("{:02}:{:02}.{:02}", whole / 60, whole % 60, centis)
    }
}
