use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{
    Cli, OutputFormat, DEFAULT_ANALYSIS_RATE, DEFAULT_HISTOGRAM_WIDTH, DEFAULT_WINDOW_MS,
};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: Vec<f32>,
    #[serde(default = "default_analysis_rate")]
    pub analysis_rate: f64,
    #[serde(default)]
    pub max_samples: usize,
    #[serde(default)]
    pub threads: usize,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_histogram_width")]
    pub histogram_width: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            analysis_rate: default_analysis_rate(),
            max_samples: 0,
            threads: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            histogram_width: default_histogram_width(),
        }
    }
}

fn default_window_ms() -> Vec<f32> { vec![DEFAULT_WINDOW_MS] }
fn default_analysis_rate() -> f64 { DEFAULT_ANALYSIS_RATE }
fn default_histogram_width() -> usize { DEFAULT_HISTOGRAM_WIDTH }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path first, then `lautset.toml` in the working directory, then
/// the per-user config file.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("lautset.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("lautset").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("lautset").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Config values apply only where the CLI is still at its default.
pub fn merge(cli: &mut Cli, cfg: Config) {
    if cli.window_ms.is_empty() { cli.window_ms = cfg.analysis.window_ms; }
    if cli.analysis_rate == DEFAULT_ANALYSIS_RATE { cli.analysis_rate = cfg.analysis.analysis_rate; }
    if cli.max_samples == 0 { cli.max_samples = cfg.analysis.max_samples; }
    if cli.threads == 0 { cli.threads = cfg.analysis.threads; }
    if cli.format == OutputFormat::Text { cli.format = cfg.output.format; }
    if cli.histogram_width == DEFAULT_HISTOGRAM_WIDTH { cli.histogram_width = cfg.output.histogram_width; }
}

/// Reject settings no analysis could run with.
pub fn validate(cli: &mut Cli) -> Result<()> {
    if cli.window_ms.is_empty() {
        cli.window_ms.push(DEFAULT_WINDOW_MS);
    }
    for &ms in &cli.window_ms {
        if !(ms.is_finite() && ms > 0.0) {
            anyhow::bail!("Window length must be a positive number of milliseconds, got {}", ms);
        }
    }
    if !(cli.analysis_rate.is_finite() && cli.analysis_rate > 0.0) {
        anyhow::bail!("Analysis rate must be positive, got {}", cli.analysis_rate);
    }
    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        log::warn!("Input file not found: {}", input.display());
    }
    Ok(())
}

/// Distinct window lengths in the order given.
///
/// Lengths too large for a `Duration` saturate to `Duration::MAX`, which no
/// buffer can fill, so they analyze to an empty result.
pub fn window_lengths(window_ms: &[f32]) -> Vec<Duration> {
    let mut windows: Vec<Duration> = Vec::new();
    for &ms in window_ms {
        let window = Duration::try_from_secs_f64(ms as f64 / 1000.0).unwrap_or(Duration::MAX);
        if !windows.contains(&window) {
            windows.push(window);
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_full_config() {
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            window_ms = [500.0, 2000.0]
            analysis_rate = 11025.0
            max_samples = 44100

            [output]
            format = "json"
            histogram_width = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.window_ms, vec![500.0, 2000.0]);
        assert_eq!(cfg.analysis.analysis_rate, 11025.0);
        assert_eq!(cfg.analysis.max_samples, 44100);
        assert_eq!(cfg.analysis.threads, 0);
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert_eq!(cfg.output.histogram_width, 20);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.analysis.window_ms, vec![DEFAULT_WINDOW_MS]);
        assert_eq!(cfg.analysis.analysis_rate, DEFAULT_ANALYSIS_RATE);
        assert_eq!(cfg.output.format, OutputFormat::Text);
    }

    #[test]
    fn cli_wins_over_config() {
        let mut cli = Cli::parse_from(["lautset", "in.wav", "--window-ms", "250,750", "--format", "json"]);
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            window_ms = [500.0]
            analysis_rate = 8000.0
            [output]
            format = "text"
            "#,
        )
        .unwrap();
        merge(&mut cli, cfg);
        assert_eq!(cli.window_ms, vec![250.0, 750.0]);
        assert_eq!(cli.analysis_rate, 8000.0);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn validate_rejects_bad_windows() {
        let mut cli = Cli::parse_from(["lautset", "in.wav", "--window-ms", "0"]);
        assert!(validate(&mut cli).is_err());

        let mut cli = Cli::parse_from(["lautset", "in.wav", "--analysis-rate=-1"]);
        assert!(validate(&mut cli).is_err());

        let mut cli = Cli::parse_from(["lautset"]);
        assert!(validate(&mut cli).is_err());

        let mut cli = Cli::parse_from(["lautset", "in.wav"]);
        validate(&mut cli).unwrap();
        assert_eq!(cli.window_ms, vec![DEFAULT_WINDOW_MS]);
    }

    #[test]
    fn huge_window_saturates_instead_of_panicking() {
        let mut cli = Cli::parse_from(["lautset", "in.wav", "--window-ms", "1e30"]);
        validate(&mut cli).unwrap();
        assert_eq!(window_lengths(&cli.window_ms), vec![Duration::MAX]);
    }

    #[test]
    fn window_lengths_drop_duplicates() {
        let windows = window_lengths(&[500.0, 250.0, 500.0]);
        assert_eq!(
            windows,
            vec![Duration::from_millis(500), Duration::from_millis(250)]
        );
    }

    #[test]
    fn unreadable_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lautset.toml");
        assert!(load_config(&path).is_none());
        std::fs::write(&path, "analysis = 3").unwrap();
        assert!(load_config(&path).is_none());
    }
}
