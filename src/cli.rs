use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_WINDOW_MS: f32 = 10000.0;
pub const DEFAULT_ANALYSIS_RATE: f64 = 22050.0;
pub const DEFAULT_HISTOGRAM_WIDTH: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "lautset", about = "Windowed peak/RMS loudness analysis of audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// Window length in milliseconds (repeat or comma-separate for several)
    #[arg(short, long = "window-ms", value_delimiter = ',')]
    pub window_ms: Vec<f32>,

    /// Sample rate the audio is converted to before analysis
    #[arg(long, default_value_t = DEFAULT_ANALYSIS_RATE)]
    pub analysis_rate: f64,

    /// Decode at most this many samples per channel (0 = whole file)
    #[arg(long, default_value_t = 0)]
    pub max_samples: usize,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Width of the longest histogram bar in the text report
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_WIDTH)]
    pub histogram_width: usize,

    /// Worker threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Config file (defaults to lautset.toml or the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
