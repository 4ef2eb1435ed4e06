mod audio;
mod cli;
mod config;
mod report;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use cli::{Cli, OutputFormat};
use session::{Session, Update};

const TICK: Duration = Duration::from_millis(80);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::discover(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            config::merge(&mut cli, cfg);
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }
    config::validate(&mut cli)?;

    let input = cli.input.clone().context("Input audio file is required")?;
    let windows = config::window_lengths(&cli.window_ms);

    log::info!("lautset - loudness analysis");
    log::info!("Input: {}", input.display());
    log::info!("Analysis rate: {:.0}Hz", cli.analysis_rate);
    log::info!("Windows: {:?} ms", cli.window_ms);

    let mut session = Session::new(cli.threads)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );

    // 1. Load and resample in the background
    pb.set_message("Loading audio...");
    session.submit_load(input, cli.max_samples, cli.analysis_rate);
    loop {
        pb.tick();
        let updates = session.tick(TICK);
        if let Some(reason) = updates.iter().find_map(|u| match u {
            Update::LoadFailed(reason) => Some(reason.clone()),
            _ => None,
        }) {
            pb.finish_and_clear();
            anyhow::bail!("Could not prepare audio: {}", reason);
        }
        if updates.contains(&Update::AudioReady) {
            break;
        }
    }

    // 2. One analysis task per window length
    for &window in &windows {
        session.submit_analysis(window);
    }
    pb.set_message(format!("Analyzing {} window length(s)...", windows.len()));
    while windows.iter().any(|&w| session.analysis(w).is_none()) {
        pb.tick();
        session.tick(TICK);
    }
    pb.finish_and_clear();

    // 3. Render
    let audio = session.audio().context("Audio disappeared after loading")?;
    let entries: Vec<_> = windows
        .iter()
        .filter_map(|&w| session.analysis(w).cloned())
        .collect();

    match cli.format {
        OutputFormat::Text => print!("{}", report::render_text(audio, &entries, cli.histogram_width)),
        OutputFormat::Json => println!("{}", report::render_json(audio, &entries)?),
    }

    log::info!("Done");
    Ok(())
}
