use anyhow::{Context, Result};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::analysis::LoudnessAnalysisOptions;
use crate::audio::buffer::SampleBuffer;
use crate::audio::decode::load_audio;
use crate::audio::features::LoudnessAnalysisResult;
use crate::audio::resample::resample;

/// A decoded file, already converted to the analysis rate.
#[derive(Clone, Debug)]
pub struct LoadedAudio {
    pub path: PathBuf,
    pub source_rate: f64,
    pub source_channels: usize,
    pub source_samples: usize,
    pub buffer: Arc<SampleBuffer>,
}

#[derive(Clone, Debug)]
pub struct AnalysisEntry {
    pub window_length: Duration,
    pub result: Arc<LoudnessAnalysisResult>,
}

/// Messages sent from worker tasks to the session inbox.
enum Event {
    Loaded {
        generation: u64,
        audio: LoadedAudio,
    },
    LoadFailed {
        generation: u64,
        reason: String,
    },
    Analyzed {
        generation: u64,
        entry: AnalysisEntry,
    },
}

/// What changed after applying one inbox message.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    AudioReady,
    LoadFailed(String),
    AnalysisReady(Duration),
    /// Output of a load that has since been replaced.
    Stale,
}

/// Runs loading and analysis on a worker pool and owns the current state.
///
/// Workers never touch the state; they send finished values into the inbox
/// and [`Session::tick`] applies them on the calling thread.
pub struct Session {
    pool: rayon::ThreadPool,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    latest_generation: u64,
    audio: Option<LoadedAudio>,
    analyses: Vec<AnalysisEntry>,
}

impl Session {
    /// `threads == 0` sizes the pool to the available parallelism.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = if threads == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            threads
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("lautset-worker-{i}"))
            .build()
            .context("Failed to start worker pool")?;

        log::debug!("Worker pool started with {} threads", threads);

        let (tx, rx) = unbounded();
        Ok(Self {
            pool,
            tx,
            rx,
            latest_generation: 0,
            audio: None,
            analyses: Vec::new(),
        })
    }

    /// Decode `path` and resample it to `analysis_rate` in the background.
    ///
    /// Returns the generation of this load. Any earlier load still running
    /// is superseded once this one is submitted.
    pub fn submit_load(&mut self, path: PathBuf, max_samples: usize, analysis_rate: f64) -> u64 {
        self.latest_generation += 1;
        let generation = self.latest_generation;
        let tx = self.tx.clone();

        self.pool.spawn(move || {
            let source = load_audio(&path, max_samples);
            let event = match resample(&source, analysis_rate) {
                Ok(resampled) => Event::Loaded {
                    generation,
                    audio: LoadedAudio {
                        source_rate: source.sample_rate(),
                        source_channels: source.num_channels(),
                        source_samples: source.num_samples(),
                        buffer: Arc::new(resampled),
                        path,
                    },
                },
                Err(err) => Event::LoadFailed {
                    generation,
                    reason: err.to_string(),
                },
            };
            // The session may already be gone; nothing left to notify.
            let _ = tx.send(event);
        });

        generation
    }

    /// Analyze the current buffer with `window_length` in the background.
    ///
    /// Returns `false` when no audio has been published yet.
    pub fn submit_analysis(&self, window_length: Duration) -> bool {
        let Some(audio) = &self.audio else {
            return false;
        };

        let options = LoudnessAnalysisOptions {
            buffer: Arc::clone(&audio.buffer),
            window_length,
        };
        let generation = self.latest_generation;
        let tx = self.tx.clone();

        self.pool.spawn(move || {
            let result = options.run();
            let _ = tx.send(Event::Analyzed {
                generation,
                entry: AnalysisEntry {
                    window_length,
                    result: Arc::new(result),
                },
            });
        });

        true
    }

    /// Wait up to `timeout` for inbox messages and apply everything queued.
    pub fn tick(&mut self, timeout: Duration) -> Vec<Update> {
        let first = match self.rx.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return Vec::new()
            }
        };

        let mut updates = vec![self.apply(first)];
        while let Ok(event) = self.rx.try_recv() {
            updates.push(self.apply(event));
        }
        updates
    }

    fn apply(&mut self, event: Event) -> Update {
        match event {
            Event::Loaded { generation, audio } if generation == self.latest_generation => {
                log::info!(
                    "Loaded {} ({} samples at {:.0}Hz for analysis)",
                    audio.path.display(),
                    audio.buffer.num_samples(),
                    audio.buffer.sample_rate()
                );
                self.audio = Some(audio);
                self.analyses.clear();
                Update::AudioReady
            }
            Event::LoadFailed { generation, reason } if generation == self.latest_generation => {
                log::warn!("Load failed: {}", reason);
                self.audio = None;
                self.analyses.clear();
                Update::LoadFailed(reason)
            }
            Event::Analyzed { generation, entry } if generation == self.latest_generation => {
                let window_length = entry.window_length;
                match self
                    .analyses
                    .iter_mut()
                    .find(|e| e.window_length == window_length)
                {
                    Some(existing) => *existing = entry,
                    None => self.analyses.push(entry),
                }
                Update::AnalysisReady(window_length)
            }
            _ => {
                log::debug!("Dropping result from superseded load");
                Update::Stale
            }
        }
    }

    pub fn audio(&self) -> Option<&LoadedAudio> {
        self.audio.as_ref()
    }

    pub fn analysis(&self, window_length: Duration) -> Option<&AnalysisEntry> {
        self.analyses
            .iter()
            .find(|e| e.window_length == window_length)
    }
}
