use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::SampleBuffer;

const MAX_CHANNELS: usize = 2;

/// Decode `path` into a [`SampleBuffer`], keeping at most two channels.
///
/// `max_samples == 0` decodes the whole file, otherwise decoding stops once
/// `max_samples` per channel are collected. Any failure (missing file,
/// unknown format, broken stream) yields the empty sentinel buffer.
pub fn load_audio(path: &Path, max_samples: usize) -> SampleBuffer {
    match decode_audio(path, max_samples) {
        Ok(buffer) => buffer,
        Err(err) => {
            log::warn!("Could not load {}: {:#}", path.display(), err);
            SampleBuffer::empty()
        }
    }
}

fn decode_audio(path: &Path, max_samples: usize) -> Result<SampleBuffer> {
    if !path.is_file() {
        anyhow::bail!("Not a readable file");
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Unrecognized audio format")?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
    let mut source_channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    let limit = if max_samples == 0 { usize::MAX } else { max_samples };

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let stride = *source_channels.get_or_insert(spec.channels.count());
        if stride == 0 {
            anyhow::bail!("Stream reports zero channels");
        }

        if channels.is_empty() {
            channels = vec![Vec::new(); stride.clamp(1, MAX_CHANNELS)];
        }

        let mut sample_buf = InterleavedBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Keep the leading channels, drop the rest.
        let remaining = limit - channels[0].len();
        for frame in sample_buf.samples().chunks(stride).take(remaining) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        if channels[0].len() >= limit {
            break;
        }
    }

    let buffer = SampleBuffer::from_channels(channels, sample_rate as f64)?;

    log::info!(
        "Decoded audio: {} channel(s), {} samples, {}Hz, {:.1}s",
        buffer.num_channels(),
        buffer.num_samples(),
        sample_rate,
        buffer.duration_secs()
    );

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: usize, rate: u32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            for c in 0..channels {
                // channel c carries (c + 1) / 10
                writer.write_sample((c + 1) as f32 / 10.0).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 4410, 44100);

        let buffer = load_audio(&path, 0);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 4410);
        assert_eq!(buffer.sample_rate(), 44100.0);
        assert!((buffer.channel(0).unwrap()[10] - 0.1).abs() < 1e-6);
        assert!((buffer.channel(1).unwrap()[10] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn truncates_to_max_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 8000, 8000);

        let buffer = load_audio(&path, 1000);
        assert_eq!(buffer.num_channels(), 1);
        assert_eq!(buffer.num_samples(), 1000);

        let whole = load_audio(&path, 100_000);
        assert_eq!(whole.num_samples(), 8000);
    }

    #[test]
    fn clamps_to_two_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.wav");
        write_wav(&path, 4, 500, 16000);

        let buffer = load_audio(&path, 0);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 500);
        assert!((buffer.channel(1).unwrap()[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn missing_file_yields_empty_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = load_audio(&dir.path().join("nope.wav"), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn unknown_format_yields_empty_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(load_audio(&path, 0).is_empty());
    }
}
