use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

use super::buffer::SampleBuffer;

/// Frames fed to the sinc resampler per call.
const CHUNK_SIZE: usize = 1024;

#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("Failed to create resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Number of frames a `input_len`-frame buffer occupies at the target rate.
pub fn output_length(input_len: usize, current_rate: f64, target_rate: f64) -> usize {
    if input_len == 0 {
        return 0;
    }
    let ratio = current_rate / target_rate;
    (input_len as f64 / ratio).max(1.0).round() as usize
}

/// Convert `buffer` to `target_rate`, keeping channel count and duration.
///
/// The output holds exactly [`output_length`] frames per channel and output
/// frame 0 lines up with input frame 0. Frames past the end of the input are
/// produced by flushing the filter with silence.
///
/// # Panics
///
/// Panics if `target_rate` is not a positive, finite number.
pub fn resample(buffer: &SampleBuffer, target_rate: f64) -> Result<SampleBuffer, ResampleError> {
    assert!(
        target_rate.is_finite() && target_rate > 0.0,
        "target sample rate must be positive, got {target_rate}"
    );

    if buffer.sample_rate() == target_rate {
        return Ok(buffer.clone());
    }

    let num_channels = buffer.num_channels();
    let out_len = output_length(buffer.num_samples(), buffer.sample_rate(), target_rate);

    if out_len == 0 || num_channels == 0 {
        return Ok(rebuild(vec![Vec::new(); num_channels], target_rate));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate / buffer.sample_rate();
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, num_channels)?;

    let input = buffer.channels();
    let in_len = buffer.num_samples();

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(out_len); num_channels];
    let mut pos = 0;

    while output[0].len() < out_len {
        let block = if pos < in_len {
            let end = (pos + resampler.input_frames_next()).min(in_len);
            let slices: Vec<&[f32]> = input.iter().map(|ch| &ch[pos..end]).collect();
            let full = end - pos == resampler.input_frames_next();
            pos = end;
            if full {
                resampler.process(&slices, None)?
            } else {
                resampler.process_partial(Some(slices.as_slice()), None)?
            }
        } else {
            // Flush the filter tail with silence.
            resampler.process_partial::<&[f32]>(None, None)?
        };

        if block[0].is_empty() && pos >= in_len {
            break;
        }

        for (out, chunk) in output.iter_mut().zip(block) {
            out.extend_from_slice(&chunk);
        }
    }

    for channel in &mut output {
        channel.resize(out_len, 0.0);
    }

    log::debug!(
        "Resampled {} -> {} frames ({:.0}Hz -> {:.0}Hz)",
        in_len,
        out_len,
        buffer.sample_rate(),
        target_rate
    );

    Ok(rebuild(output, target_rate))
}

fn rebuild(channels: Vec<Vec<f32>>, sample_rate: f64) -> SampleBuffer {
    match SampleBuffer::from_channels(channels, sample_rate) {
        Ok(buffer) => buffer,
        // Every channel is sized to the same length and the rate was checked above.
        Err(err) => unreachable!("resampler produced an invalid buffer: {err}"),
    }
}
