//! Audio output: one cpal stream rendering the preview engine.
//!
//! The stream callback locks the engine, renders block-wise and mirrors the
//! samples into a ring buffer the UI reads for its waveform row.

use std::sync::{Arc, Mutex};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::Producer;

use tabedit::synth::PluckEngine;
use tabedit::MAX_BLOCK_SIZE;

/// Sample rate assumed when no output device is available.
pub const FALLBACK_SAMPLE_RATE: f32 = 48_000.0;

/// Build and start the output stream.
///
/// Returns the stream (keep it alive) and the engine it renders, created at
/// the device's sample rate.
pub fn start(mut tap: Producer<f32>) -> EyreResult<(cpal::Stream, Arc<Mutex<PluckEngine>>)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;

    let engine = Arc::new(Mutex::new(PluckEngine::new(sample_rate)));
    let engine_for_stream = engine.clone();
    let mut render_buf = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            let mut engine = engine_for_stream.lock().unwrap();
            let total_frames = data.len() / channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames_to_render = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                let block = &mut render_buf[..frames_to_render];
                engine.render_block(block);

                // Copy to output (mono to all channels) and tap for the UI.
                let out_off = frames_written * channels;
                for (i, &s) in block.iter().enumerate() {
                    for ch in 0..channels {
                        data[out_off + i * channels + ch] = s;
                    }
                    let _ = tap.push(s);
                }

                frames_written += frames_to_render;
            }
        },
        |err| eprintln!("audio error: {err}"),
        None,
    )?;

    stream.play()?;
    Ok((stream, engine))
}
