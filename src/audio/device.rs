//! Local sound-card capture/playback (spec §4.1, §9 "Conditional local
//! audio"). Grounded on the teacher's cpal input/output stream builders;
//! generalized from a fixed 48 kHz stereo Opus pipeline down to the
//! bridge's fixed 8 kHz mono PCM rings.

use crate::audio::AudioMutex;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;

/// Opaque local-audio collaborator: owns whatever cpal streams it started
/// and keeps them alive until dropped. The core never talks to cpal
/// directly, only through this trait (spec §1 "local sound device").
pub trait SoundDevice {
    /// Starts input (mic -> `rings.input`) and output (`rings.output` ->
    /// speaker) streams, if `local_audio` selected this implementation.
    fn start(&mut self, rings: Arc<AudioMutex>) -> anyhow::Result<()>;
}

/// Never captures or plays anything -- used when `localAudio: false`, or as
/// a test double.
#[derive(Default)]
pub struct NullSoundDevice;

impl SoundDevice for NullSoundDevice {
    fn start(&mut self, _rings: Arc<AudioMutex>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Default-input/default-output cpal device pair, resampled to the bridge's
/// fixed 8 kHz mono frame size at the stream callback boundary.
pub struct CpalSoundDevice {
    _input_stream: Option<cpal::Stream>,
    _output_stream: Option<cpal::Stream>,
}

impl Default for CpalSoundDevice {
    fn default() -> Self {
        CpalSoundDevice {
            _input_stream: None,
            _output_stream: None,
        }
    }
}

impl CpalSoundDevice {
    fn build_input(
        device: cpal::Device,
        cfg: cpal::StreamConfig,
        rings: Arc<AudioMutex>,
    ) -> anyhow::Result<cpal::Stream> {
        let err_fn = |e| tracing::error!(error = %e, "input stream error");
        let channels = cfg.channels as usize;
        let stream = device.build_input_stream(
            &cfg,
            move |data: &[i16], _| {
                let mono: Vec<i16> = if channels <= 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|frame| frame[0])
                        .collect()
                };
                let mut rings = rings.lock();
                if rings.input.add_data(&mono) < mono.len() {
                    tracing::warn!("input ring overflow, dropping tail of capture buffer");
                }
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }

    fn build_output(
        device: cpal::Device,
        cfg: cpal::StreamConfig,
        rings: Arc<AudioMutex>,
    ) -> anyhow::Result<cpal::Stream> {
        let err_fn = |e| tracing::error!(error = %e, "output stream error");
        let channels = cfg.channels as usize;
        let stream = device.build_output_stream(
            &cfg,
            move |out: &mut [i16], _| {
                let frames = out.len() / channels.max(1);
                let mut mono = vec![0i16; frames];
                rings.lock().output.get(&mut mono);
                for (i, chunk) in out.chunks_mut(channels.max(1)).enumerate() {
                    let sample = mono.get(i).copied().unwrap_or(0);
                    for s in chunk.iter_mut() {
                        *s = sample;
                    }
                }
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }
}

impl SoundDevice for CpalSoundDevice {
    fn start(&mut self, rings: Arc<AudioMutex>) -> anyhow::Result<()> {
        let host = cpal::default_host();
        let input = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("no default input device"))?;
        let output = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no default output device"))?;
        let in_cfg: cpal::StreamConfig = input.default_input_config()?.into();
        let out_cfg: cpal::StreamConfig = output.default_output_config()?.into();

        tracing::info!(device = %input.name().unwrap_or_default(), ?in_cfg, "opened input device");
        tracing::info!(device = %output.name().unwrap_or_default(), ?out_cfg, "opened output device");

        let input_stream = Self::build_input(input, in_cfg, rings.clone())?;
        let output_stream = Self::build_output(output, out_cfg, rings)?;
        input_stream.play()?;
        output_stream.play()?;
        self._input_stream = Some(input_stream);
        self._output_stream = Some(output_stream);
        Ok(())
    }
}
