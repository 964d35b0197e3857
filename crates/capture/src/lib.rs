use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use tracklab_render::{encode_wav, normalize_wav};
use tracklab_transport::DecodedAudio;

mod chain;

pub use chain::{ANALYSIS_BLOCK, ConditioningChain};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no default input device")]
    NoDefaultDevice,
    #[error("no input device named '{0}'")]
    DeviceNotFound(String),
    #[error("failed to query input devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("failed to read device configuration: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("unsupported input sample format '{0}'")]
    UnsupportedFormat(String),
    #[error("failed to build input stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    StreamPlay(#[from] cpal::PlayStreamError),
}

enum CaptureCommand {
    SetInputGain(f32),
}

/// Names of the available capture devices, for the caller's device
/// picker.
pub fn input_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            log::warn!("could not enumerate input devices: {e}");
            Vec::new()
        }
    }
}

/// An in-progress capture: the input stream conditions every sample
/// through [`ConditioningChain`] and feeds a ring buffer drained by a
/// collector thread. Exists only between `start` and `finalize`; both
/// the normal and the error path release the device.
pub struct CaptureSession {
    commands: rtrb::Producer<CaptureCommand>,
    collector: Option<JoinHandle<Vec<f32>>>,
    stop_flag: Arc<AtomicBool>,
    sample_rate: u32,
    stream: Option<cpal::Stream>,
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // An abandoned session still has to let its collector thread
        // exit; the stream field drops with the session and stops the
        // callback.
        self.stop_flag.store(true, Ordering::Release);
    }
}

impl CaptureSession {
    /// Acquire the named input device (the default device when the name
    /// is empty) and start capturing. cpal hands over the raw device
    /// signal; all conditioning is the chain's own. Any failure tears
    /// down whatever was built and returns the error.
    pub fn start(device_name: &str) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = if device_name.is_empty() {
            host.default_input_device()
                .ok_or(CaptureError::NoDefaultDevice)?
        } else {
            host.input_devices()?
                .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(device_name.to_string()))?
        };

        let config = device.default_input_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(CaptureError::UnsupportedFormat(
                config.sample_format().to_string(),
            ));
        }
        let sample_rate = config.sample_rate().0;
        let input_channels = config.channels() as usize;

        let mut conditioning = ConditioningChain::new(sample_rate);
        let (command_tx, mut command_rx) = rtrb::RingBuffer::<CaptureCommand>::new(64);
        // A few seconds of headroom between the callback and the
        // collector thread.
        let (mut sample_tx, mut sample_rx) = rtrb::RingBuffer::<f32>::new(sample_rate as usize * 4);

        let stream = device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                while let Ok(command) = command_rx.pop() {
                    match command {
                        CaptureCommand::SetInputGain(gain) => conditioning.set_input_gain(gain),
                    }
                }
                for frame in data.chunks(input_channels) {
                    // Downmix the device frame to mono before conditioning.
                    let mono = frame.iter().sum::<f32>() / input_channels as f32;
                    let conditioned = conditioning.process(mono);
                    let _ = sample_tx.push(conditioned);
                }
            },
            |err| log::error!("input stream error: {err}"),
            None,
        )?;

        stream.play()?;

        // Spawn the collector only once the stream is live, so a failed
        // start leaves no thread behind.
        let stop_flag = Arc::new(AtomicBool::new(false));
        let collector_stop = stop_flag.clone();
        let collector = std::thread::spawn(move || {
            let mut chunks: Vec<Vec<f32>> = Vec::new();
            loop {
                let mut chunk = Vec::new();
                while let Ok(sample) = sample_rx.pop() {
                    chunk.push(sample);
                }
                let drained_nothing = chunk.is_empty();
                if !drained_nothing {
                    chunks.push(chunk);
                }
                if collector_stop.load(Ordering::Acquire) && drained_nothing {
                    break;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            chunks.concat()
        });

        Ok(Self {
            commands: command_tx,
            collector: Some(collector),
            stop_flag,
            sample_rate,
            stream: Some(stream),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Retarget the manual gain stage of the live chain.
    pub fn set_input_gain(&mut self, gain: f32) {
        if self
            .commands
            .push(CaptureCommand::SetInputGain(gain))
            .is_err()
        {
            log::warn!("capture command queue full, gain change dropped");
        }
    }

    /// Stop the stream, drain everything captured, and hand back the
    /// finished artifact: encoded as WAV, then normalized. A capture
    /// that produced no samples yields `None` rather than an empty file.
    pub fn finalize(mut self) -> anyhow::Result<Option<Vec<u8>>> {
        // Release the device before draining so no new samples arrive.
        drop(self.stream.take());
        self.stop_flag.store(true, Ordering::Release);

        let collector = self
            .collector
            .take()
            .expect("finalize consumes the session");
        let samples = collector
            .join()
            .map_err(|_| anyhow::anyhow!("capture collector thread panicked"))?;

        Ok(assemble_artifact(samples, self.sample_rate))
    }
}

/// Turn a finished capture into its artifact: encode the mono take as
/// WAV and normalize it. A capture with no samples yields `None`, which
/// the caller treats as "too short to keep", not as a failure.
fn assemble_artifact(samples: Vec<f32>, sample_rate: u32) -> Option<Vec<u8>> {
    if samples.is_empty() {
        return None;
    }
    let audio = DecodedAudio::new(samples, sample_rate, 1);
    Some(normalize_wav(&encode_wav(&audio)))
}
