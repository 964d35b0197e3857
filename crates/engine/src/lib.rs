use basedrop::{Collector, Handle, Owned};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use tracklab_transport::TrackId;

mod chain;
mod graph;

pub use chain::{EffectNode, EffectParam, EffectProcessor, ThreeBandEq, build_chain};
pub use graph::{TrackGraph, Voice};

/// Control messages for the audio thread. Everything crossing here is
/// either `Copy` or wrapped in `basedrop::Owned`, so the audio thread
/// never frees memory itself.
pub enum Command {
    /// Install a freshly built graph set and start playing. The
    /// previous set is dropped through the collector.
    Play { graphs: Owned<Vec<TrackGraph>> },
    /// Stop playback and clear every active voice.
    Stop,
    SetTrackVolume { track: TrackId, volume: f32 },
    SetTrackPan { track: TrackId, pan: f32 },
    SetEffectParam {
        track: TrackId,
        index: usize,
        param: EffectParam,
        value: f32,
    },
}

/// Handle owned by the control thread. Dropping it stops the stream.
pub struct EngineHandle {
    commands: rtrb::Producer<Command>,
    collector: Collector,
    handle: Handle,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl EngineHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Basedrop handle for wrapping graph sets bound for the audio
    /// thread.
    pub fn basedrop_handle(&self) -> &Handle {
        &self.handle
    }

    /// Push a command to the audio thread; also retires any garbage the
    /// audio thread has dropped since the last call.
    pub fn send(&mut self, command: Command) {
        if self.commands.push(command).is_err() {
            log::warn!("engine command queue full, command dropped");
        }
        self.collector.collect();
    }
}

/// Open the default output device and start the mix callback.
pub fn start() -> anyhow::Result<EngineHandle> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(64);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), command_rx)?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;

    Ok(EngineHandle {
        commands: command_tx,
        collector,
        handle,
        sample_rate,
        _stream: stream,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;

    let mut graphs: Option<Owned<Vec<TrackGraph>>> = None;
    let mut playing = false;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(command) = command_rx.pop() {
                match command {
                    Command::Play { graphs: new_graphs } => {
                        // Replacing the set drops the old graphs into the
                        // collector, voices and all.
                        graphs = Some(new_graphs);
                        playing = true;
                    }
                    Command::Stop => {
                        playing = false;
                        if let Some(graphs) = graphs.as_mut() {
                            for graph in graphs.iter_mut() {
                                graph.stop_voices();
                            }
                        }
                    }
                    Command::SetTrackVolume { track, volume } => {
                        if let Some(graph) = find_graph(&mut graphs, track) {
                            graph.set_volume(volume);
                        }
                    }
                    Command::SetTrackPan { track, pan } => {
                        if let Some(graph) = find_graph(&mut graphs, track) {
                            graph.set_pan(pan);
                        }
                    }
                    Command::SetEffectParam {
                        track,
                        index,
                        param,
                        value,
                    } => {
                        if let Some(graph) = find_graph(&mut graphs, track) {
                            graph.set_effect_param(index, param, value);
                        }
                    }
                }
            }

            for frame in data.chunks_mut(output_channels) {
                let (mut l, mut r) = (0.0f32, 0.0f32);
                if playing {
                    if let Some(graphs) = graphs.as_mut() {
                        for graph in graphs.iter_mut() {
                            let (gl, gr) = graph.process_frame();
                            l += gl;
                            r += gr;
                        }
                    }
                }
                let stereo = [l, r];
                for (ch, sample) in frame.iter_mut().enumerate() {
                    *sample = T::from_sample(stereo[ch % 2]);
                }
            }
        },
        |err| log::error!("output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

fn find_graph<'a>(
    graphs: &'a mut Option<Owned<Vec<TrackGraph>>>,
    track: TrackId,
) -> Option<&'a mut TrackGraph> {
    graphs
        .as_mut()?
        .iter_mut()
        .find(|g| g.track_id() == track)
}
