use std::collections::HashMap;

use tracklab_capture::{CaptureError, CaptureSession};
use tracklab_decode::{BufferCache, ClipSource};
use tracklab_engine::{Command, EffectParam, EngineHandle, TrackGraph};
use tracklab_render::export_project;
use tracklab_transport::{Project, TrackId, TransportClock};

use basedrop::Owned;

/// The engine facade the surrounding application talks to.
///
/// One service owns the decoded-buffer cache, the output engine, the
/// transport clock and (while recording) the capture session. Project
/// data is passed in per call as a read-only snapshot; nothing is held
/// between calls and nothing survives the process.
pub struct AudioService {
    engine: EngineHandle,
    cache: BufferCache,
    clock: TransportClock,
    capture: Option<CaptureSession>,
    source: Box<dyn ClipSource>,
    /// Effect ids per playing track, in chain order, captured at the
    /// last `play`. Parameter updates resolve ids against this layout.
    chain_layouts: HashMap<TrackId, Vec<String>>,
}

impl AudioService {
    /// Start the output engine and build an empty cache at its rate.
    /// `source` resolves clip locators to encoded bytes.
    pub fn new(source: Box<dyn ClipSource>) -> anyhow::Result<Self> {
        let engine = tracklab_engine::start()?;
        let cache = BufferCache::new(engine.sample_rate());
        Ok(Self {
            engine,
            cache,
            clock: TransportClock::new(),
            capture: None,
            source,
            chain_layouts: HashMap::new(),
        })
    }

    /// Fetch and decode every clip the project references. Sources that
    /// fail to load are cached as silence; this never fails.
    pub fn load_project(&mut self, project: &Project) {
        self.cache.ensure_loaded(project, self.source.as_ref());
    }

    /// Start playback at `at_time` seconds. Rebuilds the graph of every
    /// track in the resolved playback set; a no-op while already
    /// playing.
    pub fn play(&mut self, project: &Project, at_time: f64) {
        if self.clock.is_playing() {
            return;
        }

        let sample_rate = self.engine.sample_rate();
        let mut graphs = Vec::new();
        self.chain_layouts.clear();
        for track in project.playback_tracks() {
            let graph = TrackGraph::build(track, &self.cache, at_time, sample_rate);
            self.chain_layouts.insert(track.id, graph.chain_effect_ids());
            graphs.push(graph);
        }

        let graphs = Owned::new(self.engine.basedrop_handle(), graphs);
        self.engine.send(Command::Play { graphs });
        self.clock.start_at(at_time);
    }

    /// Stop playback and clear every scheduled voice. Idempotent. An
    /// in-progress capture is finalized as a side effect and its
    /// artifact returned.
    pub fn stop(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        if self.clock.is_playing() {
            self.engine.send(Command::Stop);
            self.clock.pause();
        }
        if self.capture.is_some() {
            return self.stop_recording();
        }
        Ok(None)
    }

    /// Move the transport to `position` seconds. While playing this
    /// reschedules every track at the new position (same wholesale
    /// rebuild as `play`); while stopped only the clock moves.
    pub fn seek(&mut self, project: &Project, position: f64) {
        if self.clock.is_playing() {
            self.engine.send(Command::Stop);
            self.clock.pause();
            self.play(project, position);
        } else {
            self.clock.seek(position);
        }
    }

    /// Transport position in seconds, valid playing or stopped.
    pub fn current_time(&self) -> f64 {
        self.clock.position()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    /// Acquire the named input device and start capturing. On failure
    /// everything partially built is torn down before the error is
    /// returned; no session remains.
    pub fn start_recording(&mut self, device_name: &str) -> Result<(), CaptureError> {
        if self.capture.is_some() {
            return Ok(());
        }
        let session = CaptureSession::start(device_name)?;
        self.capture = Some(session);
        Ok(())
    }

    /// Finalize the capture: assemble, encode and normalize the take.
    /// `Ok(None)` means nothing was captured, as distinct from failure.
    pub fn stop_recording(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        match self.capture.take() {
            Some(session) => session.finalize(),
            None => Ok(None),
        }
    }

    /// Retarget the manual gain of the live capture chain.
    pub fn set_input_gain(&mut self, gain: f32) {
        if let Some(capture) = self.capture.as_mut() {
            capture.set_input_gain(gain);
        }
    }

    /// Retarget a playing track's volume (0..=100) without rebuilding
    /// its graph. No-op for tracks that are not playing.
    pub fn update_track_volume(&mut self, track: TrackId, volume: f32) {
        self.engine.send(Command::SetTrackVolume { track, volume });
    }

    /// Retarget a playing track's pan (-100..=100).
    pub fn update_track_pan(&mut self, track: TrackId, pan: f32) {
        self.engine.send(Command::SetTrackPan { track, pan });
    }

    /// Retarget one effect parameter on a playing track, addressed by
    /// effect id and parameter name. Unknown ids, names, or pairs that
    /// do not fit the effect's kind are no-ops.
    pub fn update_track_effect_param(
        &mut self,
        track: TrackId,
        effect_id: &str,
        param: &str,
        value: f32,
    ) {
        let Some(param) = EffectParam::parse(param) else {
            return;
        };
        let Some(index) = self
            .chain_layouts
            .get(&track)
            .and_then(|ids| ids.iter().position(|id| id == effect_id))
        else {
            return;
        };
        self.engine.send(Command::SetEffectParam {
            track,
            index,
            param,
            value,
        });
    }

    /// Mix the project down to a stereo WAV, bypassing the live graph.
    /// `Ok(None)` when the project has no clip content.
    pub fn export(&mut self, project: &Project) -> anyhow::Result<Option<Vec<u8>>> {
        self.load_project(project);
        Ok(export_project(project, &self.cache))
    }

    /// Register a decoded take under a locator, e.g. a capture the
    /// caller is turning into a clip, so playback does not refetch it.
    pub fn register_buffer(&mut self, locator: impl Into<String>, audio: tracklab_transport::DecodedAudio) {
        self.cache.insert(locator, audio);
    }
}
