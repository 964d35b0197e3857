use std::time::Instant;

/// The logical playback clock, independent of the audio thread.
///
/// While playing, the position advances with wall-clock time from the
/// last start; while stopped it holds the accumulated offset:
///
/// `position = playing ? offset + (now - origin) : offset`
#[derive(Debug, Clone)]
pub struct TransportClock {
    playing: bool,
    origin: Instant,
    offset: f64,
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            playing: false,
            origin: Instant::now(),
            offset: 0.0,
        }
    }

    /// Begin advancing from `offset` seconds. No-op while already playing.
    pub fn start_at(&mut self, offset: f64) {
        if self.playing {
            return;
        }
        self.offset = offset;
        self.origin = Instant::now();
        self.playing = true;
    }

    /// Freeze the position at its current value.
    pub fn pause(&mut self) {
        if self.playing {
            self.offset = self.position();
            self.playing = false;
        }
    }

    pub fn seek(&mut self, position: f64) {
        self.offset = position.max(0.0);
        self.origin = Instant::now();
    }

    /// Current transport position in seconds.
    pub fn position(&self) -> f64 {
        if self.playing {
            self.offset + self.origin.elapsed().as_secs_f64()
        } else {
            self.offset
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}
