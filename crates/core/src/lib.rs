pub mod service;

pub use service::AudioService;

pub use tracklab_capture::{CaptureError, input_devices};
pub use tracklab_decode::{BufferCache, ClipSource, FsSource, decode_bytes, decode_file};
pub use tracklab_render::{encode_wav, export_project, normalize_wav};
pub use tracklab_transport::{
    AudioClip, AudioEffect, DecodedAudio, EffectKind, Project, Track, TrackId, TransportClock,
};
