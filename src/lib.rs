// drumseq - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod messaging;
pub mod mixer;
pub mod sampler;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::context::{AudioOutput, HeadlessOutput};
pub use audio::engine::{EngineError, EngineResult, OutputStream, RealtimeOutput, open_default_output};
pub use audio::export::{ExportError, ExportResult, ExportSettings, PatternExporter};
pub use config::{ConfigError, EngineConfig};
pub use mixer::{ChannelGraph, Mixer, MixerParams};
pub use sequencer::{
    Pattern, Scheduler, SchedulerConfig, SequencerState, SharedState, SoundEngine, Tempo,
    TimeSignature, Track,
};
pub use synth::voice::{VoiceKind, VoiceParams, VoiceSynthesizer};
