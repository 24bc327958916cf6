// Sequencer module
// Pattern timing, tracks, the lookahead scheduler and its transport

pub mod kit;
pub mod pattern;
pub mod scheduler;
pub mod sound_engine;
pub mod state;
pub mod ticker;
pub mod timeline;
pub mod track;

pub use pattern::Pattern;
pub use scheduler::{PlaybackState, PlayheadSink, Scheduler, SchedulerConfig};
pub use sound_engine::SoundEngine;
pub use state::{SequencerState, SharedState, StateSource};
pub use ticker::Ticker;
pub use timeline::{Tempo, TimeSignature};
pub use track::{Source, Track, TrackId};
