pub mod loader;

pub use loader::{DecodeError, SampleDecoder, SymphoniaDecoder, load_sample_file, resample};
