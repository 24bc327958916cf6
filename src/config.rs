// Engine configuration, loaded from JSON
//
// Every section has defaults, so a partial file (or `{}`) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::export::ExportSettings;
use crate::sequencer::scheduler::SchedulerConfig;
use crate::synth::reverb::{DEFAULT_IMPULSE_DECAY, DEFAULT_IMPULSE_SECONDS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shape of the generated reverb impulse response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Impulse length in seconds
    pub seconds: f32,
    /// Decay exponent of the noise tail
    pub decay: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_IMPULSE_SECONDS,
            decay: DEFAULT_IMPULSE_DECAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub reverb: ReverbConfig,
    pub export: ExportSettings,
    /// Seed for live voice noise; None draws from entropy
    pub noise_seed: Option<u64>,
    /// Slots in the control to audio thread queue
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            reverb: ReverbConfig::default(),
            export: ExportSettings::default(),
            noise_seed: None,
            command_queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.lookahead_sec, 0.1);
        assert_eq!(config.scheduler.tick_interval_ms, 50);
        assert_eq!(config.scheduler.start_offset_sec, 0.05);
        assert_eq!(config.reverb.seconds, 1.5);
        assert_eq!(config.reverb.decay, 0.5);
        assert_eq!(config.command_queue_capacity, 1024);
        assert_eq!(config.export.sample_rate, 44100);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{ "scheduler": { "lookahead_sec": 0.2 }, "export": { "noise_seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.lookahead_sec, 0.2);
        assert_eq!(config.scheduler.tick_interval_ms, 50);
        assert_eq!(config.export.noise_seed, Some(7));
        assert_eq!(config.export.tail_seconds, 1.0);
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drumseq.json");
        let config = EngineConfig {
            noise_seed: Some(42),
            ..EngineConfig::default()
        };
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            EngineConfig::from_json_str("not json"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            EngineConfig::load(Path::new("/nonexistent/drumseq.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
