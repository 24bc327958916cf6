// Commandes - Communication contrôle → Audio

use crate::audio::render::Trigger;
use crate::mixer::{ChannelGraph, MixerParams};

/// Messages consumed by the audio callback at the start of each buffer
pub enum EngineCommand {
    /// Queue a sound at its absolute time
    Trigger(Trigger),
    /// Swap the whole channel set (graphs are built off the audio thread)
    ReplaceChannels(Vec<ChannelGraph>),
    ApplyParams {
        channel: usize,
        params: MixerParams,
    },
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Trigger(trigger) => f
                .debug_struct("Trigger")
                .field("channel", &trigger.channel)
                .field("time", &trigger.time)
                .finish(),
            EngineCommand::ReplaceChannels(channels) => {
                write!(f, "ReplaceChannels({})", channels.len())
            }
            EngineCommand::ApplyParams { channel, params } => f
                .debug_struct("ApplyParams")
                .field("channel", channel)
                .field("params", params)
                .finish(),
        }
    }
}
