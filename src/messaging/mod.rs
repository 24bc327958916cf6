// Messaging between the control thread and the audio callback

pub mod channels;
pub mod command;

pub use channels::{CommandConsumer, CommandProducer, create_command_channel};
pub use command::EngineCommand;
