// Communication channels lock-free

use crate::messaging::command::EngineCommand;
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<EngineCommand>;
pub type CommandConsumer = ringbuf::HeapCons<EngineCommand>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<EngineCommand>::new(capacity.max(1));
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::MixerParams;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_commands_arrive_in_order() {
        let (mut tx, mut rx) = create_command_channel(4);
        for channel in 0..3 {
            tx.try_push(EngineCommand::ApplyParams {
                channel,
                params: MixerParams::default(),
            })
            .unwrap();
        }

        let order: Vec<usize> = std::iter::from_fn(|| rx.try_pop())
            .map(|cmd| match cmd {
                EngineCommand::ApplyParams { channel, .. } => channel,
                _ => usize::MAX,
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_full_queue_hands_command_back() {
        let (mut tx, _rx) = create_command_channel(1);
        let params = MixerParams::default();
        assert!(tx
            .try_push(EngineCommand::ApplyParams { channel: 0, params })
            .is_ok());
        assert!(tx
            .try_push(EngineCommand::ApplyParams { channel: 1, params })
            .is_err());
    }
}
