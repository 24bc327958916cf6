// Sound engine - transport control over the scheduler and its ticker thread
//
// The scheduler sits behind a mutex shared with the ticker thread. Start
// and stop run on the caller's thread; the ticker only ever calls `tick`
// and `poll_playhead`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::audio::context::AudioOutput;
use crate::audio::engine::EngineResult;
use crate::audio::parameters::PeakMeter;
use crate::sequencer::scheduler::Scheduler;
use crate::sequencer::ticker::Ticker;

pub struct SoundEngine<O: AudioOutput + 'static> {
    scheduler: Arc<Mutex<Scheduler<O>>>,
    ticker: Option<Ticker>,
    tick_interval: Duration,
}

impl<O: AudioOutput + 'static> SoundEngine<O> {
    pub fn new(scheduler: Scheduler<O>) -> Self {
        let tick_interval = scheduler.config().tick_interval();
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            ticker: None,
            tick_interval,
        }
    }

    /// Start (or restart) playback from step 0 and spawn the ticker
    pub fn start(&mut self) -> EngineResult<()> {
        self.stop_ticker();
        self.lock().start()?;
        let ticker = Ticker::spawn(Arc::clone(&self.scheduler), self.tick_interval)?;
        self.ticker = Some(ticker);
        Ok(())
    }

    /// Stop the ticker, then the scheduler. Safe to call when idle.
    pub fn stop(&mut self) {
        self.stop_ticker();
        self.lock().stop();
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn meters(&self) -> Vec<PeakMeter> {
        self.lock().meters()
    }

    /// Direct access to the scheduler, e.g. to drive a headless output
    pub fn scheduler(&self) -> MutexGuard<'_, Scheduler<O>> {
        self.lock()
    }

    pub fn with_scheduler<R>(&self, f: impl FnOnce(&mut Scheduler<O>) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Scheduler<O>> {
        self.scheduler.lock().unwrap_or_else(|poisoned| {
            log::warn!("Scheduler lock poisoned, recovering");
            self.scheduler.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

impl<O: AudioOutput + 'static> Drop for SoundEngine<O> {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::context::HeadlessOutput;
    use crate::sequencer::kit;
    use crate::sequencer::scheduler::SchedulerConfig;
    use crate::sequencer::state::SharedState;
    use crate::synth::noise::NoiseGenerator;
    use crate::synth::reverb::ImpulseResponse;
    use crate::synth::voice::VoiceSynthesizer;
    use std::sync::mpsc;

    fn engine(playhead: mpsc::Sender<Option<usize>>) -> SoundEngine<HeadlessOutput> {
        let mut noise = NoiseGenerator::seeded(11);
        let impulse = Arc::new(ImpulseResponse::generate(44100, 0.1, 0.5, &mut noise));
        let output = HeadlessOutput::new(44100, impulse);
        let state = SharedState::new(kit::default_state());
        let config = SchedulerConfig {
            tick_interval_ms: 5,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(
            output,
            Arc::new(state),
            Box::new(playhead),
            VoiceSynthesizer::new(44100, noise),
            config,
        );
        SoundEngine::new(scheduler)
    }

    #[test]
    fn test_start_and_stop() {
        let (tx, rx) = mpsc::channel();
        let mut engine = engine(tx);
        assert!(!engine.is_playing());
        assert_eq!(engine.tick_interval(), Duration::from_millis(5));

        engine.start().unwrap();
        assert!(engine.is_playing());
        assert!(engine.scheduler().output().is_resumed());
        assert_eq!(engine.meters().len(), 6);

        engine.stop();
        assert!(!engine.is_playing());
        // The last notification is always the stop marker
        let last = rx.try_iter().last();
        assert_eq!(last, Some(None));
    }

    #[test]
    fn test_ticker_delivers_playhead() {
        let (tx, rx) = mpsc::channel();
        let mut engine = engine(tx);
        engine.start().unwrap();

        // Headless clock: move it past the first step at 0.05 s
        engine.with_scheduler(|s| s.output_mut().render_seconds(0.1));

        let step = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(step, Some(0));
        engine.stop();
    }

    #[test]
    fn test_stop_when_idle() {
        let (tx, rx) = mpsc::channel();
        let mut engine = engine(tx);
        engine.stop();
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[test]
    fn test_restart_resets_step_counter() {
        let (tx, _rx) = mpsc::channel();
        let mut engine = engine(tx);
        engine.start().unwrap();
        engine.with_scheduler(|s| s.output_mut().render_seconds(0.5));
        engine.start().unwrap();
        // Restart schedules only what fits the first lookahead window again
        assert!(engine.scheduler().current_step() <= 2);
        engine.stop();
    }
}
