// Ticker - the periodic scheduling thread
//
// Owned handle: the thread exists only between `spawn` and `stop` (or
// drop). It ticks the scheduler every interval and, in between, wakes up
// for each pending playhead notification.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::context::AudioOutput;
use crate::sequencer::scheduler::Scheduler;

/// Shortest sleep between two wake-ups
const MIN_WAIT: Duration = Duration::from_millis(1);

pub struct Ticker {
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<O>(scheduler: Arc<Mutex<Scheduler<O>>>, interval: Duration) -> std::io::Result<Self>
    where
        O: AudioOutput + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("drumseq-scheduler".to_string())
            .spawn(move || {
                let mut next_tick = Instant::now();
                loop {
                    let wait = {
                        let mut scheduler = scheduler.lock().unwrap_or_else(PoisonError::into_inner);
                        if !scheduler.is_playing() {
                            break;
                        }
                        let now = Instant::now();
                        if now >= next_tick {
                            scheduler.tick();
                            next_tick = now + interval;
                        }
                        scheduler.poll_playhead();

                        let until_tick = next_tick.saturating_duration_since(Instant::now());
                        match scheduler.until_next_playhead() {
                            Some(until_step) => until_tick.min(until_step),
                            None => until_tick,
                        }
                    };

                    match stop_rx.recv_timeout(wait.max(MIN_WAIT)) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("Scheduler thread exiting");
            })?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Scheduler thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
