//! Continuous-run mode: stepping the engine on a fixed cadence.
//!
//! The engine itself is single-threaded; this wrapper serializes `step()`
//! calls behind a mutex and drives them from a named background thread.
//! Event records are published to the observing collaborator over an mpsc
//! channel. Cancellation is cooperative: the run flag is checked between
//! ticks, so an in-flight tick always completes before a stop request is
//! honored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::types::EventRecord;
use crate::engine::{Snapshot, StepDriver};

pub struct AutoRunner {
    driver: Arc<Mutex<StepDriver>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AutoRunner {
    pub fn new(driver: StepDriver) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Shared handle to the driver, for snapshots from the observer side.
    /// The mutex serializes observation against the stepping thread.
    pub fn driver(&self) -> Arc<Mutex<StepDriver>> {
        Arc::clone(&self.driver)
    }

    /// Read-only snapshot of the engine between ticks.
    pub fn snapshot(&self) -> Snapshot {
        self.driver.lock().unwrap().current_state()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the stepping thread and return the record stream.
    ///
    /// The run ends when `stop()` is called, the receiver is dropped, or
    /// the engine reports an invariant violation (fatal: logged at error
    /// level, run halted).
    pub fn start(&mut self, interval: Duration) -> mpsc::Receiver<EventRecord> {
        if self.handle.is_some() {
            self.stop();
        }

        let (tx, rx) = mpsc::channel();
        let driver = Arc::clone(&self.driver);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("csma-sim-runner".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let result = driver.lock().unwrap().step();
                    match result {
                        Ok(record) => {
                            if tx.send(record).is_err() {
                                // Observer went away; nothing left to do.
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("halting continuous run: {}", e);
                            break;
                        }
                    }
                    thread::sleep(interval);
                }
                running.store(false, Ordering::SeqCst);
            })
            .expect("failed to spawn runner thread");

        self.handle = Some(handle);
        rx
    }

    /// Request a cooperative stop and wait for the thread to finish its
    /// in-flight tick.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutoRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Protocol;
    use std::time::Duration;

    fn driver() -> StepDriver {
        let names: Vec<String> = (1..=4).map(|n| format!("Device {}", n)).collect();
        StepDriver::with_defaults(Protocol::CsmaCd, &names, Some(17)).unwrap()
    }

    #[test]
    fn continuous_run_produces_consecutive_ticks() {
        let mut runner = AutoRunner::new(driver());
        let rx = runner.start(Duration::from_millis(1));

        let mut ticks = Vec::new();
        for _ in 0..5 {
            let record = rx.recv_timeout(Duration::from_secs(5)).expect("runner produced no record");
            ticks.push(record.tick);
        }
        runner.stop();
        assert_eq!(ticks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn stop_finishes_the_in_flight_tick_and_releases_the_driver() {
        let mut runner = AutoRunner::new(driver());
        let rx = runner.start(Duration::from_millis(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        runner.stop();
        assert!(!runner.is_running());

        // The driver is usable again once the thread has joined.
        let driver = runner.driver();
        let mut guard = driver.lock().unwrap();
        guard.step().unwrap();
    }

    #[test]
    fn dropping_the_receiver_ends_the_run() {
        let mut runner = AutoRunner::new(driver());
        let rx = runner.start(Duration::from_millis(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        drop(rx);

        // The thread notices the closed channel on its next send.
        for _ in 0..500 {
            if !runner.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!runner.is_running());
    }

    #[test]
    fn snapshot_is_available_between_ticks() {
        let mut runner = AutoRunner::new(driver());
        let rx = runner.start(Duration::from_millis(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let _ = runner.snapshot();
        runner.stop();
    }
}
