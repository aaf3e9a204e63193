// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Single-slot background jobs.
//!
//! A [`JobSlot`] runs at most one job at a time off the UI thread and hands
//! the result back through a channel that the owner polls once per frame.
//! Submitting while a job is in flight is refused rather than queued.

use std::sync::mpsc::{channel, Receiver, TryRecvError};
#[cfg(any(test, feature = "video-opencv"))]
use std::thread::JoinHandle;
#[cfg(any(test, feature = "video-opencv"))]
use std::time::{Duration, Instant};

/// Where submitted jobs execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Spawn a background thread per job.
    Thread,
    /// Run the job synchronously during `submit`.
    #[cfg(test)]
    Inline,
}

pub struct JobSlot<T> {
    dispatch: Dispatch,
    in_flight: Option<Receiver<T>>,
}

impl<T: Send + 'static> JobSlot<T> {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start `job` unless one is already running. Returns whether it started.
    pub fn submit<F>(&mut self, job: F) -> bool
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_busy() {
            return false;
        }

        let (sender, receiver) = channel();
        match self.dispatch {
            Dispatch::Thread => {
                std::thread::spawn(move || {
                    // The receiver is gone if the job was cancelled.
                    let _ = sender.send(job());
                });
            }
            #[cfg(test)]
            Dispatch::Inline => {
                let _ = sender.send(job());
            }
        }
        self.in_flight = Some(receiver);
        true
    }

    /// Take the finished result, if any. Never blocks.
    pub fn poll(&mut self) -> Option<T> {
        let receiver = self.in_flight.as_ref()?;
        match receiver.try_recv() {
            Ok(result) => {
                self.in_flight = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // Worker panicked without producing a result.
                log::error!("Background job terminated without a result");
                self.in_flight = None;
                None
            }
        }
    }

    /// Forget the in-flight job; its result will be discarded.
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }
}

/// Wait up to `timeout` for a worker thread to exit and join it. Returns
/// `false` and detaches the thread if it is still running by then.
#[cfg(any(test, feature = "video-opencv"))]
pub fn join_within(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    if handle.join().is_err() {
        log::error!("Worker thread panicked");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_inline_job_is_ready_immediately() {
        let mut slot = JobSlot::new(Dispatch::Inline);
        assert!(slot.submit(|| 7));
        assert!(slot.is_busy());
        assert!(!slot.submit(|| 8), "second job must be refused while busy");
        assert_eq!(slot.poll(), Some(7));
        assert!(!slot.is_busy());
        assert_eq!(slot.poll(), None);
    }

    #[test]
    fn test_thread_job_completes() {
        let mut slot = JobSlot::new(Dispatch::Thread);
        assert!(slot.submit(|| "done"));

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            if let Some(result) = slot.poll() {
                break result;
            }
            assert!(Instant::now() < deadline, "job did not finish");
            std::thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(result, "done");
    }

    #[test]
    fn test_cancel_discards_result() {
        let mut slot = JobSlot::new(Dispatch::Inline);
        slot.submit(|| 1);
        slot.cancel();
        assert!(!slot.is_busy());
        assert_eq!(slot.poll(), None);
        assert!(slot.submit(|| 2));
        assert_eq!(slot.poll(), Some(2));
    }

    #[test]
    fn test_join_within_returns_for_finished_worker() {
        let handle = std::thread::spawn(|| {});
        assert!(join_within(handle, Duration::from_secs(5)));
    }

    #[test]
    fn test_join_within_detaches_stuck_worker() {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        let started = Instant::now();
        assert!(!join_within(handle, Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(5));
        stop.store(true, Ordering::Relaxed);
    }
}
