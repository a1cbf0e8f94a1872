//! Background asset loads
//!
//! Each request runs on its own worker thread and reports a single
//! outcome over a channel. The frame loop polls without blocking.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::{anyhow, Result};

/// Handle to an in-flight load
pub struct PendingLoad<T> {
    label: String,
    receiver: Option<Receiver<Result<T>>>,
}

impl<T: Send + 'static> PendingLoad<T> {
    /// Start `load` on a worker thread
    pub fn spawn<F>(label: impl Into<String>, load: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = mpsc::channel();

        let thread_label = label.clone();
        let spawned = thread::Builder::new()
            .name(format!("load:{}", label))
            .spawn(move || {
                let outcome = load();
                if tx.send(outcome).is_err() {
                    log::debug!("Load {} finished after its handle was dropped", thread_label);
                }
            });

        match spawned {
            Ok(_) => Self {
                label,
                receiver: Some(rx),
            },
            Err(e) => {
                // Deliver the spawn failure through the same path as a load failure
                let (tx, rx) = mpsc::channel();
                let _ = tx.send(Err(anyhow!("failed to spawn loader thread: {}", e)));
                Self {
                    label,
                    receiver: Some(rx),
                }
            }
        }
    }
}

impl<T> PendingLoad<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True until the outcome has been taken
    pub fn is_pending(&self) -> bool {
        self.receiver.is_some()
    }

    /// Take the outcome if it has arrived; yields `Some` at most once
    pub fn poll(&mut self) -> Option<Result<T>> {
        let receiver = self.receiver.as_ref()?;
        match receiver.try_recv() {
            Ok(outcome) => {
                self.receiver = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.receiver = None;
                Some(Err(anyhow!("loader for {} exited without a result", self.label)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn poll_until<T>(load: &mut PendingLoad<T>) -> Result<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = load.poll() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "load {} never finished", load.label());
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_poll_yields_once() {
        let mut load = PendingLoad::spawn("answer", || Ok(42));
        assert_eq!(poll_until(&mut load).unwrap(), 42);
        assert!(!load.is_pending());
        assert!(load.poll().is_none());
        assert!(load.poll().is_none());
    }

    #[test]
    fn test_failure_is_delivered() {
        let mut load: PendingLoad<u32> = PendingLoad::spawn("broken", || Err(anyhow!("no such file")));
        let err = poll_until(&mut load).unwrap_err();
        assert!(err.to_string().contains("no such file"));
        assert!(load.poll().is_none());
    }

    #[test]
    fn test_panicking_loader_reports_disconnect() {
        let mut load: PendingLoad<u32> = PendingLoad::spawn("panics", || panic!("decoder crashed"));
        let err = poll_until(&mut load).unwrap_err();
        assert!(err.to_string().contains("panics"));
    }
}
