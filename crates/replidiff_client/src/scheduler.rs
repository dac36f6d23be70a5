//! Periodic sync scheduling.

use crate::engine::SyncClient;
use crate::store::LocalStore;
use crate::transport::SyncTransport;
use replidiff_protocol::Record;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Runs sync cycles on a fixed delay until stopped.
///
/// Each iteration runs one `sync()` to completion, sleeps the interval,
/// then repeats; invocations never overlap. Failed cycles are logged
/// and retried on the next tick, which is exactly the protocol's
/// recovery mechanism: still-pending edits ride the next message.
///
/// Dropping the scheduler stops the loop and joins the thread.
pub struct SyncScheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Starts a scheduler driving the given client at its configured
    /// sync interval.
    pub fn start<T, Tr, St>(client: Arc<SyncClient<T, Tr, St>>) -> Self
    where
        T: Record + Send + Sync + 'static,
        Tr: SyncTransport + 'static,
        St: LocalStore<T> + 'static,
    {
        let interval = client.config().sync_interval;
        Self::start_with_interval(client, interval)
    }

    /// Starts a scheduler with an explicit interval.
    pub fn start_with_interval<T, Tr, St>(
        client: Arc<SyncClient<T, Tr, St>>,
        interval: Duration,
    ) -> Self
    where
        T: Record + Send + Sync + 'static,
        Tr: SyncTransport + 'static,
        St: LocalStore<T> + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                if let Err(err) = client.sync() {
                    debug!("periodic sync cycle failed: {err}");
                }
                sleep_interruptible(&flag, interval);
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Returns true while the loop is running.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    /// Stops the loop and waits for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleeps up to `interval`, waking early when the stop flag is set.
fn sleep_interruptible(stop: &AtomicBool, interval: Duration) {
    let step = Duration::from_millis(10);
    let mut remaining = interval;
    while !stop.load(Ordering::SeqCst) && remaining > Duration::ZERO {
        let slice = remaining.min(step);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
