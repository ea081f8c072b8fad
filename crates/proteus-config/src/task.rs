//! Recurring and one-shot background timers.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::ConfigResult;

/// A background timer driving an async closure.
///
/// A recurring timer invokes its closure every `delay` until cancelled; a
/// one-shot timer invokes it once after `delay` and then stops on its own.
/// Closure errors are logged and do not stop a recurring timer. Cleanup
/// (clearing the running flag) happens exactly once, whether the timer is
/// cancelled, finishes its single shot, or is dropped.
pub struct Timer {
    name: String,
    delay: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Spawn a timer invoking `func` every `delay`.
    pub fn recurring<F, Fut>(name: impl Into<String>, delay: Duration, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConfigResult<()>> + Send + 'static,
    {
        Self::spawn(name.into(), delay, func, true)
    }

    /// Spawn a timer invoking `func` once after `delay`.
    pub fn once<F, Fut>(name: impl Into<String>, delay: Duration, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConfigResult<()>> + Send + 'static,
    {
        Self::spawn(name.into(), delay, func, false)
    }

    fn spawn<F, Fut>(name: String, delay: Duration, func: F, repeat: bool) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConfigResult<()>> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task_name = name.clone();
        let task_running = running.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(delay);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; consume it so the first
            // invocation happens after one full delay.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(error) = func().await {
                            warn!(timer = %task_name, %error, "timer invocation failed");
                        }
                        if !repeat {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            task_running.store(false, Ordering::SeqCst);
            debug!(timer = %task_name, "timer stopped");
        });

        Self {
            name,
            delay,
            running,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// The timer's name, used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured delay between invocations.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the timer's task is still live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the timer and wait for its task to finish.
    ///
    /// Only the first caller performs the shutdown; later calls return
    /// immediately.
    pub async fn cancel(&self) {
        let Some(tx) = self.shutdown_tx.lock().take() else {
            return;
        };
        // The task may already have exited on its own; a failed send is fine.
        let _ = tx.send(()).await;
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        // Best effort: nudge the task to stop without waiting for it.
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.try_send(());
        }
    }
}
