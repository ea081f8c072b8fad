//! Self-reconfiguring reload polling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ConfigResult;
use crate::task::Timer;

/// The path the poller watches when the caller does not name one.
pub const DEFAULT_FREQUENCY_PATH: &str = "proteus.poll-frequency";

static POLLER_SEQ: AtomicU64 = AtomicU64::new(0);

enum PollerCommand {
    Rearm(Duration),
    Shutdown,
}

/// Drives [`Config::reload`] on a cadence read from the config itself.
///
/// The polling frequency is a duration value inside the configuration, so
/// the poller observes its own frequency path: when any source or override
/// changes that value, the running timer is cancelled and a new one armed
/// with the new period. A zero or missing frequency leaves the poller
/// disarmed until the value changes again.
///
/// Timer ownership lives in a small actor task; the observer callback only
/// sends a re-arm command, so it never blocks inside the config lock.
pub struct Poller {
    config: Arc<Config>,
    observer_id: String,
    tx: mpsc::UnboundedSender<PollerCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
    frequency: Arc<Mutex<Duration>>,
}

impl Poller {
    /// Start polling, reading the frequency from `frequency_path`.
    ///
    /// # Errors
    ///
    /// Fails when the frequency path already carries an observer with this
    /// poller's id, which only happens if ids collide.
    pub fn spawn(config: Arc<Config>, frequency_path: &str) -> ConfigResult<Self> {
        let observer_id = format!("poller-{}", POLLER_SEQ.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let frequency = Arc::new(Mutex::new(Duration::ZERO));

        // Register the observer before reading the initial frequency so a
        // concurrent change is either seen directly or delivered as a
        // re-arm command; a change can at worst be applied twice.
        let observer_tx = tx.clone();
        config.add_observer(&observer_id, frequency_path, move |_, new| {
            let period = new.as_duration().unwrap_or(Duration::ZERO);
            let _ = observer_tx.send(PollerCommand::Rearm(period));
        })?;

        let initial = config.get_duration(frequency_path, Duration::ZERO);
        let handle = tokio::spawn(run_actor(config.clone(), initial, rx, frequency.clone()));
        info!(path = frequency_path, ?initial, "poller started");

        Ok(Self {
            config,
            observer_id,
            tx,
            handle: Mutex::new(Some(handle)),
            frequency,
        })
    }

    /// The period the poller is currently armed with; zero when disarmed.
    pub fn frequency(&self) -> Duration {
        *self.frequency.lock()
    }

    /// Whether a reload timer is currently armed.
    pub fn is_polling(&self) -> bool {
        self.frequency() > Duration::ZERO
    }

    /// Stop polling and wait for the actor to finish.
    pub async fn shutdown(&self) {
        self.config.remove_observer(&self.observer_id);
        let _ = self.tx.send(PollerCommand::Shutdown);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.config.remove_observer(&self.observer_id);
        let _ = self.tx.send(PollerCommand::Shutdown);
    }
}

async fn run_actor(
    config: Arc<Config>,
    initial: Duration,
    mut rx: mpsc::UnboundedReceiver<PollerCommand>,
    frequency: Arc<Mutex<Duration>>,
) {
    let mut timer: Option<Timer> = None;
    rearm(&config, initial, &mut timer, &frequency);

    while let Some(command) = rx.recv().await {
        match command {
            PollerCommand::Rearm(period) => {
                rearm(&config, period, &mut timer, &frequency);
            }
            PollerCommand::Shutdown => break,
        }
    }

    if let Some(timer) = timer.take() {
        timer.cancel().await;
    }
    *frequency.lock() = Duration::ZERO;
    debug!("poller stopped");
}

fn rearm(
    config: &Arc<Config>,
    period: Duration,
    timer: &mut Option<Timer>,
    frequency: &Arc<Mutex<Duration>>,
) {
    // Dropping the old timer nudges its task to stop without blocking the
    // actor on a mid-flight reload.
    drop(timer.take());
    if period > Duration::ZERO {
        let reload_config = config.clone();
        *timer = Some(Timer::recurring("poller", period, move || {
            let config = reload_config.clone();
            async move {
                if config.reload().await? {
                    debug!("poll applied new configuration");
                }
                Ok(())
            }
        }));
        debug!(?period, "poller armed");
    } else {
        debug!("poller disarmed");
    }
    *frequency.lock() = period;
}
