//! Periodic keep-alive for an authenticated client.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::client::VimApi;

/// Background task pinging the endpoint every `interval` until stopped.
/// Dropping the handle stops the task.
pub struct KeepAlive {
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Start the task. The first ping happens one interval from now, so it
    /// can be started before login.
    pub fn start(client: Arc<dyn VimApi>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_keepalive_loop(client, interval, shutdown_rx));
        Self {
            interval,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Signal the task and wait for it to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_keepalive_loop(
    client: Arc<dyn VimApi>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    log::debug!("Keep-alive for {} stopped", client.url());
                    break;
                }
            }

            _ = ticker.tick() => {
                if let Err(e) = client.keep_alive().await {
                    log::warn!("Keep-alive to {} failed: {}", client.url(), e);
                }
            }
        }
    }
}
