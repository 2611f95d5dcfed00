use crate::cache::HistoryCache;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between two sweeps
    pub interval: Duration,
    /// Sessions untouched for longer than this are dropped from the cache
    pub max_idle: Duration,
    /// Wait before the next attempt after a failed sweep
    pub retry_backoff: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            max_idle: Duration::from_secs(60 * 60),
            retry_backoff: Duration::from_secs(60),
        }
    }
}

/// Periodically evicts idle sessions from the history cache.
///
/// Only the in-memory window is dropped; persisted history is untouched.
pub struct Sweeper {
    cache: Arc<HistoryCache>,
    config: SweeperConfig,
}

impl Sweeper {
    pub fn new(cache: Arc<HistoryCache>, config: SweeperConfig) -> Self {
        Self { cache, config }
    }

    /// One sweep at the current time. Returns how many sessions were evicted.
    pub async fn sweep_once(&self) -> usize {
        let evicted = self
            .cache
            .evict_idle(Instant::now(), self.config.max_idle)
            .await;
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "evicted idle sessions from history cache");
        }
        evicted.len()
    }

    pub async fn run(&self, shutdown: broadcast::Receiver<()>) {
        let cache = self.cache.clone();
        let max_idle = self.config.max_idle;
        self.run_with(shutdown, move || {
            let cache = cache.clone();
            async move { cache.evict_idle(Instant::now(), max_idle).await.len() }
        })
        .await
    }

    async fn run_with<F, Fut>(&self, mut shutdown: broadcast::Receiver<()>, sweep: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = usize> + Send + 'static,
    {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_idle_secs = self.config.max_idle.as_secs(),
            "history sweeper started"
        );

        let mut delay = self.config.interval;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("history sweeper shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    // Each sweep runs in its own task so a panic inside it
                    // cannot take the loop down with it.
                    match tokio::spawn(sweep()).await {
                        Ok(evicted) => {
                            if evicted > 0 {
                                info!(evicted, "evicted idle sessions from history cache");
                            }
                            delay = self.config.interval;
                        }
                        Err(err) => {
                            error!(error = %err, "history sweep failed, retrying");
                            delay = self.config.retry_backoff;
                        }
                    }
                }
            }
        }
    }

    /// Run the sweeper in the background until the handle is shut down.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(async move { self.run(rx).await });
        SweeperHandle { shutdown, task }
    }
}

pub struct SweeperHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            warn!(error = %err, "history sweeper task ended abnormally");
        }
    }
}
