//! The driver-side dispatch loop: a fixed-cadence timer that launches a
//! burst of concurrent GET requests against the configured target on
//! every tick.
//!
//! Ticks are never throttled by in-flight work; the number of sends
//! actually on the wire at once is capped by a semaphore sized from
//! `max_inflight`. Attempts are counted at launch, so the send counter
//! advances by exactly `request_count` per tick no matter how the
//! network behaves.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DriverConfig;
use crate::metrics::DriverMetrics;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Dispatcher {
    cfg: DriverConfig,
    metrics: Arc<DriverMetrics>,
    client: reqwest::Client,
    source: String,
    inflight: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(cfg: DriverConfig, metrics: Arc<DriverMetrics>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let inflight = Arc::new(Semaphore::new(cfg.max_inflight.max(1)));
        Ok(Self {
            source: source_hostname(),
            cfg,
            metrics,
            client,
            inflight,
        })
    }

    /// The `source` label this dispatcher attaches to every request.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs the tick loop until `cancel` fires.
    ///
    /// With a disabled config (zero burst or interval) this logs once
    /// and returns without starting a timer; the process stays up
    /// serving probes and metrics. Cancellation stops the loop at the
    /// next tick wait without joining in-flight sends.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Err(e) = self.cfg.validate_dispatch() {
            error!(error = %e, "invalid request config");
            return;
        }

        info!(
            target_url = %self.cfg.target_url,
            interval_ms = self.cfg.request_interval_ms,
            burst = self.cfg.request_count,
            mode = %self.cfg.mode,
            "starting dispatch loop"
        );

        // First fire at t = period, no tick at t = 0, and no catch-up
        // bursts after a stall.
        let period = self.cfg.tick_period();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopping dispatch loop");
                    return;
                }
                _ = ticker.tick() => {
                    for _ in 0..self.cfg.request_count {
                        self.spawn_send(cancel.clone());
                    }
                }
            }
        }
    }

    fn spawn_send(&self, cancel: CancellationToken) {
        let client = self.client.clone();
        let metrics = Arc::clone(&self.metrics);
        let target_url = self.cfg.target_url.clone();
        let mode = self.cfg.mode.clone();
        let source = self.source.clone();
        let inflight = Arc::clone(&self.inflight);

        tokio::spawn(async move {
            // Counted at launch: attempts, not successes.
            metrics.inc_send(&source);

            let _permit = match inflight.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            info!(url = %target_url, %source, %mode, "sending load request");
            let request = client
                .get(&target_url)
                .query(&[("source", source.as_str()), ("mode", mode.as_str())])
                .send();

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("send cancelled");
                }
                result = request => match result {
                    Ok(response) => {
                        // Any status counts as a completed send; there
                        // is no status-code branching.
                        info!(status = %response.status(), "request completed");
                        let _ = response.bytes().await;
                    }
                    Err(e) => error!(error = %e, "request failed"),
                },
            }
        });
    }
}

/// Host identity attached to every outgoing request as the `source`
/// label. Kubernetes sets `HOSTNAME` in every pod.
fn source_hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(interval_ms: u64, count: u32) -> DriverConfig {
        DriverConfig {
            http_port: 0,
            // port 9 is discard; nothing listens there in tests
            target_url: "http://127.0.0.1:9/api/load".to_string(),
            request_interval_ms: interval_ms,
            request_count: count,
            mode: "smoke".to_string(),
            max_inflight: 8,
        }
    }

    #[tokio::test]
    async fn disabled_config_returns_without_ticking() {
        let metrics = Arc::new(DriverMetrics::new().unwrap());
        let dispatcher = Dispatcher::new(test_config(0, 3), Arc::clone(&metrics)).unwrap();

        time::timeout(Duration::from_millis(100), dispatcher.run(CancellationToken::new()))
            .await
            .expect("run should return immediately for a disabled config");
        assert_eq!(metrics.send_count(dispatcher.source()), 0);
    }

    #[tokio::test]
    async fn zero_burst_returns_without_ticking() {
        let metrics = Arc::new(DriverMetrics::new().unwrap());
        let dispatcher = Dispatcher::new(test_config(50, 0), Arc::clone(&metrics)).unwrap();

        time::timeout(Duration::from_millis(100), dispatcher.run(CancellationToken::new()))
            .await
            .expect("run should return immediately for a zero burst");
        assert_eq!(metrics.send_count(dispatcher.source()), 0);
    }

    #[tokio::test]
    async fn cancellation_before_first_tick_sends_nothing() {
        let metrics = Arc::new(DriverMetrics::new().unwrap());
        let dispatcher = Dispatcher::new(test_config(60_000, 2), Arc::clone(&metrics)).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        time::timeout(Duration::from_millis(100), dispatcher.run(cancel))
            .await
            .expect("cancelled run should return promptly");
        assert_eq!(metrics.send_count(dispatcher.source()), 0);
    }

    #[tokio::test]
    async fn attempts_are_counted_even_when_target_is_down() {
        let metrics = Arc::new(DriverMetrics::new().unwrap());
        let dispatcher =
            Arc::new(Dispatcher::new(test_config(100, 2), Arc::clone(&metrics)).unwrap());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            let cancel = cancel.clone();
            async move { dispatcher.run(cancel).await }
        });

        time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
        handle.await.unwrap();

        // let the spawned send tasks reach their counter increment
        time::sleep(Duration::from_millis(20)).await;
        // ticks at ~100ms and ~200ms before the 250ms cancel
        assert_eq!(metrics.send_count(dispatcher.source()), 4);
    }
}
