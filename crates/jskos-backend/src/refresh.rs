//! Background refresh of the scheme index.
//!
//! Each cycle asks every registry for its schemes concurrently, each call
//! bounded by the registry timeout. Failed registries are reported and
//! skipped; if none answered, the cycle publishes nothing and the previous
//! snapshot stays in place. There is no backoff: the next tick is the retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use jskos_core::{defaults, Error, Result};

use crate::binding::RegistryBinding;
use crate::config::BackendConfig;
use crate::index::SchemeIndex;
use crate::merge::merge;

/// Timing and limits for the refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
    /// Upper bound for each `list_schemes` call.
    pub timeout: Duration,
    /// `limit` passed to `list_schemes`.
    pub limit: usize,
}

impl RefreshConfig {
    /// `tokio::time::interval` panics on a zero period, so both durations
    /// must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Config("refresh interval must be positive".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("registry timeout must be positive".into()));
        }
        Ok(())
    }
}

impl From<&BackendConfig> for RefreshConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            interval: config.refresh_interval,
            timeout: config.registry_timeout,
            limit: config.scheme_limit,
        }
    }
}

/// Event emitted by the refresh loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    /// Loop started.
    Started,
    /// A snapshot was published.
    Published { scheme_count: usize, failed: usize },
    /// Some registries failed; the others were published.
    PartialFailure { failed: Vec<String> },
    /// Every registry failed; nothing was published.
    TotalFailure { error: String },
    /// A cycle published again after a total failure, with some
    /// registries still failing.
    Resumed,
    /// A cycle succeeded for every registry after failures.
    Recovered,
    /// Loop stopped.
    Stopped,
}

/// Outcome of a cycle that published.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub scheme_count: usize,
    /// `(base, error)` for each registry that failed.
    pub failed: Vec<(String, String)>,
    pub duration_ms: u64,
}

/// Handle for controlling a running refresh loop.
pub struct RefreshHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<RefreshEvent>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the loop and wait until it has exited. A cycle in progress is
    /// abandoned.
    pub async fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Refresh loop already gone");
        }
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Refresh task failed: {}", e)))
    }

    /// Get a receiver for refresh events.
    pub fn events(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_rx.resubscribe()
    }
}

/// Periodically rebuilds the scheme index from all registries.
pub struct RefreshLoop {
    bindings: Vec<Arc<RegistryBinding>>,
    index: SchemeIndex,
    config: RefreshConfig,
    event_tx: broadcast::Sender<RefreshEvent>,
}

impl RefreshLoop {
    /// Create a loop over `bindings`, given in priority order.
    pub fn new(bindings: Vec<Arc<RegistryBinding>>, index: SchemeIndex, config: RefreshConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            bindings,
            index,
            config,
            event_tx,
        }
    }

    /// Get a receiver for refresh events. Subscribe before [`start`] to
    /// see the first cycle.
    ///
    /// [`start`]: RefreshLoop::start
    pub fn events(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_tx.subscribe()
    }

    /// Run one cycle: list, merge, publish.
    ///
    /// Returns [`Error::RefreshFailed`] without publishing when every
    /// registry failed.
    #[instrument(skip(self), fields(subsystem = "backend", component = "refresh", op = "cycle"))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let start = Instant::now();

        let results = join_all(self.bindings.iter().map(|binding| async move {
            let listed = binding
                .bounded(self.config.timeout, binding.client.list_schemes(self.config.limit))
                .await;
            (binding.clone(), listed)
        }))
        .await;

        let mut listings = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (binding, listed) in results {
            match listed {
                Ok(schemes) => {
                    debug!(registry = %binding.base(), scheme_count = schemes.len(), "Listed schemes");
                    listings.push((binding, schemes));
                }
                Err(e) => {
                    warn!(registry = %binding.base(), error = %e, "Registry failed to list schemes");
                    failed.push((binding.base().to_string(), e.to_string()));
                }
            }
        }

        if listings.is_empty() {
            let summary = failed
                .iter()
                .map(|(base, e)| format!("{base}: {e}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::RefreshFailed(if summary.is_empty() {
                "no registry configured".to_string()
            } else {
                summary
            }));
        }

        let snapshot = self.index.publish(merge(listings));
        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            scheme_count = snapshot.len(),
            failed_count = failed.len(),
            duration_ms,
            "Published scheme index"
        );

        Ok(CycleReport {
            scheme_count: snapshot.len(),
            failed,
            duration_ms,
        })
    }

    /// Start the loop and return a handle for control.
    pub fn start(self) -> Result<RefreshHandle> {
        self.config.validate()?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        Ok(RefreshHandle {
            shutdown_tx,
            event_rx,
            task,
        })
    }

    /// Cycle immediately, then once per interval, until shut down.
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            registries = self.bindings.len(),
            interval_secs = self.config.interval.as_secs(),
            "Refresh loop started"
        );
        let _ = self.event_tx.send(RefreshEvent::Started);

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut erroring = false;
        let mut stale = false;
        let mut loaded = false;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                outcome = self.run_cycle() => outcome,
            };

            match outcome {
                Ok(report) => {
                    if !report.failed.is_empty() {
                        warn!(
                            failed_count = report.failed.len(),
                            scheme_count = report.scheme_count,
                            "Partial refresh failure"
                        );
                        let _ = self.event_tx.send(RefreshEvent::PartialFailure {
                            failed: report.failed.iter().map(|(base, _)| base.clone()).collect(),
                        });
                    }
                    if !loaded {
                        info!("Loaded {} schemes", report.scheme_count);
                        loaded = true;
                    }
                    let _ = self.event_tx.send(RefreshEvent::Published {
                        scheme_count: report.scheme_count,
                        failed: report.failed.len(),
                    });
                    if stale && !report.failed.is_empty() {
                        info!(
                            scheme_count = report.scheme_count,
                            failed_count = report.failed.len(),
                            "Refresh publishing again"
                        );
                        let _ = self.event_tx.send(RefreshEvent::Resumed);
                    }
                    if report.failed.is_empty() && erroring {
                        info!(
                            scheme_count = report.scheme_count,
                            duration_ms = report.duration_ms,
                            "Refresh recovered"
                        );
                        let _ = self.event_tx.send(RefreshEvent::Recovered);
                    }
                    erroring = !report.failed.is_empty();
                    stale = false;
                }
                Err(e) => {
                    error!(error = %e, "Refresh failed, keeping previous schemes");
                    let error = match e {
                        Error::RefreshFailed(summary) => summary,
                        other => other.to_string(),
                    };
                    let _ = self.event_tx.send(RefreshEvent::TotalFailure { error });
                    erroring = true;
                    stale = true;
                }
            }
        }

        let _ = self.event_tx.send(RefreshEvent::Stopped);
        info!("Refresh loop stopped");
    }
}
