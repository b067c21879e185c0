//! Lap orchestration.
//!
//! A lap samples every configured family concurrently, normalizes counter
//! families, checks completeness and hands the resulting batch to the sinks:
//!
//! ```text
//!   spawn one task per family ──► spawn_blocking(sample) ─┐ (bounded by timeout)
//!                                                         ▼
//!                                  counter family? ──► RateNormalizer
//!                                                         │
//!   fan-in: exactly N (index, outcome) messages ◄─────────┘
//!        │
//!        ├─ one-shot: incomplete ─► sample again immediately (capped)
//!        └─ daemon:   drop incomplete families, emit, sleep interval
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::collector::{FileSystem, Family, SampleError, Sampler};
use crate::config::Config;
use crate::rates::{Normalized, RateNormalizer};
use crate::sink::Sink;
use crate::table::{Table, Value};

/// Granularity of the inter-lap sleep, so shutdown is noticed promptly.
const SLEEP_STEP: Duration = Duration::from_millis(100);

/// Result of one family in one lap.
#[derive(Debug)]
pub enum Outcome {
    /// Sampled and, for counter families, fully normalized.
    Ready(Table),
    /// Sampled, but some cells had no baseline yet.
    Incomplete(Table),
    /// The sample failed or timed out.
    Failed(SampleError),
}

impl Outcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }
}

/// All outcomes of one lap, in configured family order.
#[derive(Debug)]
pub struct LapReport {
    pub outcomes: Vec<(Family, Outcome)>,
}

impl LapReport {
    /// True when every family produced a fully normalized table.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_ready())
    }

    /// Families that did not produce an emittable table.
    pub fn pending(&self) -> Vec<Family> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_ready())
            .map(|(f, _)| *f)
            .collect()
    }

    /// The emittable tables, in configured family order.
    pub fn into_tables(self) -> Vec<Table> {
        self.outcomes
            .into_iter()
            .filter_map(|(_, outcome)| match outcome {
                Outcome::Ready(table) => Some(table),
                Outcome::Incomplete(_) | Outcome::Failed(_) => None,
            })
            .collect()
    }
}

/// Drives laps over a shared sampler, normalizer and set of sinks.
pub struct Orchestrator<F: FileSystem + 'static> {
    sampler: Arc<Sampler<F>>,
    normalizer: Arc<RateNormalizer>,
    families: Vec<Family>,
    /// One flag per configured family, set while its blocking read runs.
    in_flight: Vec<Arc<AtomicBool>>,
    interval: Duration,
    sample_timeout: Duration,
    max_retries: u32,
    daemon: bool,
    fqdn: Option<String>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl<F: FileSystem + 'static> Orchestrator<F> {
    /// Creates an orchestrator for a validated configuration.
    pub fn new(config: &Config, fs: F) -> Self {
        Self {
            sampler: Arc::new(Sampler::new(fs, &config.proc_path, &config.prefix)),
            normalizer: Arc::new(RateNormalizer::new(config.consistency_factor())),
            families: config.families.clone(),
            in_flight: config
                .families
                .iter()
                .map(|_| Arc::new(AtomicBool::new(false)))
                .collect(),
            interval: config.interval,
            sample_timeout: config.sample_timeout,
            max_retries: config.max_retries,
            daemon: config.daemon,
            fqdn: None,
            sinks: Vec::new(),
        }
    }

    /// Appends an `fqdn` column holding `fqdn` to every emitted row.
    pub fn with_fqdn(mut self, fqdn: impl Into<String>) -> Self {
        self.fqdn = Some(fqdn.into());
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn normalizer(&self) -> &RateNormalizer {
        &self.normalizer
    }

    /// Runs in the configured mode until done or until `running` is cleared.
    pub async fn run(&self, running: &AtomicBool) {
        if self.daemon {
            self.run_daemon(running).await;
        } else {
            let batch = self.collect_once().await;
            self.emit(&batch).await;
        }
    }

    /// Samples every family once, concurrently, and gathers the outcomes.
    pub async fn run_lap(&self) -> LapReport {
        let n = self.families.len();
        let (tx, mut rx) = mpsc::channel(n.max(1));

        for (index, &family) in self.families.iter().enumerate() {
            let tx = tx.clone();
            let sampler = Arc::clone(&self.sampler);
            let normalizer = Arc::clone(&self.normalizer);
            let busy = Arc::clone(&self.in_flight[index]);
            let timeout = self.sample_timeout;
            tokio::spawn(async move {
                let outcome = sample_family(sampler, normalizer, busy, family, timeout).await;
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Outcome>> = (0..n).map(|_| None).collect();
        for _ in 0..n {
            match rx.recv().await {
                Some((index, outcome)) => slots[index] = Some(outcome),
                // Every sender is gone: the remaining tasks died.
                None => break,
            }
        }

        let outcomes = self
            .families
            .iter()
            .zip(slots)
            .map(|(&family, slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    Outcome::Failed(SampleError::Aborted("task ended without reporting".into()))
                });
                match &outcome {
                    Outcome::Failed(e) => warn!(family = %family, error = %e, "sample failed"),
                    Outcome::Incomplete(t) => {
                        debug!(family = %family, rows = t.len(), "no baseline yet")
                    }
                    Outcome::Ready(_) => {}
                }
                (family, outcome)
            })
            .collect();

        LapReport { outcomes }
    }

    /// Runs laps until one is complete and returns its batch.
    ///
    /// Incomplete laps are re-run immediately. After `max_retries` re-runs
    /// the last lap's complete tables are returned as they are.
    pub async fn collect_once(&self) -> Vec<Table> {
        let mut retries = 0;
        loop {
            let lap = self.run_lap().await;
            if lap.is_complete() {
                debug!(retries, "lap complete");
                return self.finish(lap.into_tables());
            }
            if retries >= self.max_retries {
                let pending = lap.pending();
                warn!(
                    retries,
                    missing = ?pending.iter().map(|f| f.name()).collect::<Vec<_>>(),
                    "giving up on incomplete families"
                );
                return self.finish(lap.into_tables());
            }
            retries += 1;
        }
    }

    /// Emits the complete part of every lap until `running` is cleared.
    pub async fn run_daemon(&self, running: &AtomicBool) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            families = self.families.len(),
            "daemon started"
        );

        while running.load(Ordering::SeqCst) {
            let lap = self.run_lap().await;
            let batch = self.finish(lap.into_tables());
            if batch.is_empty() {
                debug!("nothing complete this lap");
            } else {
                self.emit(&batch).await;
            }

            let mut remaining = self.interval;
            while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
                let sleep_time = remaining.min(SLEEP_STEP);
                tokio::time::sleep(sleep_time).await;
                remaining = remaining.saturating_sub(sleep_time);
            }
        }

        info!("daemon stopped");
    }

    /// Sends a batch to every sink. Failures are logged and not retried.
    pub async fn emit(&self, batch: &[Table]) {
        for sink in &self.sinks {
            match sink.write(batch).await {
                Ok(()) => debug!(sink = sink.name(), tables = batch.len(), "emitted"),
                Err(e) => error!(sink = sink.name(), error = %e, "failed to emit batch"),
            }
        }
    }

    fn finish(&self, mut tables: Vec<Table>) -> Vec<Table> {
        if let Some(fqdn) = &self.fqdn {
            for table in &mut tables {
                table.append_column("fqdn", Value::Text(fqdn.clone()));
            }
        }
        tables
    }
}

/// Clears a family's in-flight flag when its blocking read ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Samples one family off the async threads and normalizes counters.
async fn sample_family<F: FileSystem + 'static>(
    sampler: Arc<Sampler<F>>,
    normalizer: Arc<RateNormalizer>,
    busy: Arc<AtomicBool>,
    family: Family,
    timeout: Duration,
) -> Outcome {
    // A read that timed out in an earlier lap may still hold a blocking
    // thread. Never stack a second one behind it.
    if busy.swap(true, Ordering::SeqCst) {
        debug!(family = %family, "previous read still running");
        return Outcome::Failed(SampleError::Timeout(timeout));
    }
    let guard = InFlight(busy);
    let read = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        sampler.sample(family)
    });

    // On timeout the blocking read is left to finish on its own; its result
    // is dropped and never reaches the normalizer.
    let table = match tokio::time::timeout(timeout, read).await {
        Err(_) => return Outcome::Failed(SampleError::Timeout(timeout)),
        Ok(Err(join)) => return Outcome::Failed(SampleError::Aborted(join.to_string())),
        Ok(Ok(Err(e))) => return Outcome::Failed(e),
        Ok(Ok(Ok(table))) => table,
    };

    if !family.is_counter() {
        return Outcome::Ready(table);
    }
    match normalizer.normalize(table) {
        Normalized::Complete(table) => Outcome::Ready(table),
        Normalized::Incomplete(table) => Outcome::Incomplete(table),
    }
}
