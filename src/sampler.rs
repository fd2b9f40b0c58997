//! The sampling loop.
//!
//! Each tick captures the process table, links it into a tree, selects the
//! subtree of interest and diffs it against the previous tick's selection.
//! The loop owns the previous selection exclusively. It stops when the shared
//! [`StopSignal`] fires, then flushes every still-tracked process as ended.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

use crate::aggregate::{Aggregator, Summary};
use crate::diff::{diff, Identity, Transition};
use crate::process::{snapshot_from_raw, CaptureError, ProcessTableSource, Snapshot, SubtreeSelector};

/// Why sampling stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The launched command exited with this status code, if it had one.
    CommandExited(Option<i32>),
    /// SIGINT / Ctrl+C.
    Interrupted,
    /// SIGTERM.
    Terminated,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CommandExited(Some(code)) => write!(f, "command exited with status {code}"),
            StopReason::CommandExited(None) => write!(f, "command terminated by a signal"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::Terminated => write!(f, "terminated"),
        }
    }
}

/// One-shot stop trigger shared by the completion watcher, the signal
/// handler and the sampler. The first trigger wins; later ones are ignored.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Requests a stop. Returns `false` if a stop was already requested.
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.tx.borrow().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolves once a stop has been requested, immediately if it already was.
    pub async fn stopped(&self) -> Option<StopReason> {
        let mut rx = self.tx.subscribe();
        let reason = rx.wait_for(Option::is_some).await.ok()?;
        reason.clone()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a complete run.
#[derive(Debug)]
pub struct RunReport {
    pub summary: Summary,
    pub ticks: u64,
    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Sampler<S: ProcessTableSource> {
    source: S,
    selector: SubtreeSelector,
    interval: Duration,
    identity: Identity,
    previous: Snapshot,
    ticks: u64,
}

impl<S: ProcessTableSource> Sampler<S> {
    pub fn new(source: S, selector: SubtreeSelector, interval: Duration) -> Self {
        Self {
            source,
            selector,
            interval,
            identity: Identity::Pid,
            previous: Snapshot::empty(Utc::now()),
            ticks: 0,
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Selection of the last completed tick. Empty before the first tick.
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick and feeds it to `aggregator`.
    ///
    /// Any capture or parse failure aborts the tick before the aggregator or
    /// the previous selection are touched.
    #[instrument(skip(self, aggregator), fields(tick = self.ticks + 1))]
    pub fn tick(&mut self, aggregator: &mut dyn Aggregator) -> Result<Vec<Transition>, CaptureError> {
        let raw = self.source.capture()?;
        let tree = snapshot_from_raw(&raw, self.source.layout())?;
        let selected = self.selector.select(&tree);
        let transitions = diff(&self.previous, &selected, self.identity);

        debug!(
            "{} processes in table, {} selected, {} transitions",
            tree.len(),
            selected.len(),
            transitions.len()
        );

        aggregator.observe(&selected, &transitions);
        self.previous = selected;
        self.ticks += 1;
        Ok(transitions)
    }

    /// Diffs the last selection against an empty snapshot at `at`, ending
    /// every process still tracked.
    pub fn flush(&mut self, aggregator: &mut dyn Aggregator, at: DateTime<Utc>) -> Vec<Transition> {
        let empty = Snapshot::empty(at);
        let transitions = diff(&self.previous, &empty, self.identity);
        aggregator.observe(&empty, &transitions);
        self.previous = empty;
        transitions
    }

    /// Samples until `stop` fires, then flushes and finishes the aggregator.
    ///
    /// A tick that has started always completes before the stop is honoured.
    pub async fn run(
        mut self,
        mut aggregator: Box<dyn Aggregator>,
        stop: StopSignal,
    ) -> Result<RunReport, CaptureError> {
        info!("sampling every {}ms", self.interval.as_millis());
        let started_at = Utc::now();

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        timer.tick().await;

        // Captures block on `ps`. On a multi-threaded runtime the worker is
        // handed off meanwhile so the exit watcher and signal handler keep
        // running.
        let blocking_ok = Handle::current().runtime_flavor() == RuntimeFlavor::MultiThread;

        let stop_reason = loop {
            if blocking_ok {
                tokio::task::block_in_place(|| self.tick(aggregator.as_mut()))?;
            } else {
                self.tick(aggregator.as_mut())?;
            }
            tokio::select! {
                biased;
                reason = stop.stopped() => break reason,
                _ = timer.tick() => {}
            }
        };

        let finished_at = Utc::now();
        let flushed = self.flush(aggregator.as_mut(), finished_at);
        info!(
            "sampling stopped after {} ticks ({}), {} processes still tracked",
            self.ticks,
            stop_reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "no reason".to_string()),
            flushed.len()
        );

        Ok(RunReport {
            summary: aggregator.finish(finished_at),
            ticks: self.ticks,
            stop_reason,
            started_at,
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_wins() {
        let stop = StopSignal::new();
        assert!(!stop.is_stopped());
        assert!(stop.trigger(StopReason::CommandExited(Some(0))));
        assert!(!stop.trigger(StopReason::Interrupted));
        assert_eq!(stop.reason(), Some(StopReason::CommandExited(Some(0))));
    }

    #[tokio::test]
    async fn test_stopped_resolves_for_clones() {
        let stop = StopSignal::new();
        let watcher = stop.clone();
        let handle = tokio::spawn(async move { watcher.stopped().await });
        stop.trigger(StopReason::Terminated);
        assert_eq!(handle.await.unwrap(), Some(StopReason::Terminated));
        // Already stopped: resolves immediately
        assert_eq!(stop.stopped().await, Some(StopReason::Terminated));
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(
            StopReason::CommandExited(Some(2)).to_string(),
            "command exited with status 2"
        );
        assert_eq!(StopReason::Interrupted.to_string(), "interrupted");
    }
}
