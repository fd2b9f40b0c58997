//! Run command implementation.
//!
//! Launches the command (if any), samples its process subtree until it exits
//! or the user interrupts, then writes the summary to the selected sink.

use anyhow::{anyhow, Context};
use std::fs::File;
use std::io::{self, BufWriter};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pstree_prof::launcher::forward_terminate;
use pstree_prof::{
    aggregator_for, launch, snapshot_from_raw, write_counts, JsonSpanExporter, ProcessTableSource,
    PsSource, Sampler, SpanExporter, StopReason, StopSignal, SubtreeSelector, Summary,
    TraceDocument, TraceResource,
};

use crate::config::Config;

/// Samples until the command exits or a stop signal arrives, then prints the
/// summary.
pub async fn command_run(config: &Config) -> anyhow::Result<()> {
    let mode = config.output_mode().map_err(|e| anyhow!(e))?;
    let identity = config.identity().map_err(|e| anyhow!(e))?;
    let layout = config.column_layout().map_err(|e| anyhow!(e))?;
    let mut source = PsSource::new(config.ps_program(), layout);

    // Probe the source before starting anything, so an unusable `ps` is
    // reported up front.
    let probe = source
        .capture()
        .context("could not read the process table")?;
    let table = snapshot_from_raw(&probe, source.layout())
        .context("could not parse the process table")?;
    debug!("startup probe parsed {} processes", table.len());

    let launched = match config.launch_argv()? {
        Some((program, args)) => Some(launch(&program, &args)?),
        None => None,
    };
    let launched_pid = launched.as_ref().map(|l| l.pid);

    let rule = config
        .root_rule(launched_pid)
        .ok_or_else(|| anyhow!("a non-empty command or pattern must be specified"))?;
    // Our own command line contains the pattern, and a matching parent would
    // reach us as its child.
    let selector = SubtreeSelector::new(rule).exclude(std::process::id(), launched_pid);

    let stop = StopSignal::new();
    let watcher = launched.map(|l| l.watch(stop.clone()));
    let signals = spawn_signal_handler(stop.clone(), launched_pid);

    let sampler =
        Sampler::new(source, selector, config.sampling_interval()).with_identity(identity);
    let result = sampler.run(aggregator_for(mode), stop.clone()).await;
    signals.abort();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            // Dropping the watcher kills the child.
            if let Some(watcher) = watcher {
                watcher.abort();
                let _ = watcher.await;
            }
            return Err(e).context("sampling aborted");
        }
    };

    info!(
        "collected {} samples ({})",
        report.ticks,
        report
            .stop_reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    );

    match report.summary {
        Summary::Counts(rows) => {
            let stdout = io::stdout();
            write_counts(&mut stdout.lock(), &rows).context("could not write counts")?;
        }
        Summary::Spans(spans) => {
            let run_name = config
                .run_name()
                .unwrap_or_else(|| "pstree-prof".to_string());
            let trace = TraceDocument::build(
                TraceResource::new(config.service_name()),
                &run_name,
                report.started_at,
                report.finished_at,
                &spans,
            );
            match &config.trace_output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("could not create {}", path.display()))?;
                    JsonSpanExporter::new(BufWriter::new(file))
                        .export(&trace)
                        .context("could not export trace")?;
                    info!("wrote {} spans to {}", spans.len(), path.display());
                }
                None => {
                    let stderr = io::stderr();
                    JsonSpanExporter::new(stderr.lock())
                        .export(&trace)
                        .context("could not export trace")?;
                }
            }
        }
    }

    if let Some(StopReason::CommandExited(Some(code))) = report.stop_reason {
        if code != 0 {
            warn!("command exited with status {}", code);
        }
    }
    Ok(())
}

/// Triggers `stop` on SIGINT or SIGTERM. SIGTERM is forwarded to the
/// launched command.
fn spawn_signal_handler(stop: StopSignal, child_pid: Option<u32>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), stopping sampling...");
                stop.trigger(StopReason::Interrupted);
            }
            _ = terminate => {
                info!("Received SIGTERM, stopping sampling...");
                if let Some(pid) = child_pid {
                    forward_terminate(pid);
                }
                stop.trigger(StopReason::Terminated);
            }
            _ = stop.stopped() => {}
        }
    })
}
