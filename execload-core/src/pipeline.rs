use std::io::Write;
use std::sync::Arc;

use chrono::Utc;

use crate::config::WorkloadConfig;
use crate::error::{Error, Result};
use crate::executor::{RequestExecutor, Transport};
use crate::http::HttpClient;
use crate::publish::Publisher;
use crate::realtime::{PointWriter, point_channel};
use crate::recorder::{LiveCounters, OutcomeRecorder};
use crate::report::{ArtifactOutcome, RunReport, emit_all};
use crate::runner::{IterationContext, ProgressFn, run_scenario};
use crate::scenario::{Scenario, build_scenario};
use crate::summary::{RunInfo, SummaryReport, aggregate};

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub summary: SummaryReport,
    pub artifacts: Vec<ArtifactOutcome>,
    /// `None` when the real-time point file could not be completed.
    pub points_written: Option<u64>,
}

impl RunOutcome {
    /// True when at least one request failed its check. Publishing and artifact failures do not
    /// count.
    pub fn checks_failed(&self) -> bool {
        self.report.checks_failed() > 0
    }
}

/// One end-to-end run: schedule, execute, record, then aggregate, publish and emit.
pub struct Pipeline<T: Transport + Clone = HttpClient> {
    cfg: WorkloadConfig,
    transport: T,
    live: Arc<LiveCounters>,
    progress: Option<ProgressFn>,
}

impl Pipeline<HttpClient> {
    pub fn new(cfg: WorkloadConfig) -> Self {
        Self::with_transport(cfg, HttpClient::default())
    }
}

impl<T: Transport + Clone> Pipeline<T> {
    pub fn with_transport(cfg: WorkloadConfig, transport: T) -> Self {
        Self {
            cfg,
            transport,
            live: Arc::new(LiveCounters::default()),
            progress: None,
        }
    }

    #[must_use]
    pub fn progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Request counters that update while the run is in flight.
    pub fn live(&self) -> Arc<LiveCounters> {
        self.live.clone()
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.cfg
    }

    pub fn scenario(&self) -> Result<Scenario> {
        Ok(build_scenario(&self.cfg)?)
    }

    pub async fn run(self, console: &mut (dyn Write + Send)) -> Result<RunOutcome> {
        let Self {
            cfg,
            transport,
            live,
            progress,
        } = self;

        let scenario = build_scenario(&cfg)?;

        let (points_tx, points_rx) = point_channel();
        let writer = PointWriter::spawn(cfg.outputs.real_time_path(), points_rx).await?;

        let recorder = Arc::new(
            OutcomeRecorder::new()?
                .with_live(live)
                .with_points(points_tx),
        );
        let executor = Arc::new(RequestExecutor::from_config(transport.clone(), &cfg));

        let iteration = {
            let recorder = recorder.clone();
            move |ctx: IterationContext| {
                let recorder = recorder.clone();
                let executor = executor.clone();
                async move {
                    let outcome = executor.execute(&ctx).await;
                    recorder.record(&outcome);
                }
            }
        };

        let timing = run_scenario(&scenario, &cfg.run_id, iteration, progress).await?;
        recorder.record_dropped(timing.dropped_iterations);

        // Every worker has been joined, so this is the last reference.
        let recorder = Arc::try_unwrap(recorder).map_err(|_| Error::MetricsStillShared)?;
        let snapshot = recorder.into_snapshot();

        let points_written = match writer.finish().await {
            Ok(n) => Some(n),
            Err(err) => {
                tracing::error!(error = %err, "failed to write real-time points");
                None
            }
        };

        let run = RunInfo::resolve(&cfg, Utc::now);
        let summary = aggregate(&snapshot, &run);
        let mut report = RunReport::new(run, scenario.name(), timing, &snapshot);

        if cfg.publish {
            let publisher = Publisher::new(transport, &cfg.endpoints, cfg.request_timeout);
            report.publish = publisher.publish_summary(&summary).await;
            report
                .publish
                .push(publisher.publish_real_time(&cfg.run_id).await);
        } else {
            tracing::info!("publishing disabled");
        }

        let artifacts = emit_all(&report, &summary, &cfg.outputs, console);

        Ok(RunOutcome {
            report,
            summary,
            artifacts,
            points_written,
        })
    }
}
