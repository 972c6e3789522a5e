use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use execload_core::{
    LiveCounters, ProgressFn, RunOutcome, Scenario, ScenarioProgress, WorkloadConfig,
};

mod format;
mod progress;

use format::{format_duration, format_rate};
use progress::HumanProgress;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

fn progress_message(u: &execload_core::ProgressUpdate, rates: &str) -> String {
    match &u.progress {
        ScenarioProgress::FixedIterations {
            workers,
            total_iterations,
            ..
        } => format!(
            "workers={workers} iterations={}/{total_iterations} elapsed={}{rates}",
            u.iterations_total,
            format_duration(u.elapsed)
        ),
        ScenarioProgress::ArrivalRate {
            stage,
            busy_workers,
            workers,
            dropped_iterations_total,
            ..
        } => {
            let mut msg = format!(
                "busy={busy_workers}/{workers} dropped={dropped_iterations_total} elapsed={}{rates}",
                format_duration(u.elapsed)
            );
            if let Some(stage) = stage {
                msg.push_str(&format!(
                    " stage={}/{} target={}/s",
                    stage.stage, stage.stages, stage.current_target
                ));
            }
            msg
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, cfg: &WorkloadConfig, scenario: &Scenario) {
        println!("run: {} region={}", cfg.run_id, cfg.region);
        println!("target: {}", cfg.endpoints.execute_url());
        println!(
            "scenario: {} rate={}/s duration={} workers={}",
            scenario.name(),
            cfg.target_rate,
            humantime::format_duration(cfg.duration),
            scenario.workers()
        );
        println!();
    }

    fn progress(&self, live: Arc<LiveCounters>) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        let prev_failed = Arc::new(AtomicU64::new(0));

        Some(Arc::new(move |u| {
            let failed_total = live.failed_total();
            let failed_delta = failed_total.saturating_sub(prev_failed.swap(failed_total, Ordering::Relaxed));

            let rates = format!(
                " iters/s={} reqs={} failed={failed_delta}/{failed_total}",
                format_rate(u.iterations_per_sec_now),
                live.requests_total(),
            );

            let message = progress_message(&u, &rates);
            progress.update(u.scenario, u.progress.total_duration(), u.elapsed, message);
        }))
    }

    fn print_summary(&self, outcome: &RunOutcome, console: &[u8]) -> anyhow::Result<()> {
        self.progress.finish();

        let mut out = std::io::stdout().lock();
        out.write_all(console)?;

        writeln!(out, "\nartifacts")?;
        for a in &outcome.artifacts {
            let path = a
                .path()
                .map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
            let state = if a.is_failed() { "FAILED" } else { "ok" };
            writeln!(out, "  {:<13} {state:<6} {path}", a.kind().to_string())?;
        }
        match outcome.points_written {
            Some(n) => writeln!(out, "  real-time points: {n}")?,
            None => writeln!(out, "  real-time points: FAILED")?,
        }
        out.flush()?;

        if outcome.checks_failed() {
            eprintln!(
                "checks failed: {} of {} requests",
                outcome.report.checks_failed(),
                outcome.report.checks_total
            );
        }

        Ok(())
    }
}
