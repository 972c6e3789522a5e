use std::sync::Arc;

use execload_core::{LiveCounters, ProgressFn, RunOutcome, Scenario, WorkloadConfig};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, cfg: &WorkloadConfig, scenario: &Scenario);
    fn progress(&self, live: Arc<LiveCounters>) -> Option<ProgressFn>;
    /// `console` is the rendered text summary of the run.
    fn print_summary(&self, outcome: &RunOutcome, console: &[u8]) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
