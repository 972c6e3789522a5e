use execload_core::Pipeline;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::run_support::{resolve_config, run_overrides};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let cfg = resolve_config(&args.workload.env, &run_overrides(&args))?;
    let pipeline = Pipeline::new(cfg);
    let scenario = pipeline.scenario()?;

    out.print_header(pipeline.config(), &scenario);
    let pipeline = match out.progress(pipeline.live()) {
        Some(p) => pipeline.progress(p),
        None => pipeline,
    };

    let mut console = Vec::new();
    let outcome = pipeline.run(&mut console).await?;

    out.print_summary(&outcome, &console)
        .map_err(|e| RunError::RuntimeError(e.context("failed to print summary")))?;

    let failed_artifacts = outcome.artifacts.iter().filter(|a| a.is_failed()).count();
    if failed_artifacts > 0 {
        tracing::warn!(failed_artifacts, "run finished with missing artifacts");
    }

    Ok(ExitCode::from_checks(outcome.checks_failed()))
}
