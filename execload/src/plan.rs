use std::io::Write as _;

use serde::Serialize;

use execload_core::{Scenario, WorkloadConfig, build_scenario};

use crate::cli::WorkloadArgs;
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;
use crate::run_support::{resolve_config, workload_overrides};

#[derive(Debug, Serialize)]
struct PlanDoc<'a> {
    run_id: &'a str,
    region: &'a str,
    execute_url: String,
    summary_sinks: &'a [String],
    real_time_url: &'a str,
    publish: bool,
    request_timeout: String,
    scenario: ScenarioDoc,
}

#[derive(Debug, Serialize)]
struct StageDoc {
    duration: String,
    target: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
enum ScenarioDoc {
    FixedIterations {
        workers: u64,
        iterations: u64,
        max_duration: String,
    },
    RampingArrivalRate {
        start_rate: u64,
        time_unit: String,
        preallocated_vus: u64,
        stages: Vec<StageDoc>,
    },
    ConstantArrivalRate {
        rate: u64,
        time_unit: String,
        duration: String,
        preallocated_vus: u64,
    },
}

fn human(d: std::time::Duration) -> String {
    humantime::format_duration(d).to_string()
}

fn scenario_doc(scenario: &Scenario) -> ScenarioDoc {
    match scenario {
        Scenario::FixedIterations {
            workers,
            total_iterations,
            max_duration,
        } => ScenarioDoc::FixedIterations {
            workers: *workers,
            iterations: *total_iterations,
            max_duration: human(*max_duration),
        },
        Scenario::RampingArrivalRate {
            start_rate,
            time_unit,
            preallocated_workers,
            stages,
        } => ScenarioDoc::RampingArrivalRate {
            start_rate: *start_rate,
            time_unit: human(*time_unit),
            preallocated_vus: *preallocated_workers,
            stages: stages
                .iter()
                .map(|s| StageDoc {
                    duration: human(s.duration),
                    target: s.target,
                })
                .collect(),
        },
        Scenario::ConstantArrivalRate {
            rate,
            time_unit,
            duration,
            preallocated_workers,
        } => ScenarioDoc::ConstantArrivalRate {
            rate: *rate,
            time_unit: human(*time_unit),
            duration: human(*duration),
            preallocated_vus: *preallocated_workers,
        },
    }
}

fn plan_doc<'a>(cfg: &'a WorkloadConfig, scenario: &Scenario) -> PlanDoc<'a> {
    PlanDoc {
        run_id: &cfg.run_id,
        region: &cfg.region,
        execute_url: cfg.endpoints.execute_url(),
        summary_sinks: &cfg.endpoints.summary_sinks,
        real_time_url: &cfg.endpoints.real_time_url,
        publish: cfg.publish,
        request_timeout: human(cfg.request_timeout),
        scenario: scenario_doc(scenario),
    }
}

/// Prints the resolved configuration and scenario as pretty JSON on stdout.
pub fn plan(args: WorkloadArgs) -> Result<ExitCode, RunError> {
    let cfg = resolve_config(&args.env, &workload_overrides(&args))?;
    let scenario = build_scenario(&cfg).map_err(|e| RunError::from(execload_core::Error::from(e)))?;

    let doc = plan_doc(&cfg, &scenario);
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &doc)
        .map_err(|e| RunError::RuntimeError(anyhow::Error::new(e).context("failed to print plan")))?;
    writeln!(out)
        .map_err(|e| RunError::RuntimeError(anyhow::Error::new(e).context("failed to print plan")))?;

    Ok(ExitCode::Success)
}
