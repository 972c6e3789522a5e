pub mod config;
mod error;
pub mod executor;
pub mod http;
pub mod pipeline;
pub mod publish;
pub mod realtime;
pub mod recorder;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod summary;

pub use config::{
    Endpoints, EnvVars, OutputConfig, Overrides, ScenarioKind, WorkloadConfig,
    process_env_snapshot,
};
pub use error::{ConfigurationError, Error, Result};
pub use executor::{RequestExecutor, RequestOutcome, Transport};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use pipeline::{Pipeline, RunOutcome};
pub use publish::{PublishOutcome, Publisher};
pub use realtime::{ExecutionRecord, Point, PointWriter, collate_executions};
pub use recorder::{LiveCounters, OutcomeRecorder, RecordedOutcome};
pub use report::{ArtifactKind, ArtifactOutcome, RunReport, emit_all};
pub use runner::{
    IterationContext, ProgressFn, ProgressUpdate, RunTiming, ScenarioProgress, StageProgress,
    run_scenario,
};
pub use scenario::{Scenario, Stage, build_scenario};
pub use summary::{RunInfo, SummaryReport, SummaryValue, aggregate};
