use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioProgress {
    FixedIterations {
        workers: u64,
        total_iterations: u64,
        max_duration: Duration,
    },
    ArrivalRate {
        time_unit: Duration,
        total_duration: Duration,
        stage: Option<StageProgress>,
        busy_workers: u64,
        workers: u64,
        dropped_iterations_total: u64,
    },
}

impl ScenarioProgress {
    pub fn total_duration(&self) -> Duration {
        match self {
            Self::FixedIterations { max_duration, .. } => *max_duration,
            Self::ArrivalRate { total_duration, .. } => *total_duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    /// Time since the previous emission.
    pub interval: Duration,
    pub scenario: &'static str,
    pub iterations_total: u64,
    pub iterations_per_sec_now: f64,
    pub progress: ScenarioProgress,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
