use std::time::Duration;

use crate::config::{ScenarioKind, WorkloadConfig};
use crate::error::ConfigurationError;

/// Worker headroom for arrival-rate scenarios when no explicit pool size is given.
pub const ARRIVAL_RATE_WORKER_MULTIPLIER: u64 = 5;

pub const TIME_UNIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scenario {
    /// A fixed pool draining a shared iteration budget, stopped early by `max_duration`.
    FixedIterations {
        workers: u64,
        total_iterations: u64,
        max_duration: Duration,
    },

    /// Open-model arrival rate (iterations started per `time_unit`), with ramping stages.
    RampingArrivalRate {
        start_rate: u64,
        time_unit: Duration,
        preallocated_workers: u64,
        stages: Vec<Stage>,
    },

    ConstantArrivalRate {
        rate: u64,
        time_unit: Duration,
        duration: Duration,
        preallocated_workers: u64,
    },
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedIterations { .. } => "fixed",
            Self::RampingArrivalRate { .. } => "ramping",
            Self::ConstantArrivalRate { .. } => "constant",
        }
    }

    pub fn workers(&self) -> u64 {
        match self {
            Self::FixedIterations { workers, .. } => *workers,
            Self::RampingArrivalRate {
                preallocated_workers,
                ..
            }
            | Self::ConstantArrivalRate {
                preallocated_workers,
                ..
            } => *preallocated_workers,
        }
    }

    /// Highest rate per time unit the scenario asks for. `None` for closed-model scenarios.
    pub fn peak_rate(&self) -> Option<u64> {
        match self {
            Self::FixedIterations { .. } => None,
            Self::RampingArrivalRate {
                start_rate, stages, ..
            } => Some(
                stages
                    .iter()
                    .map(|s| s.target)
                    .max()
                    .unwrap_or(0)
                    .max(*start_rate),
            ),
            Self::ConstantArrivalRate { rate, .. } => Some(*rate),
        }
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            Self::FixedIterations { max_duration, .. } => *max_duration,
            Self::RampingArrivalRate { stages, .. } => stages
                .iter()
                .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration)),
            Self::ConstantArrivalRate { duration, .. } => *duration,
        }
    }
}

/// Translates a resolved config into exactly one scenario. Pure; performs no I/O.
pub fn build_scenario(cfg: &WorkloadConfig) -> Result<Scenario, ConfigurationError> {
    let rate = cfg.target_rate;
    if rate == 0 {
        return Err(ConfigurationError::ZeroRate);
    }
    if cfg.duration.is_zero() {
        return Err(ConfigurationError::ZeroDuration);
    }
    if cfg.preallocated_workers == Some(0) {
        return Err(ConfigurationError::ZeroWorkers);
    }

    let arrival_workers = cfg
        .preallocated_workers
        .unwrap_or_else(|| rate.saturating_mul(ARRIVAL_RATE_WORKER_MULTIPLIER));

    let scenario = match cfg.scenario_kind {
        ScenarioKind::Fixed => {
            let secs = cfg.duration.as_secs().max(1);
            Scenario::FixedIterations {
                workers: cfg.preallocated_workers.unwrap_or(rate),
                total_iterations: rate.saturating_mul(secs).max(1),
                max_duration: cfg.duration,
            }
        }
        ScenarioKind::Ramping => Scenario::RampingArrivalRate {
            start_rate: 0,
            time_unit: TIME_UNIT,
            preallocated_workers: arrival_workers,
            stages: ramp_then_hold(rate, cfg.duration),
        },
        ScenarioKind::Constant => Scenario::ConstantArrivalRate {
            rate,
            time_unit: TIME_UNIT,
            duration: cfg.duration,
            preallocated_workers: arrival_workers,
        },
    };

    if let Some(peak_rate) = scenario.peak_rate()
        && scenario.workers() < peak_rate
    {
        return Err(ConfigurationError::Underprovisioned {
            workers: scenario.workers(),
            peak_rate,
        });
    }

    Ok(scenario)
}

/// Ramp linearly to `rate` over the first half (rounded up), then hold for the rest.
fn ramp_then_hold(rate: u64, duration: Duration) -> Vec<Stage> {
    let total_ms = duration.as_millis().min(u64::MAX as u128) as u64;
    let ramp_ms = total_ms.div_ceil(2);
    let hold_ms = total_ms - ramp_ms;

    let mut stages = vec![Stage {
        duration: Duration::from_millis(ramp_ms),
        target: rate,
    }];
    if hold_ms > 0 {
        stages.push(Stage {
            duration: Duration::from_millis(hold_ms),
            target: rate,
        });
    }
    stages
}
