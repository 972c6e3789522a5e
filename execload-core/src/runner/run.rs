use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use super::gate::IterationGate;
use super::iteration::{IterationContext, IterationCounter};
use super::pacer::ArrivalPacer;
use super::progress::{ProgressFn, ProgressUpdate, ScenarioProgress, StageProgress};
use super::schedule::RampingU64Schedule;
use crate::error::Result;
use crate::scenario::Scenario;

const PACER_TICK: Duration = Duration::from_millis(10);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Wall-clock bounds and totals of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTiming {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub iterations: u64,
    pub dropped_iterations: u64,
}

#[derive(Clone)]
enum Work {
    Fixed(Arc<IterationGate>),
    ArrivalRate(Arc<ArrivalPacer>),
}

/// Drives `iteration` according to `scenario` and returns once every worker has been joined.
///
/// Nothing spawned here outlives the call, so state captured by `iteration` is released
/// by the time this returns.
pub async fn run_scenario<F, Fut>(
    scenario: &Scenario,
    run_id: &str,
    iteration: F,
    progress: Option<ProgressFn>,
) -> Result<RunTiming>
where
    F: Fn(IterationContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let counter = Arc::new(IterationCounter::new(run_id));

    let (work, schedule) = match scenario {
        Scenario::FixedIterations {
            total_iterations,
            max_duration,
            ..
        } => (
            Work::Fixed(Arc::new(IterationGate::new(
                *total_iterations,
                *max_duration,
            ))),
            None,
        ),
        Scenario::RampingArrivalRate {
            start_rate,
            time_unit,
            preallocated_workers,
            stages,
        } => (
            Work::ArrivalRate(Arc::new(ArrivalPacer::new(*preallocated_workers))),
            Some((
                Arc::new(RampingU64Schedule::new(*start_rate, stages.clone())),
                *time_unit,
            )),
        ),
        Scenario::ConstantArrivalRate {
            rate,
            time_unit,
            duration,
            preallocated_workers,
        } => (
            Work::ArrivalRate(Arc::new(ArrivalPacer::new(*preallocated_workers))),
            Some((
                Arc::new(RampingU64Schedule::constant(*rate, *duration)),
                *time_unit,
            )),
        ),
    };

    let workers = scenario.workers().max(1);
    tracing::info!(
        scenario = scenario.name(),
        workers,
        duration = ?scenario.total_duration(),
        "starting run"
    );

    let started_at = Utc::now();
    let started = Instant::now();
    if let Work::Fixed(gate) = &work {
        gate.start_at(started);
    }

    let mut handles = Vec::with_capacity(workers as usize + 1);
    for _ in 0..workers {
        let work = work.clone();
        let counter = counter.clone();
        let iteration = iteration.clone();
        handles.push(tokio::spawn(async move {
            match work {
                Work::Fixed(gate) => {
                    while gate.next() {
                        iteration(counter.next_context()).await;
                    }
                }
                Work::ArrivalRate(pacer) => {
                    while pacer.claim_next().await {
                        pacer.begin();
                        iteration(counter.next_context()).await;
                        pacer.end();
                    }
                }
            }
        }));
    }

    // The pacer starts after the workers so no backlog builds up while they are spawned.
    if let (Work::ArrivalRate(pacer), Some((schedule, time_unit))) = (&work, &schedule) {
        let pacer = pacer.clone();
        let schedule = schedule.clone();
        let time_unit = *time_unit;
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PACER_TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let total_duration = schedule.total_duration();
            let mut carry = 0.0f64;
            let mut last = Instant::now();

            loop {
                interval.tick().await;

                let now = Instant::now();
                let elapsed = now.duration_since(started);
                if elapsed >= total_duration {
                    break;
                }

                // Use the real gap since the last tick so a delayed tick does not lose arrivals.
                let dt = now.duration_since(last).as_secs_f64();
                last = now;

                let rate = schedule.target_at(elapsed) as f64;
                carry += rate * (dt / time_unit.as_secs_f64().max(1e-9));
                let due = carry.floor() as u64;
                carry -= due as f64;

                pacer.update_due(due);
            }

            pacer.mark_done();
        }));
    }

    let progress_handle = progress.map(|on_progress| {
        let work = work.clone();
        let counter = counter.clone();
        let schedule = schedule.clone();
        let scenario_progress = scenario.clone();
        let name = scenario.name();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at((started + PROGRESS_INTERVAL).into(), PROGRESS_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut tick: u64 = 0;
            let mut last_at = started;
            let mut last_iterations = 0u64;

            loop {
                interval.tick().await;

                tick = tick.saturating_add(1);
                let now = Instant::now();
                let dt = now.duration_since(last_at);
                last_at = now;

                let iterations_total = counter.issued();
                let delta = iterations_total.saturating_sub(last_iterations);
                last_iterations = iterations_total;

                let elapsed = now.duration_since(started);
                let progress = match (&work, &schedule, &scenario_progress) {
                    (Work::ArrivalRate(pacer), Some((schedule, time_unit)), _) => {
                        ScenarioProgress::ArrivalRate {
                            time_unit: *time_unit,
                            total_duration: schedule.total_duration(),
                            stage: schedule.stage_snapshot_at(elapsed).map(|st| StageProgress {
                                stage: st.index + 1,
                                stages: st.count,
                                stage_elapsed: st.stage_elapsed,
                                stage_remaining: st.stage_remaining,
                                start_target: st.start_target,
                                end_target: st.end_target,
                                current_target: st.current_target,
                            }),
                            busy_workers: pacer.busy_workers(),
                            workers: pacer.workers(),
                            dropped_iterations_total: pacer.dropped_total(),
                        }
                    }
                    (
                        _,
                        _,
                        Scenario::FixedIterations {
                            workers,
                            total_iterations,
                            max_duration,
                        },
                    ) => ScenarioProgress::FixedIterations {
                        workers: *workers,
                        total_iterations: *total_iterations,
                        max_duration: *max_duration,
                    },
                    _ => continue,
                };

                (on_progress)(ProgressUpdate {
                    tick,
                    elapsed,
                    interval: dt,
                    scenario: name,
                    iterations_total,
                    iterations_per_sec_now: delta as f64 / dt.as_secs_f64().max(1e-9),
                    progress,
                });
            }
        })
    });

    // Join everything before surfacing a failure so no worker is left holding captured state.
    let mut first_err = None;
    for h in handles {
        if let Err(err) = h.await
            && first_err.is_none()
        {
            first_err = Some(err);
        }
    }

    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }

    if let Some(err) = first_err {
        return Err(err.into());
    }

    let elapsed = started.elapsed();
    let dropped_iterations = match &work {
        Work::ArrivalRate(pacer) => pacer.dropped_total(),
        Work::Fixed(_) => 0,
    };
    let iterations = counter.issued();

    tracing::info!(iterations, dropped_iterations, elapsed = ?elapsed, "run finished");

    Ok(RunTiming {
        started_at,
        ended_at: Utc::now(),
        elapsed,
        iterations,
        dropped_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Stage;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn collecting() -> (
        Arc<Mutex<Vec<String>>>,
        impl Fn(IterationContext) -> std::future::Ready<()> + Clone + Send + Sync + 'static,
    ) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let f = move |ctx: IterationContext| {
            sink.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(ctx.session_id);
            std::future::ready(())
        };
        (seen, f)
    }

    #[tokio::test]
    async fn fixed_iterations_run_the_exact_budget() {
        let (seen, f) = collecting();
        let scenario = Scenario::FixedIterations {
            workers: 3,
            total_iterations: 10,
            max_duration: Duration::from_secs(10),
        };

        let timing = run_scenario(&scenario, "R", f, None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        let seen = seen.lock().unwrap_or_else(|p| p.into_inner()).clone();
        assert_eq!(timing.iterations, 10);
        assert_eq!(timing.dropped_iterations, 0);
        let unique: HashSet<_> = seen.iter().cloned().collect();
        let expected: HashSet<_> = (0..10).map(|i| format!("R_{i}")).collect();
        assert_eq!(unique, expected);
        assert!(timing.ended_at >= timing.started_at);
    }

    #[tokio::test]
    async fn constant_arrival_rate_issues_roughly_rate_times_duration() {
        let (seen, f) = collecting();
        let scenario = Scenario::ConstantArrivalRate {
            rate: 50,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(1),
            preallocated_workers: 250,
        };

        let timing = run_scenario(&scenario, "C", f, None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        let n = seen.lock().unwrap_or_else(|p| p.into_inner()).len() as u64;
        assert_eq!(n, timing.iterations);
        assert!((40..=52).contains(&n), "unexpected iteration count {n}");
        assert_eq!(timing.dropped_iterations, 0);
    }

    #[tokio::test]
    async fn ramping_arrival_rate_stops_after_its_stages() {
        let (_seen, f) = collecting();
        let scenario = Scenario::RampingArrivalRate {
            start_rate: 0,
            time_unit: Duration::from_secs(1),
            preallocated_workers: 100,
            stages: vec![
                Stage {
                    duration: Duration::from_millis(500),
                    target: 40,
                },
                Stage {
                    duration: Duration::from_millis(500),
                    target: 40,
                },
            ],
        };

        let progress_ticks = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let ticks = progress_ticks.clone();
        let on_progress: ProgressFn = Arc::new(move |_u| {
            ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        });

        let timing = run_scenario(&scenario, "P", f, Some(on_progress))
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        // Ramp half averages 20/s, hold half runs at 40/s.
        assert!(
            (20..=32).contains(&timing.iterations),
            "unexpected iteration count {}",
            timing.iterations
        );
        assert!(timing.elapsed < Duration::from_secs(3));
    }
}
