use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared iteration budget for a fixed worker pool, bounded by a count and a deadline.
///
/// Whichever limit is reached first closes the gate for every worker.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    iterations: u64,
    max_duration: Duration,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    pub fn new(iterations: u64, max_duration: Duration) -> Self {
        Self {
            counter: AtomicU64::new(0),
            iterations,
            max_duration,
            deadline: OnceLock::new(),
        }
    }

    pub fn start_at(&self, started: Instant) {
        let _ = self.deadline.set(started + self.max_duration);
    }

    /// Claims one iteration. Returns `false` once the budget or the deadline is exhausted.
    pub fn next(&self) -> bool {
        let now = Instant::now();

        // If the runner didn't explicitly set a start time, lazily initialize the deadline
        // from the first observed iteration.
        let deadline = self.deadline.get_or_init(|| now + self.max_duration);
        if now >= *deadline {
            return false;
        }

        self.counter.fetch_add(1, Ordering::Relaxed) < self.iterations
    }

    /// Iterations handed out so far, capped at the budget.
    pub fn claimed(&self) -> u64 {
        self.counter.load(Ordering::Relaxed).min(self.iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_stops_at_the_iteration_budget() {
        let gate = IterationGate::new(3, Duration::from_secs(60));
        gate.start_at(Instant::now());

        let granted = (0..10).filter(|_| gate.next()).count();
        assert_eq!(granted, 3);
        assert_eq!(gate.claimed(), 3);
    }

    #[test]
    fn gate_stops_at_the_deadline() {
        let gate = IterationGate::new(1_000, Duration::from_millis(1));
        gate.start_at(Instant::now() - Duration::from_millis(5));

        assert!(!gate.next());
        assert_eq!(gate.claimed(), 0);
    }
}
