use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Hands out due iterations to a fixed pool of workers.
///
/// The pacer task adds due iterations; workers claim them one at a time. Backlog is capped at
/// the pool size, anything above that is counted as dropped.
#[derive(Debug)]
pub struct ArrivalPacer {
    scheduled_total: AtomicU64,
    claimed_total: AtomicU64,
    dropped_total: AtomicU64,
    busy: AtomicU64,
    workers: u64,

    done: AtomicBool,
    notify: Notify,
}

impl ArrivalPacer {
    pub fn new(workers: u64) -> Self {
        Self {
            scheduled_total: AtomicU64::new(0),
            claimed_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            busy: AtomicU64::new(0),
            workers: workers.max(1),
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total.load(Ordering::Relaxed)
    }

    /// Workers currently running an iteration.
    pub fn busy_workers(&self) -> u64 {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn workers(&self) -> u64 {
        self.workers
    }

    pub fn update_due(&self, add_due: u64) {
        if add_due == 0 {
            return;
        }

        let claimed = self.claimed_total.load(Ordering::Relaxed);
        let scheduled = self.scheduled_total.load(Ordering::Relaxed);
        let backlog = scheduled.saturating_sub(claimed);

        let allowed_to_add = self.workers.saturating_sub(backlog);
        let to_add = add_due.min(allowed_to_add);
        let dropped = add_due.saturating_sub(to_add);

        if to_add != 0 {
            self.scheduled_total.fetch_add(to_add, Ordering::Relaxed);
        }
        if dropped != 0 {
            self.dropped_total.fetch_add(dropped, Ordering::Relaxed);
        }

        self.notify.notify_waiters();
    }

    /// Waits for the next due iteration. Returns `false` once the pacer is done and drained.
    pub async fn claim_next(&self) -> bool {
        loop {
            // Register interest before checking state so a concurrent `update_due` is not missed.
            let notified = self.notify.notified();

            let claimed = self.claimed_total.load(Ordering::Relaxed);
            let scheduled = self.scheduled_total.load(Ordering::Relaxed);

            if claimed < scheduled {
                if self
                    .claimed_total
                    .compare_exchange_weak(
                        claimed,
                        claimed.saturating_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return true;
                }
                continue;
            }

            if self.is_done() {
                return false;
            }

            notified.await;
        }
    }

    pub(crate) fn begin(&self) {
        self.busy.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn end(&self) {
        self.busy.fetch_sub(1, Ordering::Relaxed);
    }
}
