use std::sync::atomic::{AtomicU64, Ordering};

static TASKS_SUBMITTED: AtomicU64 = AtomicU64::new(0);
static TASKS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static TASKS_FAILED: AtomicU64 = AtomicU64::new(0);
static TASKS_TIMED_OUT: AtomicU64 = AtomicU64::new(0);

static CALLBACKS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static CALLBACKS_REJECTED: AtomicU64 = AtomicU64::new(0);

static CREDITS_DEBITED: AtomicU64 = AtomicU64::new(0);
static SETTLEMENT_ERRORS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_timed_out: u64,
    pub callbacks_accepted: u64,
    pub callbacks_rejected: u64,
    pub credits_debited: u64,
    pub settlement_errors: u64,
}

pub fn inc_tasks_submitted() {
    TASKS_SUBMITTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tasks_completed() {
    TASKS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tasks_failed() {
    TASKS_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_tasks_timed_out() {
    TASKS_TIMED_OUT.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_callbacks_accepted() {
    CALLBACKS_ACCEPTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_callbacks_rejected() {
    CALLBACKS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn add_credits_debited(amount: u64) {
    CREDITS_DEBITED.fetch_add(amount, Ordering::Relaxed);
}

pub fn inc_settlement_errors() {
    SETTLEMENT_ERRORS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        tasks_submitted: TASKS_SUBMITTED.load(Ordering::Relaxed),
        tasks_completed: TASKS_COMPLETED.load(Ordering::Relaxed),
        tasks_failed: TASKS_FAILED.load(Ordering::Relaxed),
        tasks_timed_out: TASKS_TIMED_OUT.load(Ordering::Relaxed),
        callbacks_accepted: CALLBACKS_ACCEPTED.load(Ordering::Relaxed),
        callbacks_rejected: CALLBACKS_REJECTED.load(Ordering::Relaxed),
        credits_debited: CREDITS_DEBITED.load(Ordering::Relaxed),
        settlement_errors: SETTLEMENT_ERRORS.load(Ordering::Relaxed),
    }
}
