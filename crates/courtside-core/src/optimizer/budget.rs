// Search budget: an external stop flag plus an optional wall-clock deadline.
//
// The optimizer polls the budget between search steps. The stop flag is read
// on every poll; the clock is only consulted when the step counter hits the
// check mask, which keeps `Instant::now()` off the hot path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SearchBudget {
    stop: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
    clock_check_mask: u64,
}

impl Default for SearchBudget {
    fn default() -> Self {
        SearchBudget::unlimited()
    }
}

impl SearchBudget {
    /// Check the clock every 1,024 steps (2^10).
    const DEFAULT_CLOCK_CHECK_MASK: u64 = 0x3FF;

    /// No deadline and no stop flag: the search runs to completion.
    pub fn unlimited() -> Self {
        SearchBudget {
            stop: None,
            deadline: None,
            clock_check_mask: Self::DEFAULT_CLOCK_CHECK_MASK,
        }
    }

    /// A budget that ends when `flag` is raised.
    pub fn with_stop_flag(flag: Arc<AtomicBool>) -> Self {
        SearchBudget {
            stop: Some(flag),
            ..SearchBudget::unlimited()
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_time_limit(self, limit: Duration) -> Self {
        self.with_deadline(Instant::now() + limit)
    }

    pub fn with_clock_check_mask(mut self, mask: u64) -> Self {
        self.clock_check_mask = mask;
        self
    }

    /// Raise the stop flag, if this budget has one.
    pub fn stop(&self) {
        if let Some(flag) = &self.stop {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Whether the search must stop now. Always reads the clock.
    pub fn is_stopped(&self) -> bool {
        self.flag_raised() || self.deadline_passed()
    }

    /// Step-filtered variant of [`is_stopped`](Self::is_stopped) for inner loops.
    pub(crate) fn should_stop(&self, steps: u64) -> bool {
        if self.flag_raised() {
            return true;
        }
        (steps & self.clock_check_mask) == 0 && self.deadline_passed()
    }

    fn flag_raised(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
