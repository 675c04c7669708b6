// ============================================================
// Layer 5 — Learning Rate Schedule
// ============================================================
// Linear warmup followed by a half-cosine decay to zero,
// advanced once per optimizer step:
//
//   step < warmup:  lr = base * step / warmup
//   otherwise:      lr = base * max(0, 0.5 * (1 + cos(2π · cycles · progress)))
//                   progress = (step - warmup) / (total - warmup)
//
// With cycles = 0.5 the rate reaches exactly zero at `total`.

use std::f64::consts::PI;

/// A learning rate as a function of the optimizer step.
pub trait LrSchedule {
    fn lr_at(&self, step: usize) -> f64;
}

/// Linear warmup then cosine decay.
#[derive(Debug, Clone, PartialEq)]
pub struct CosineWarmup {
    pub base_lr:      f64,
    pub warmup_steps: usize,
    pub total_steps:  usize,
    pub num_cycles:   f64,
}

impl CosineWarmup {
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { base_lr, warmup_steps, total_steps, num_cycles: 0.5 }
    }

    fn multiplier(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return step as f64 / self.warmup_steps.max(1) as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress    = (step - self.warmup_steps) as f64 / decay_steps as f64;
        (0.5 * (1.0 + (PI * self.num_cycles * 2.0 * progress).cos())).max(0.0)
    }
}

impl LrSchedule for CosineWarmup {
    fn lr_at(&self, step: usize) -> f64 {
        self.base_lr * self.multiplier(step)
    }
}

/// Walks a schedule one optimizer step at a time.
#[derive(Debug, Clone)]
pub struct Scheduler<S: LrSchedule> {
    schedule: S,
    step:     usize,
}

impl<S: LrSchedule> Scheduler<S> {
    pub fn new(schedule: S) -> Self {
        Self { schedule, step: 0 }
    }

    /// Rate for the upcoming optimizer step
    pub fn current_lr(&self) -> f64 {
        self.schedule.lr_at(self.step)
    }

    /// Advance past one optimizer step
    pub fn step(&mut self) {
        self.step += 1;
    }

    pub fn steps_taken(&self) -> usize {
        self.step
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_warmup_is_linear_from_zero() {
        let s = CosineWarmup::new(0.1, 10, 110);
        assert!(close(s.lr_at(0), 0.0));
        assert!(close(s.lr_at(5), 0.05));
        assert!(close(s.lr_at(10), 0.1));
    }

    #[test]
    fn test_cosine_decay_midpoint_and_end() {
        let s = CosineWarmup::new(0.1, 10, 110);
        // halfway through the 100 decay steps
        assert!(close(s.lr_at(60), 0.05));
        assert!(close(s.lr_at(110), 0.0));
        // never negative past the end
        assert!(s.lr_at(500) >= 0.0);
    }

    #[test]
    fn test_decay_is_monotonic() {
        let s = CosineWarmup::new(1.0, 3, 50);
        let lrs: Vec<f64> = (3..=50).map(|i| s.lr_at(i)).collect();
        assert!(lrs.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_zero_warmup_starts_at_base() {
        let s = CosineWarmup::new(0.2, 0, 10);
        assert!(close(s.lr_at(0), 0.2));
    }

    #[test]
    fn test_scheduler_reports_rate_before_step() {
        let mut sched = Scheduler::new(CosineWarmup::new(1.0, 2, 4));
        assert!(close(sched.current_lr(), 0.0));
        sched.step();
        assert!(close(sched.current_lr(), 0.5));
        sched.step();
        assert!(close(sched.current_lr(), 1.0));
        assert_eq!(sched.steps_taken(), 2);
    }
}
