// ============================================================
// Layer 5 — Learning Rate Schedules
// ============================================================
// Every schedule warms up linearly from 0 to the base rate over
// `warmup_steps` optimizer steps, then:
//
//   linear               decays linearly to 0 at the last step
//   cosine               follows half a cosine wave down to 0
//   constant             ignores warmup and stays at the base rate
//   constant_with_warmup stays at the base rate after warmup

use anyhow::{bail, Result};
use std::{f64::consts::PI, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Linear,
    Cosine,
    Constant,
    ConstantWithWarmup,
}

impl FromStr for SchedulerKind {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "linear"               => SchedulerKind::Linear,
            "cosine"               => SchedulerKind::Cosine,
            "constant"             => SchedulerKind::Constant,
            "constant_with_warmup" => SchedulerKind::ConstantWithWarmup,
            other => bail!("Unsupported learning rate scheduler '{other}'"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LrSchedule {
    kind:         SchedulerKind,
    base_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
}

impl LrSchedule {
    pub fn new(kind: SchedulerKind, base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { kind, base_lr, warmup_steps, total_steps }
    }

    /// Learning rate for the optimizer step taken after `step`
    /// steps have already completed.
    pub fn lr_at(&self, step: usize) -> f64 {
        self.base_lr * self.factor(step)
    }

    fn factor(&self, step: usize) -> f64 {
        if self.kind == SchedulerKind::Constant {
            return 1.0;
        }
        if step < self.warmup_steps {
            return step as f64 / self.warmup_steps.max(1) as f64;
        }

        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        let progress    = (step - self.warmup_steps) as f64 / decay_steps;
        match self.kind {
            SchedulerKind::Linear => (1.0 - progress).max(0.0),
            SchedulerKind::Cosine => (0.5 * (1.0 + (PI * progress.min(1.0)).cos())).max(0.0),
            SchedulerKind::Constant | SchedulerKind::ConstantWithWarmup => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linear_warmup_then_decay() {
        let s = LrSchedule::new(SchedulerKind::Linear, 1.0, 10, 110);
        assert!(close(s.lr_at(0), 0.0));
        assert!(close(s.lr_at(5), 0.5));
        assert!(close(s.lr_at(10), 1.0));
        assert!(close(s.lr_at(60), 0.5));
        assert!(close(s.lr_at(110), 0.0));
        assert!(close(s.lr_at(500), 0.0));
    }

    #[test]
    fn test_cosine_midpoint() {
        let s = LrSchedule::new(SchedulerKind::Cosine, 2.0, 0, 100);
        assert!(close(s.lr_at(0), 2.0));
        assert!(close(s.lr_at(50), 1.0));
        assert!(close(s.lr_at(100), 0.0));
    }

    #[test]
    fn test_constant_ignores_warmup() {
        let s = LrSchedule::new(SchedulerKind::Constant, 3e-5, 100, 1000);
        assert!(close(s.lr_at(0), 3e-5));

        let s = LrSchedule::new(SchedulerKind::ConstantWithWarmup, 1.0, 4, 1000);
        assert!(close(s.lr_at(2), 0.5));
        assert!(close(s.lr_at(999), 1.0));
    }

    #[test]
    fn test_warmup_longer_than_training() {
        // 500 warmup steps, only 8 optimizer steps in total
        let s = LrSchedule::new(SchedulerKind::Linear, 5e-5, 500, 8);
        assert!(s.lr_at(7) < 5e-5);
        assert!(s.lr_at(7) > 0.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("linear".parse::<SchedulerKind>().unwrap(), SchedulerKind::Linear);
        assert_eq!("Cosine".parse::<SchedulerKind>().unwrap(), SchedulerKind::Cosine);
        assert!("polynomial_warp".parse::<SchedulerKind>().is_err());
    }
}
