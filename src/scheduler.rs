//! Fixed-rate execution context.
//!
//! Runs ticks on the calling thread, so a tick never starts before the
//! previous one has returned.

use crate::component::{ComponentError, Lifecycle, TickReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Totals for one [`PeriodicScheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub failed_ticks: u64,
    /// Ticks that finished after the next deadline had passed.
    pub overruns: u64,
}

/// Calls [`Lifecycle::on_execute`] at a fixed nominal rate.
pub struct PeriodicScheduler {
    period: Duration,
    max_ticks: Option<u64>,
    stop: Arc<AtomicBool>,
}

impl PeriodicScheduler {
    /// Creates a scheduler ticking `rate_hz` times per second (at least 1).
    pub fn new(rate_hz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1))),
            max_ticks: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops after `ticks` ticks; 0 means run until stopped.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = (ticks > 0).then_some(ticks);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Flag that ends the run when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn should_continue(&self, ticks: u64) -> bool {
        !self.stop.load(Ordering::Acquire) && self.max_ticks.map_or(true, |max| ticks < max)
    }

    /// Ticks the component until stopped or the tick limit is reached.
    ///
    /// Tick errors are logged and the schedule carries on.
    pub fn run<F>(&self, component: &mut dyn Lifecycle, mut on_tick: F) -> RunSummary
    where
        F: FnMut(u64, &Result<TickReport, ComponentError>),
    {
        let mut summary = RunSummary::default();
        let mut deadline = Instant::now();

        tracing::info!(period_ms = self.period.as_secs_f64() * 1e3, "Scheduler started");

        while self.should_continue(summary.ticks) {
            let result = component.on_execute();
            summary.ticks += 1;
            if let Err(e) = &result {
                summary.failed_ticks += 1;
                tracing::warn!(tick = summary.ticks, error = %e, "Tick failed");
            }
            on_tick(summary.ticks, &result);

            deadline += self.period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                summary.overruns += 1;
                tracing::debug!(
                    tick = summary.ticks,
                    late_us = (now - deadline).as_micros() as u64,
                    "Tick overran its period"
                );
                deadline = now;
            }
        }

        tracing::info!(
            ticks = summary.ticks,
            failed = summary.failed_ticks,
            overruns = summary.overruns,
            "Scheduler stopped"
        );
        summary
    }
}
