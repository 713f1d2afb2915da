//! Capture cadence gating
//!
//! Decides, on each cadence tick, whether a capture+predict cycle may start.
//! At most one cycle (or readiness probe) is in flight at a time.

use std::time::Duration;
use tokio::time::Instant;

/// Work currently outstanding on a spawned task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InFlight {
    Probe,
    Predict,
}

/// Outcome of a cadence tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleDecision {
    Capture,
    ProbeReadiness,
    Skip(SkipReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Stopped,
    Paused,
    InFlight,
    CoolingDown,
    Inactive,
}

#[derive(Clone, Debug)]
pub struct CaptureScheduler {
    period: Duration,
    running: bool,
    paused: bool,
    ready: bool,
    in_flight: Option<InFlight>,
    cooldown_until: Option<Instant>,
    retry_at: Option<Instant>,
}

impl CaptureScheduler {
    pub fn new(period: Duration) -> Self {
        CaptureScheduler {
            period,
            running: false,
            paused: false,
            ready: false,
            in_flight: None,
            cooldown_until: None,
            retry_at: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Cancel scheduling. An in-flight cycle keeps running but the engine
    /// treats its result as stale.
    pub fn stop(&mut self) {
        self.running = false;
        self.cooldown_until = None;
        self.retry_at = None;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn on_tick(&self, now: Instant, session_active: bool) -> CycleDecision {
        if !self.running {
            return CycleDecision::Skip(SkipReason::Stopped);
        }
        if self.paused {
            return CycleDecision::Skip(SkipReason::Paused);
        }
        if self.in_flight.is_some() {
            return CycleDecision::Skip(SkipReason::InFlight);
        }
        if !self.ready {
            return CycleDecision::ProbeReadiness;
        }
        if self.cooldown_until.map_or(false, |until| now < until) {
            return CycleDecision::Skip(SkipReason::CoolingDown);
        }
        if !session_active {
            return CycleDecision::Skip(SkipReason::Inactive);
        }
        CycleDecision::Capture
    }

    pub fn launch(&mut self, cycle: InFlight) {
        self.in_flight = Some(cycle);
    }

    /// Mark the outstanding cycle done; returns what it was.
    pub fn finish(&mut self) -> Option<InFlight> {
        self.in_flight.take()
    }

    pub fn begin_cooldown(&mut self, until: Instant) {
        self.cooldown_until = Some(until);
        self.retry_at = None;
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn end_cooldown(&mut self) {
        self.cooldown_until = None;
    }

    /// One-off retry. A pending retry is not pushed back.
    pub fn schedule_retry(&mut self, at: Instant) {
        if self.retry_at.is_none() {
            self.retry_at = Some(at);
        }
    }

    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Consume a due retry if a capture could start right now.
    pub fn take_retry(&mut self, now: Instant, session_active: bool) -> bool {
        match self.retry_at {
            Some(at) if now >= at => {
                self.retry_at = None;
                self.on_tick(now, session_active) == CycleDecision::Capture
            }
            _ => false,
        }
    }
}
