//! Per-target countdown
//!
//! Purely time-driven: the engine asks `next_wakeup()` when to come back and
//! calls `poll()` then. Expiry fires once per `arm()`.

use std::time::Duration;
use tokio::time::Instant;

/// What the countdown has to report at a given instant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// One tick elapsed; whole seconds left (rounded up)
    Tick { remaining_secs: u64 },
    /// Deadline reached for the target armed under `generation`
    Expired { generation: u64 },
}

#[derive(Clone, Debug)]
struct Countdown {
    generation: u64,
    deadline: Instant,
    next_tick: Instant,
    /// Time left when paused
    frozen: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct TimeoutTimer {
    tick: Duration,
    countdown: Option<Countdown>,
}

impl TimeoutTimer {
    pub fn new(tick: Duration) -> Self {
        TimeoutTimer {
            tick,
            countdown: None,
        }
    }

    /// Start counting down for the target activated under `generation`.
    /// Replaces any previous countdown.
    pub fn arm(&mut self, generation: u64, duration: Duration, now: Instant) {
        self.countdown = Some(Countdown {
            generation,
            deadline: now + duration,
            next_tick: now + self.tick,
            frozen: None,
        });
    }

    /// Stop without firing.
    pub fn cancel(&mut self) {
        self.countdown = None;
    }

    pub fn is_armed(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(countdown) = self.countdown.as_mut() {
            if countdown.frozen.is_none() {
                countdown.frozen = Some(countdown.deadline.saturating_duration_since(now));
            }
        }
    }

    pub fn resume(&mut self, now: Instant) {
        let tick = self.tick;
        if let Some(countdown) = self.countdown.as_mut() {
            if let Some(left) = countdown.frozen.take() {
                countdown.deadline = now + left;
                countdown.next_tick = now + tick.min(left);
            }
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.countdown.as_ref().map(|c| match c.frozen {
            Some(left) => left,
            None => c.deadline.saturating_duration_since(now),
        })
    }

    pub fn remaining_secs(&self, now: Instant) -> Option<u64> {
        self.remaining(now)
            .map(|left| ((left.as_millis() + 999) / 1000) as u64)
    }

    /// Next instant `poll` has something to report; `None` when idle or paused.
    pub fn next_wakeup(&self) -> Option<Instant> {
        match &self.countdown {
            Some(c) if c.frozen.is_none() => Some(c.next_tick.min(c.deadline)),
            _ => None,
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<TimerEvent> {
        let countdown = self.countdown.as_mut()?;
        if countdown.frozen.is_some() {
            return None;
        }

        if now >= countdown.deadline {
            let generation = countdown.generation;
            self.countdown = None;
            return Some(TimerEvent::Expired { generation });
        }

        if now >= countdown.next_tick {
            while countdown.next_tick <= now {
                countdown.next_tick += self.tick;
            }
            return self
                .remaining_secs(now)
                .map(|remaining_secs| TimerEvent::Tick { remaining_secs });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_ticks_then_single_expiry() {
        let start = Instant::now();
        let mut timer = TimeoutTimer::new(secs(1));
        timer.arm(4, secs(3), start);

        assert_eq!(timer.poll(start), None);
        assert_eq!(
            timer.poll(start + secs(1)),
            Some(TimerEvent::Tick { remaining_secs: 2 })
        );
        assert_eq!(
            timer.poll(start + secs(2)),
            Some(TimerEvent::Tick { remaining_secs: 1 })
        );
        assert_eq!(
            timer.poll(start + secs(3)),
            Some(TimerEvent::Expired { generation: 4 })
        );
        // one-shot
        assert_eq!(timer.poll(start + secs(4)), None);
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_cancel_prevents_expiry() {
        let start = Instant::now();
        let mut timer = TimeoutTimer::new(secs(1));
        timer.arm(1, secs(5), start);
        timer.cancel();
        assert_eq!(timer.poll(start + secs(10)), None);
        assert_eq!(timer.next_wakeup(), None);
    }

    #[test]
    fn test_pause_freezes_remaining() {
        let start = Instant::now();
        let mut timer = TimeoutTimer::new(secs(1));
        timer.arm(1, secs(5), start);

        timer.pause(start + secs(2));
        assert_eq!(timer.next_wakeup(), None);
        assert_eq!(timer.poll(start + secs(30)), None);
        assert_eq!(timer.remaining(start + secs(30)), Some(secs(3)));

        timer.resume(start + secs(30));
        assert_eq!(timer.poll(start + secs(32)), Some(TimerEvent::Tick { remaining_secs: 1 }));
        assert_eq!(
            timer.poll(start + secs(33)),
            Some(TimerEvent::Expired { generation: 1 })
        );
    }

    #[test]
    fn test_rearm_replaces_countdown() {
        let start = Instant::now();
        let mut timer = TimeoutTimer::new(secs(1));
        timer.arm(1, secs(2), start);
        timer.arm(2, secs(5), start + secs(1));
        assert_eq!(
            timer.poll(start + secs(6)),
            Some(TimerEvent::Expired { generation: 2 })
        );
    }
}
