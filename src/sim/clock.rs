//! Virtual time for the simulation.
//!
//! Time is an `f64` second counter owned by the harness and advanced
//! explicitly; nothing here touches the wall clock. The clock carries at
//! most one repeating alarm (the application-traffic injector). Instead of
//! storing a callback, `run` reports that the alarm fired and the caller
//! dispatches — that keeps the clock a plain value type and the node table
//! free of aliased clock handles.

/// Monotonic virtual clock with a single repeating alarm.
#[derive(Debug, Clone)]
pub struct Clock {
    curr_time: f64,
    next_call: f64,
    last_call: f64,
    interval: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            curr_time: 0.0,
            next_call: f64::INFINITY,
            last_call: f64::INFINITY,
            interval: 0.0,
        }
    }

    /// Current virtual time, in seconds.
    pub fn read(&self) -> f64 {
        self.curr_time
    }

    /// Advance time by `time` seconds.
    ///
    /// Returns true when the alarm fired. The alarm fires at most once per
    /// call, even when the advance crosses several intervals; the next call
    /// then lands in the past and the following `run` fires again
    /// immediately. Rescheduling stops once the next fire time would pass
    /// the alarm's stop time.
    pub fn run(&mut self, time: f64) -> bool {
        self.curr_time += time;
        if self.curr_time >= self.next_call {
            let next = self.next_call + self.interval;
            self.next_call = if next <= self.last_call {
                next
            } else {
                f64::INFINITY
            };
            true
        } else {
            false
        }
    }

    /// Install the repeating alarm: first fire at `start`, then every
    /// `interval` seconds until `stop` (inclusive).
    ///
    /// A `start` at or before the current time is moved forward in
    /// `interval` steps until it lands strictly in the future, so
    /// re-installing after a previous run resumes the cadence rather than
    /// firing immediately. `interval` must be positive whenever that
    /// catch-up applies; the configuration layer guarantees it.
    pub fn set_alarm(&mut self, start: f64, interval: f64, stop: f64) {
        self.next_call = start;
        while self.next_call <= self.curr_time {
            self.next_call += interval;
        }
        self.interval = interval;
        self.last_call = stop;
    }

    /// Whether an alarm is currently scheduled.
    pub fn alarm_is_on(&self) -> bool {
        self.next_call.is_finite()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_accumulates() {
        let mut clock = Clock::new();
        assert_eq!(clock.read(), 0.0);
        clock.run(1.5);
        clock.run(0.25);
        assert_eq!(clock.read(), 1.75);
    }

    #[test]
    fn no_alarm_never_fires() {
        let mut clock = Clock::new();
        assert!(!clock.alarm_is_on());
        for _ in 0..10 {
            assert!(!clock.run(100.0));
        }
    }

    #[test]
    fn alarm_fires_on_each_crossing() {
        let mut clock = Clock::new();
        clock.set_alarm(10.0, 5.0, 100.0);
        assert!(clock.alarm_is_on());

        assert!(!clock.run(9.0)); // t = 9
        assert!(clock.run(1.0)); // t = 10, fires
        assert!(!clock.run(4.0)); // t = 14
        assert!(clock.run(1.0)); // t = 15, fires
    }

    #[test]
    fn wide_jump_fires_once_then_catches_up() {
        let mut clock = Clock::new();
        clock.set_alarm(10.0, 5.0, 100.0);

        // Jumping over three fire times yields one firing per run call.
        assert!(clock.run(22.0)); // t = 22, fires (10), next = 15
        assert!(clock.run(0.0)); // fires (15), next = 20
        assert!(clock.run(0.0)); // fires (20), next = 25
        assert!(!clock.run(0.0)); // t still 22 < 25
    }

    #[test]
    fn reschedule_stops_at_stop_time() {
        let mut clock = Clock::new();
        clock.set_alarm(10.0, 5.0, 19.0);

        assert!(clock.run(10.0)); // fires at 10, next = 15
        assert!(clock.run(5.0)); // fires at 15, 20 > 19 so alarm ends
        assert!(!clock.alarm_is_on());
        assert!(!clock.run(50.0)); // nothing past the stop time
    }

    #[test]
    fn stop_time_is_inclusive() {
        let mut clock = Clock::new();
        clock.set_alarm(10.0, 5.0, 20.0);

        assert!(clock.run(10.0)); // 10
        assert!(clock.run(5.0)); // 15
        assert!(clock.run(5.0)); // 20, the last one
        assert!(!clock.alarm_is_on());
    }

    #[test]
    fn past_start_catches_up_with_new_interval() {
        let mut clock = Clock::new();
        clock.run(12.0);
        clock.set_alarm(10.0, 4.0, 100.0);

        // 10 and 14 are skipped forward to the first future fire time.
        assert!(!clock.run(1.0)); // t = 13
        assert!(clock.run(1.0)); // t = 14, fires
    }

    #[test]
    fn reinstall_resumes_cadence() {
        let mut clock = Clock::new();
        clock.set_alarm(5.0, 5.0, 14.0);
        assert!(clock.run(5.0)); // 5
        assert!(clock.run(5.0)); // 10
        assert!(!clock.run(5.0)); // alarm exhausted at t = 15
        assert!(!clock.alarm_is_on());

        clock.set_alarm(5.0, 5.0, 100.0);
        assert!(clock.alarm_is_on());
        assert!(clock.run(5.0)); // caught up to 20
    }
}
