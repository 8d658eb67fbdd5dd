//! Countdown state machine
//!
//! `Countdown` owns the remaining time, the running/paused flags and the
//! single live tick handle. Every operation ends by re-evaluating the running
//! condition through `ensure_running` / `ensure_stopped`, so the handle set
//! never grows past one.

pub mod ticker;

use serde::Serialize;
use std::time::Duration;

use ticker::{Scheduler, Tick};

/// Default tick period
pub const TICK_PERIOD: Duration = Duration::from_millis(1000);

/// Observable state of the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Ready,
    Running,
    Paused,
    Finished,
}

/// What a tick did to the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale or unexpected tick, nothing changed
    Ignored,
    Decremented,
    /// Reached zero and released the handle
    Finished,
}

pub struct Countdown<S: Scheduler> {
    duration: Option<u64>,
    time_left: u64,
    is_active: bool,
    is_paused: bool,
    finished: bool,
    scheduler: S,
    ticker: Option<S::Handle>,
    generation: u64,
    period: Duration,
}

impl<S: Scheduler> Countdown<S> {
    pub fn with_period(scheduler: S, period: Duration) -> Self {
        Self {
            duration: None,
            time_left: 0,
            is_active: false,
            is_paused: false,
            finished: false,
            scheduler,
            ticker: None,
            generation: 0,
            period,
        }
    }

    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    pub fn time_left(&self) -> u64 {
        self.time_left
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Whether a periodic trigger is currently live
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn phase(&self) -> Phase {
        if self.is_active {
            Phase::Running
        } else if self.is_paused {
            Phase::Paused
        } else if self.finished && self.time_left == 0 {
            Phase::Finished
        } else if self.time_left > 0 {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    /// "Resume" while paused, "Start" otherwise
    pub fn start_label(&self) -> &'static str {
        if self.is_paused {
            "Resume"
        } else {
            "Start"
        }
    }

    /// Remaining time as `MM:SS`
    pub fn display(&self) -> String {
        format_time(self.time_left)
    }

    /// Store the parsed value of the duration field
    pub fn input_changed(&mut self, text: &str) {
        self.duration = parse_duration(text);
    }

    /// Store a duration directly (CLI and config pre-fill)
    pub fn set_input(&mut self, duration: Option<u64>) {
        self.duration = duration.filter(|d| *d > 0);
    }

    /// Commit the entered duration. Silently ignored while unset.
    pub fn set_duration(&mut self) {
        let Some(duration) = self.duration.filter(|d| *d > 0) else {
            return;
        };
        self.time_left = duration;
        self.is_active = false;
        self.is_paused = false;
        self.finished = false;
        tracing::info!(duration, "duration set");
        self.sync_ticker();
    }

    pub fn start(&mut self) {
        if self.time_left == 0 {
            return;
        }
        let resumed = self.is_paused;
        self.is_active = true;
        self.is_paused = false;
        tracing::info!(time_left = self.time_left, resumed, "countdown started");
        self.sync_ticker();
    }

    pub fn pause(&mut self) {
        if !self.is_active {
            return;
        }
        self.is_paused = true;
        self.is_active = false;
        tracing::info!(time_left = self.time_left, "countdown paused");
        self.sync_ticker();
    }

    pub fn reset(&mut self) {
        self.is_active = false;
        self.is_paused = false;
        self.finished = false;
        self.time_left = self.duration.unwrap_or(0);
        tracing::info!(time_left = self.time_left, "countdown reset");
        self.sync_ticker();
    }

    /// Apply one firing of the periodic trigger
    pub fn tick(&mut self, tick: Tick) -> TickOutcome {
        if self.ticker.is_none() || tick.generation != self.generation {
            tracing::debug!(generation = tick.generation, "stale tick ignored");
            return TickOutcome::Ignored;
        }

        if self.time_left <= 1 {
            self.time_left = 0;
            self.is_active = false;
            self.finished = true;
            self.ensure_stopped();
            tracing::info!("countdown finished");
            return TickOutcome::Finished;
        }

        self.time_left -= 1;
        TickOutcome::Decremented
    }

    /// A tick as the live handle would deliver it
    #[cfg(test)]
    pub(crate) fn live_tick(&self) -> Tick {
        Tick {
            generation: self.generation,
        }
    }

    fn sync_ticker(&mut self) {
        if self.is_active && !self.is_paused {
            self.ensure_running();
        } else {
            self.ensure_stopped();
        }
    }

    /// Start a trigger unless one is already live
    fn ensure_running(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        self.generation += 1;
        self.ticker = Some(self.scheduler.schedule(self.period, self.generation));
    }

    /// Release the live trigger, if any
    fn ensure_stopped(&mut self) {
        self.ticker = None;
    }
}

/// Format seconds as zero-padded `MM:SS`
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Parse the duration field.
///
/// Returns `None` (unset) for empty, non-numeric, zero or negative input.
/// Fractions are truncated to whole seconds; anything below one second is unset.
/// Zero is deliberately indistinguishable from an empty field.
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(secs) = text.parse::<u64>() {
        return (secs > 0).then_some(secs);
    }

    let value = text.parse::<f64>().ok()?;
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    Some(value.trunc().min(u64::MAX as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::ticker::manual::ManualScheduler;
    use super::*;

    fn countdown() -> (Countdown<ManualScheduler>, ManualScheduler) {
        let scheduler = ManualScheduler::default();
        (Countdown::with_period(scheduler.clone(), TICK_PERIOD), scheduler)
    }

    fn fire(c: &mut Countdown<ManualScheduler>, n: usize) {
        for _ in 0..n {
            let generation = c.generation;
            c.tick(Tick { generation });
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(5), "00:05");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(3599), "59:59");
        assert_eq!(format_time(6000), "100:00");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("65"), Some(65));
        assert_eq!(parse_duration(" 30 "), Some(30));
        assert_eq!(parse_duration("007"), Some(7));
        assert_eq!(parse_duration("2.9"), Some(2));
        assert_eq!(parse_duration("1e2"), Some(100));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("0.5"), None);
        assert_eq!(parse_duration("-5"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("NaN"), None);
    }

    #[test]
    fn test_set_duration_displays_formatted_value() {
        for d in [1u64, 59, 60, 61, 125, 3600] {
            let (mut c, _) = countdown();
            c.input_changed(&d.to_string());
            c.set_duration();
            assert_eq!(c.display(), format!("{:02}:{:02}", d / 60, d % 60));
            assert_eq!(c.phase(), Phase::Ready);
        }
    }

    #[test]
    fn test_empty_duration_set_is_noop() {
        let (mut c, sched) = countdown();
        c.input_changed("");
        c.set_duration();
        assert_eq!(c.display(), "00:00");
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(sched.scheduled(), 0);
    }

    #[test]
    fn test_start_at_zero_is_noop() {
        let (mut c, sched) = countdown();
        c.start();
        assert!(!c.is_active());
        assert_eq!(sched.live(), 0);
    }

    #[test]
    fn test_pause_when_inactive_is_noop() {
        let (mut c, _) = countdown();
        c.input_changed("10");
        c.set_duration();
        c.pause();
        assert!(!c.is_paused());
        assert_eq!(c.phase(), Phase::Ready);
    }

    #[test]
    fn test_full_scenario() {
        let (mut c, sched) = countdown();
        c.input_changed("65");
        c.set_duration();
        assert_eq!(c.display(), "01:05");

        c.start();
        assert_eq!(c.phase(), Phase::Running);
        assert_eq!(sched.live(), 1);
        fire(&mut c, 5);
        assert_eq!(c.display(), "01:00");

        c.pause();
        assert_eq!(c.start_label(), "Resume");
        assert_eq!(sched.live(), 0);
        fire(&mut c, 10);
        assert_eq!(c.display(), "01:00");

        c.start();
        assert_eq!(c.start_label(), "Start");
        fire(&mut c, 60);
        assert_eq!(c.display(), "00:00");
        assert_eq!(c.phase(), Phase::Finished);
        assert_eq!(sched.live(), 0);
    }

    #[test]
    fn test_last_tick_releases_handle() {
        let (mut c, sched) = countdown();
        c.input_changed("1");
        c.set_duration();
        c.start();
        assert!(c.is_ticking());

        let outcome = c.tick(Tick { generation: c.generation });
        assert_eq!(outcome, TickOutcome::Finished);
        assert_eq!(c.time_left(), 0);
        assert!(!c.is_ticking());
        assert!(!c.is_active());
        assert_eq!(sched.live(), 0);
        assert_eq!(c.display(), "00:00");

        // Further ticks never go below zero
        assert_eq!(c.tick(Tick { generation: c.generation }), TickOutcome::Ignored);
        assert_eq!(c.time_left(), 0);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let (mut c, _) = countdown();
        c.input_changed("10");
        c.set_duration();
        c.start();
        let old = c.generation;
        c.pause();
        c.start();

        assert_eq!(c.tick(Tick { generation: old }), TickOutcome::Ignored);
        assert_eq!(c.time_left(), 10);
        assert_eq!(c.tick(Tick { generation: c.generation }), TickOutcome::Decremented);
        assert_eq!(c.time_left(), 9);
    }

    #[test]
    fn test_at_most_one_live_handle() {
        let (mut c, sched) = countdown();
        c.input_changed("30");
        c.set_duration();
        c.start();
        c.start();
        c.start();
        assert_eq!(sched.live(), 1);
        assert_eq!(sched.scheduled(), 1);

        c.pause();
        c.start();
        c.input_changed("40");
        c.set_duration();
        assert_eq!(sched.live(), 0);
        c.start();
        c.reset();
        assert_eq!(sched.live(), 0);
    }

    #[test]
    fn test_reset_returns_to_duration() {
        let (mut c, _) = countdown();
        c.input_changed("90");
        c.set_duration();
        c.start();
        fire(&mut c, 30);
        assert_eq!(c.display(), "01:00");

        c.reset();
        assert_eq!(c.display(), "01:30");
        assert!(!c.is_active());
        assert!(!c.is_paused());
    }

    #[test]
    fn test_reset_uses_current_input_not_committed_value() {
        let (mut c, _) = countdown();
        c.input_changed("90");
        c.set_duration();
        c.input_changed("20");
        c.reset();
        assert_eq!(c.display(), "00:20");
    }

    #[test]
    fn test_reset_with_unset_duration_shows_zero() {
        let (mut c, _) = countdown();
        c.input_changed("45");
        c.set_duration();
        c.input_changed("0");
        c.reset();
        assert_eq!(c.display(), "00:00");
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_set_duration_while_running_stops() {
        let (mut c, sched) = countdown();
        c.input_changed("20");
        c.set_duration();
        c.start();
        fire(&mut c, 3);

        c.input_changed("50");
        c.set_duration();
        assert_eq!(c.display(), "00:50");
        assert_eq!(c.phase(), Phase::Ready);
        assert_eq!(sched.live(), 0);
    }

    #[test]
    fn test_dropping_countdown_releases_handle() {
        let (mut c, sched) = countdown();
        c.input_changed("20");
        c.set_duration();
        c.start();
        assert_eq!(sched.live(), 1);
        drop(c);
        assert_eq!(sched.live(), 0);
    }
}
