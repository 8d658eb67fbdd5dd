use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;

use crate::config::AppConfig;
use crate::countdown::ticker::{Scheduler, Tick, TokioScheduler};
use crate::countdown::{Countdown, TickOutcome};

/// Longest duration the input field accepts, in digits
const MAX_INPUT_DIGITS: usize = 9;

/// Seconds a status message stays on the info line
const STATUS_SECONDS: u64 = 3;

/// Notification title and the message shown when time is up
pub const FINISHED_SUMMARY: &str = "Countdown Timer";
pub const FINISHED_BODY: &str = "Time's up!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Set,
    Start,
    Pause,
    Reset,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Input => Focus::Set,
            Focus::Set => Focus::Start,
            Focus::Start => Focus::Pause,
            Focus::Pause => Focus::Reset,
            Focus::Reset => Focus::Input,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Input => Focus::Reset,
            Focus::Set => Focus::Input,
            Focus::Start => Focus::Set,
            Focus::Pause => Focus::Start,
            Focus::Reset => Focus::Pause,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
}

pub struct App<S: Scheduler = TokioScheduler> {
    pub countdown: Countdown<S>,
    pub focus: Focus,
    pub popup: Popup,

    // Duration field text, mirrors the parsed duration
    pub input_buffer: String,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    pub notifications: bool,
}

impl<S: Scheduler> App<S> {
    /// Build the app. A `duration` given here is committed immediately;
    /// otherwise the config's default only pre-fills the input field.
    pub fn new(config: &AppConfig, scheduler: S, duration: Option<u64>) -> Self {
        let mut app = Self {
            countdown: Countdown::with_period(scheduler, config.tick_period()),
            focus: Focus::Input,
            popup: Popup::None,
            input_buffer: String::new(),
            status_message: None,
            status_message_time: None,
            notifications: config.notifications,
        };

        match duration {
            Some(secs) => {
                app.countdown.set_input(Some(secs));
                app.sync_input_buffer();
                app.countdown.set_duration();
                app.focus = Focus::Start;
            }
            None => {
                app.countdown.set_input(config.default_duration);
                app.sync_input_buffer();
            }
        }

        app
    }

    /// Set a status message (auto-clears after a few seconds)
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.popup != Popup::None {
            self.handle_popup_key(key);
            return;
        }

        match key.code {
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),

            // Digits always edit the duration field
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.focus = Focus::Input;
                if self.input_buffer.len() < MAX_INPUT_DIGITS {
                    self.input_buffer.push(c);
                    self.input_changed();
                }
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
                self.input_changed();
            }

            KeyCode::Enter => match self.focus {
                Focus::Input => self.activate(Focus::Set),
                focused => self.activate(focused),
            },
            KeyCode::Char(' ') if self.focus != Focus::Input => self.activate(self.focus),

            KeyCode::Char('s') => self.activate(Focus::Start),
            KeyCode::Char('p') => self.activate(Focus::Pause),
            KeyCode::Char('r') => self.activate(Focus::Reset),

            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,

            _ => {}
        }
    }

    fn handle_popup_key(&mut self, key: KeyEvent) {
        let close = matches!(
            key.code,
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')
        );
        if close {
            self.popup = Popup::None;
        }
    }

    /// Whether a key should quit the app rather than be dispatched
    pub fn is_quit_key(&self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => true,
            KeyCode::Char('q') | KeyCode::Esc => self.popup == Popup::None,
            _ => false,
        }
    }

    /// Press one of the buttons
    fn activate(&mut self, button: Focus) {
        match button {
            Focus::Input => {}
            Focus::Set => {
                if self.countdown.duration().is_some() {
                    self.countdown.set_duration();
                    self.set_status(format!("Duration set to {}", self.countdown.display()));
                }
            }
            Focus::Start => {
                if self.countdown.time_left() > 0 && !self.countdown.is_active() {
                    let resumed = self.countdown.is_paused();
                    self.countdown.start();
                    self.set_status(if resumed { "Resumed" } else { "Started" });
                }
            }
            Focus::Pause => {
                if self.countdown.is_active() {
                    self.countdown.pause();
                    self.set_status("Paused");
                }
            }
            Focus::Reset => {
                self.countdown.reset();
                self.set_status("Reset");
            }
        }
    }

    fn input_changed(&mut self) {
        self.countdown.input_changed(&self.input_buffer);
        self.sync_input_buffer();
    }

    // The field shows the stored duration, so "0" clears it
    fn sync_input_buffer(&mut self) {
        self.input_buffer = self
            .countdown
            .duration()
            .map(|d| d.to_string())
            .unwrap_or_default();
    }

    /// Deliver one tick from the scheduler
    pub fn on_tick(&mut self, tick: Tick) {
        if self.countdown.tick(tick) == TickOutcome::Finished {
            self.set_status(FINISHED_BODY);
            if self.notifications {
                notify_finished();
            }
        }
    }

    /// Periodic housekeeping, called once per loop iteration
    pub fn update(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_SECONDS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }
}

/// Desktop notification for a finished countdown. Failures are only logged.
pub fn notify_finished() {
    if let Err(e) = notify(FINISHED_SUMMARY, FINISHED_BODY) {
        tracing::warn!("Could not send notification: {}", e);
    }
}

fn notify(summary: &str, body: &str) -> anyhow::Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("alarm-symbolic")
        .show()?;
    Ok(())
}
