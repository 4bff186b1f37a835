//! Dashboard state and the event handler that owns every mutation of it.
//!
//! The runtime feeds events in one at a time and carries out the returned
//! commands; nothing else touches the state.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::event::{Command, Event};
use crate::messages::MessageTimer;
use crate::reconcile::{apply_resolved, reconcile};
use crate::scheduler::{Outcome, Scheduler};
use crate::source::SourceError;
use crate::touch::TouchFlow;

pub const COPIED: &str = "Copied!";
pub const TOUCH_PENDING: &str = "[Touch Key]";
pub const TOUCH_FAILED: &str = "Touch failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Confirm,
}

impl Action {
    pub fn from_key(key: &KeyEvent) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::Down),
            KeyCode::Enter | KeyCode::Char('c') => Some(Action::Confirm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub notice: Duration,
    pub touch_pending: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            notice: Duration::from_secs(3),
            touch_pending: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct App {
    accounts: Vec<Account>,
    cursor: usize,
    messages: MessageTimer,
    touch: TouchFlow,
    scheduler: Scheduler,
    timings: Timings,
    last_error: Option<String>,
    loaded: bool,
}

impl App {
    pub fn new(period: u64, timings: Timings) -> Self {
        App {
            accounts: Vec::new(),
            cursor: 0,
            messages: MessageTimer::default(),
            touch: TouchFlow::default(),
            scheduler: Scheduler::new(period),
            timings,
            last_error: None,
            loaded: false,
        }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&Account> {
        self.accounts.get(self.cursor)
    }

    pub fn message(&self, identity: &str) -> Option<&str> {
        self.messages.get(identity)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether any poll has succeeded yet.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Touch requests still waiting on the key.
    pub fn touches_pending(&self) -> usize {
        self.touch.pending()
    }

    /// Commands to run at startup: an immediate first poll.
    pub fn init(&self) -> Vec<Command> {
        vec![Command::SchedulePoll(self.scheduler.first_delay())]
    }

    pub fn update(&mut self, event: Event, now: OffsetDateTime) -> Vec<Command> {
        match event {
            Event::Key(key) => match Action::from_key(&key) {
                Some(action) => self.act(action),
                None => Vec::new(),
            },
            Event::Resize { width, height } => {
                debug!(width, height, "terminal resized");
                Vec::new()
            }
            Event::Tick => Vec::new(),
            Event::PollDue => {
                if self.scheduler.begin_poll() {
                    vec![Command::Poll]
                } else {
                    Vec::new()
                }
            }
            Event::Polled(result) => self.on_polled(result, now),
            Event::Touched { identity, result } => self.on_touched(identity, result),
            Event::MessageExpired {
                identity,
                generation,
            } => {
                self.messages.expire(&identity, generation);
                Vec::new()
            }
        }
    }

    pub fn act(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Quit => vec![Command::Quit],
            Action::Up => {
                self.move_cursor(-1);
                Vec::new()
            }
            Action::Down => {
                self.move_cursor(1);
                Vec::new()
            }
            Action::Confirm => self.confirm(),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.accounts.len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = (self.cursor as isize + delta).rem_euclid(len as isize) as usize;
    }

    fn confirm(&mut self) -> Vec<Command> {
        let Some(account) = self.accounts.get(self.cursor) else {
            return Vec::new();
        };
        let identity = account.identity.clone();

        if account.requires_touch {
            if !self.touch.begin(&identity) {
                return Vec::new();
            }
            let ticket = self
                .messages
                .show(&identity, TOUCH_PENDING, self.timings.touch_pending);
            return vec![
                Command::ScheduleClear(ticket),
                Command::RequestTouch(identity),
            ];
        }

        let code = account.code.clone();
        let ticket = self.messages.show(&identity, COPIED, self.timings.notice);
        vec![Command::Copy(code), Command::ScheduleClear(ticket)]
    }

    fn on_polled(
        &mut self,
        result: Result<Vec<Account>, SourceError>,
        now: OffsetDateTime,
    ) -> Vec<Command> {
        let outcome = match result {
            Ok(polled) => {
                self.accounts = reconcile(&self.accounts, polled);
                self.clamp_cursor();
                self.last_error = None;
                if !self.loaded {
                    info!(accounts = self.accounts.len(), "first listing loaded");
                }
                self.loaded = true;
                Outcome::Merged
            }
            Err(err) => {
                warn!("poll failed, keeping previous list: {err}");
                self.last_error = Some(err.to_string());
                Outcome::Failed
            }
        };

        vec![Command::SchedulePoll(self.scheduler.finish(outcome, now))]
    }

    fn on_touched(
        &mut self,
        identity: String,
        result: Result<Account, SourceError>,
    ) -> Vec<Command> {
        self.touch.finish(&identity);

        match result {
            Ok(resolved) => {
                let code = resolved.code.clone();
                if !apply_resolved(&mut self.accounts, &resolved) {
                    warn!(identity = %identity, "touched account is no longer listed");
                }
                self.messages.clear(&identity);
                vec![Command::CancelClear(identity), Command::Copy(code)]
            }
            Err(err) => {
                warn!(identity = %identity, "touch request failed: {err}");
                let ticket = self.messages.show(&identity, TOUCH_FAILED, self.timings.notice);
                vec![Command::ScheduleClear(ticket)]
            }
        }
    }

    fn clamp_cursor(&mut self) {
        if self.accounts.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.accounts.len() {
            self.cursor = self.accounts.len() - 1;
        }
    }
}
