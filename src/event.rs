use crossterm::event::KeyEvent;
use std::time::Duration;

use crate::account::Account;
use crate::messages::ClearTicket;
use crate::source::SourceError;

/// Everything the dashboard reacts to. Handled one at a time, in arrival order.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    /// Once-a-second redraw so the countdown moves.
    Tick,
    /// The scheduler's wait elapsed.
    PollDue,
    Polled(Result<Vec<Account>, SourceError>),
    Touched {
        identity: String,
        result: Result<Account, SourceError>,
    },
    MessageExpired { identity: String, generation: u64 },
}

/// Side effects requested by the state machine, carried out by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Poll,
    SchedulePoll(Duration),
    RequestTouch(String),
    Copy(String),
    ScheduleClear(ClearTicket),
    CancelClear(String),
    Quit,
}
