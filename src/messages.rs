use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::event::Event;

/// A deferred clear for the message shown under `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearTicket {
    pub identity: String,
    pub generation: u64,
    pub after: Duration,
}

#[derive(Debug)]
struct Message {
    text: String,
    generation: u64,
}

/// Transient per-account status text ("Copied!", "[Touch Key]", ...).
///
/// Every `show` gets a fresh generation; an expiry only clears the message
/// it was issued for, so a late timer cannot erase a newer message.
#[derive(Debug, Default)]
pub struct MessageTimer {
    messages: HashMap<String, Message>,
    next_generation: u64,
}

impl MessageTimer {
    pub fn show(&mut self, identity: &str, text: impl Into<String>, duration: Duration) -> ClearTicket {
        self.next_generation += 1;
        let generation = self.next_generation;

        self.messages.insert(
            identity.to_string(),
            Message {
                text: text.into(),
                generation,
            },
        );

        ClearTicket {
            identity: identity.to_string(),
            generation,
            after: duration,
        }
    }

    pub fn clear(&mut self, identity: &str) -> bool {
        self.messages.remove(identity).is_some()
    }

    /// Clear on timer fire. Ignored unless `generation` is still current.
    pub fn expire(&mut self, identity: &str, generation: u64) -> bool {
        match self.messages.get(identity) {
            Some(message) if message.generation == generation => {
                self.messages.remove(identity);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, identity: &str) -> Option<&str> {
        self.messages.get(identity).map(|m| m.text.as_str())
    }
}

/// Outstanding clear timers, one per identity.
#[derive(Debug, Default)]
pub struct ClearTimers {
    handles: HashMap<String, JoinHandle<()>>,
}

impl ClearTimers {
    /// Start the timer for `ticket`, aborting any older one for the same account.
    pub fn schedule(&mut self, ticket: ClearTicket, tx: UnboundedSender<Event>) {
        let identity = ticket.identity.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ticket.after).await;
            let _ = tx.send(Event::MessageExpired {
                identity: ticket.identity,
                generation: ticket.generation,
            });
        });

        if let Some(old) = self.handles.insert(identity, handle) {
            old.abort();
        }
    }

    pub fn cancel(&mut self, identity: &str) {
        if let Some(handle) = self.handles.remove(identity) {
            handle.abort();
        }
    }
}
