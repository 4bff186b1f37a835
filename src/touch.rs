use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::event::Event;
use crate::source::CodeSource;

/// Tracks touch requests that are waiting on the key. At most one per account.
#[derive(Debug, Default)]
pub struct TouchFlow {
    in_flight: HashSet<String>,
}

impl TouchFlow {
    /// Mark `identity` as waiting. False if it already is.
    pub fn begin(&mut self, identity: &str) -> bool {
        let started = self.in_flight.insert(identity.to_string());
        if !started {
            debug!(identity, "touch already pending, trigger ignored");
        }
        started
    }

    pub fn finish(&mut self, identity: &str) {
        self.in_flight.remove(identity);
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

/// Ask the key for a touch-gated code on a blocking thread and post the
/// answer back as [`Event::Touched`]. No timeout: the key decides.
pub fn spawn_request(source: Arc<dyn CodeSource>, identity: String, tx: UnboundedSender<Event>) {
    info!(identity = %identity, "waiting for key touch");
    tokio::task::spawn_blocking(move || {
        let result = source.request_touch(&identity);
        let _ = tx.send(Event::Touched { identity, result });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::source::SourceError;
    use tokio::sync::mpsc;

    struct Gated;

    impl CodeSource for Gated {
        fn poll(&self) -> Result<Vec<Account>, SourceError> {
            Ok(Vec::new())
        }

        fn request_touch(&self, identity: &str) -> Result<Account, SourceError> {
            Ok(Account::new(identity, "654321", 30, 0))
        }
    }

    #[test]
    fn second_trigger_is_rejected_while_pending() {
        let mut flow = TouchFlow::default();
        assert!(flow.begin("GitHub"));
        assert!(!flow.begin("GitHub"));
        assert!(flow.begin("AWS"));

        flow.finish("GitHub");
        assert_eq!(flow.pending(), 1);
        assert!(flow.begin("GitHub"));
    }

    #[tokio::test]
    async fn result_arrives_as_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_request(Arc::new(Gated), "GitHub".into(), tx);

        match rx.recv().await {
            Some(Event::Touched { identity, result }) => {
                assert_eq!(identity, "GitHub");
                assert_eq!(result.unwrap().code, "654321");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
