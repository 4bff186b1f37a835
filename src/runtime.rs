use crossterm::{
    event::{Event as TermEvent, EventStream},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app::App;
use crate::clipboard::Clipboard;
use crate::event::{Command, Event};
use crate::messages::ClearTimers;
use crate::source::CodeSource;
use crate::{touch, ui};

const REDRAW_EVERY: Duration = Duration::from_secs(1);

/// Carries out the commands returned by [`App::update`].
pub struct Executor {
    tx: UnboundedSender<Event>,
    source: Arc<dyn CodeSource>,
    clipboard: Box<dyn Clipboard>,
    clear_timers: ClearTimers,
    poll_timer: Option<JoinHandle<()>>,
}

impl Executor {
    pub fn new(
        tx: UnboundedSender<Event>,
        source: Arc<dyn CodeSource>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Executor {
            tx,
            source,
            clipboard,
            clear_timers: ClearTimers::default(),
            poll_timer: None,
        }
    }

    pub fn execute(&mut self, commands: Vec<Command>) -> ControlFlow<()> {
        for command in commands {
            match command {
                Command::Poll => self.poll(),
                Command::SchedulePoll(after) => self.schedule_poll(after),
                Command::RequestTouch(identity) => {
                    touch::spawn_request(Arc::clone(&self.source), identity, self.tx.clone())
                }
                Command::Copy(text) => self.clipboard.write(&text),
                Command::ScheduleClear(ticket) => self.clear_timers.schedule(ticket, self.tx.clone()),
                Command::CancelClear(identity) => self.clear_timers.cancel(&identity),
                Command::Quit => return ControlFlow::Break(()),
            }
        }
        ControlFlow::Continue(())
    }

    fn poll(&self) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let _ = tx.send(Event::Polled(source.poll()));
        });
    }

    fn schedule_poll(&mut self, after: Duration) {
        debug!(?after, "next refresh scheduled");
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Event::PollDue);
        });
        if let Some(old) = self.poll_timer.replace(handle) {
            old.abort();
        }
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.poll_timer.take() {
            handle.abort();
        }
    }
}

/// Run the dashboard until the user quits.
pub async fn run(
    mut app: App,
    source: Arc<dyn CodeSource>,
    clipboard: Box<dyn Clipboard>,
) -> anyhow::Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, source, clipboard).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    source: Arc<dyn CodeSource>,
    clipboard: Box<dyn Clipboard>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut executor = Executor::new(tx, source, clipboard);
    let mut keys = EventStream::new();
    let mut ticker = tokio::time::interval(REDRAW_EVERY);

    let _ = executor.execute(app.init());
    info!("dashboard started");

    loop {
        let now_unix = OffsetDateTime::now_utc().unix_timestamp();
        terminal.draw(|frame| ui::render(frame, app, now_unix))?;

        let event = tokio::select! {
            _ = ticker.tick() => Event::Tick,
            Some(event) = rx.recv() => event,
            maybe = keys.next() => match maybe {
                Some(Ok(TermEvent::Key(key))) => Event::Key(key),
                Some(Ok(TermEvent::Resize(width, height))) => Event::Resize { width, height },
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        };

        let commands = app.update(event, OffsetDateTime::now_utc());
        if executor.execute(commands).is_break() {
            break;
        }
    }

    executor.shutdown();
    info!("dashboard stopped");
    Ok(())
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::cursor::Hide)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, TOUCH_MARKER};
    use crate::app::{COPIED, TOUCH_PENDING, Timings};
    use crate::source::SourceError;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    const NOW: i64 = 1_700_000_000;

    struct FakeKey;

    impl CodeSource for FakeKey {
        fn poll(&self) -> Result<Vec<Account>, SourceError> {
            Ok(vec![
                Account::new("Google:alice", "123456", 30, NOW),
                Account::new("GitHub", TOUCH_MARKER, 30, NOW),
            ])
        }

        fn request_touch(&self, identity: &str) -> Result<Account, SourceError> {
            Ok(Account::new(identity, "654321", 30, NOW + 1))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Clipboard for Recorder {
        fn write(&mut self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    impl Recorder {
        fn writes(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn at() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(NOW).unwrap()
    }

    fn enter() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    fn harness() -> (App, Executor, UnboundedReceiver<Event>, Recorder) {
        let (tx, rx) = mpsc::unbounded_channel();
        let clipboard = Recorder::default();
        let executor = Executor::new(tx, Arc::new(FakeKey), Box::new(clipboard.clone()));
        (App::new(30, Timings::default()), executor, rx, clipboard)
    }

    /// Feed queued events back into the app until one of `wanted` is handled.
    async fn pump(
        app: &mut App,
        executor: &mut Executor,
        rx: &mut UnboundedReceiver<Event>,
        wanted: fn(&Event) -> bool,
    ) {
        loop {
            let event = rx.recv().await.expect("queue closed");
            let done = wanted(&event);
            let _ = executor.execute(app.update(event, at()));
            if done {
                return;
            }
        }
    }

    #[tokio::test]
    async fn touch_scenario_end_to_end() {
        let (mut app, mut executor, mut rx, clipboard) = harness();

        let _ = executor.execute(app.init());
        pump(&mut app, &mut executor, &mut rx, |e| matches!(e, Event::Polled(_))).await;
        assert_eq!(app.accounts().len(), 2);

        let _ = executor.execute(app.update(
            Event::Key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE)),
            at(),
        ));
        let _ = executor.execute(app.update(enter(), at()));
        assert_eq!(app.message("GitHub"), Some(TOUCH_PENDING));

        pump(&mut app, &mut executor, &mut rx, |e| matches!(e, Event::Touched { .. })).await;

        let github = app.selected().unwrap();
        assert_eq!(github.code, "654321");
        assert!(!github.requires_touch);
        assert_eq!(app.message("GitHub"), None);
        assert_eq!(clipboard.writes(), vec!["654321".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn copy_notice_disappears_after_duration() {
        let (mut app, mut executor, mut rx, clipboard) = harness();
        let _ = executor.execute(app.init());
        pump(&mut app, &mut executor, &mut rx, |e| matches!(e, Event::Polled(_))).await;

        let _ = executor.execute(app.update(enter(), at()));
        assert_eq!(app.message("Google:alice"), Some(COPIED));
        assert_eq!(clipboard.writes(), vec!["123456".to_string()]);

        let started = tokio::time::Instant::now();
        pump(&mut app, &mut executor, &mut rx, |e| {
            matches!(e, Event::MessageExpired { .. })
        })
        .await;

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(app.message("Google:alice"), None);
    }

    #[tokio::test]
    async fn quit_breaks_the_loop() {
        let (mut app, mut executor, _rx, _clipboard) = harness();
        let quit = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(executor.execute(app.update(quit, at())).is_break());
    }
}
