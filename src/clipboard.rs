use copypasta::{ClipboardContext, ClipboardProvider};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to initialize clipboard: {0}")]
    Init(String),
}

/// Best-effort clipboard. Write failures never reach the user.
pub trait Clipboard {
    fn write(&mut self, text: &str);
}

/// System clipboard through copypasta, mirrored to `wl-copy` on Wayland.
///
/// Must be written to from inside the tokio runtime.
pub struct SystemClipboard {
    ctx: ClipboardContext,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let ctx = ClipboardContext::new().map_err(|e| ClipboardError::Init(e.to_string()))?;
        Ok(SystemClipboard { ctx })
    }
}

impl Clipboard for SystemClipboard {
    fn write(&mut self, text: &str) {
        if let Err(e) = self.ctx.set_contents(text.to_string()) {
            debug!("clipboard write failed: {e}");
        }

        // X11 contexts do not reach native Wayland apps.
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            drop(spawn_helper("wl-copy", &[], text.to_string()));
        }
    }
}

/// Run a clipboard helper on the blocking pool; the caller never waits on it.
fn spawn_helper(
    program: &'static str,
    args: &'static [&'static str],
    value: String,
) -> JoinHandle<io::Result<()>> {
    tokio::task::spawn_blocking(move || {
        let result = feed_helper(program, args, &value);
        if let Err(e) = &result {
            debug!("{program} failed: {e}");
        }
        result
    })
}

/// Write `value` to the helper's stdin, then reap it whatever the write did.
fn feed_helper(program: &str, args: &[&str], value: &str) -> io::Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Dropping stdin closes it, so the helper sees EOF before the wait.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(value.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;

    if !status.success() {
        return Err(io::Error::other(format!("{program} exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn missing_helper_is_an_error() {
        assert!(feed_helper("otpdash-test-no-such-binary", &[], "123456").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn feeds_value_to_helper() {
        assert!(feed_helper("sh", &["-c", "read v; test \"$v\" = 123456"], "123456\n").is_ok());
        assert!(feed_helper("sh", &["-c", "read v; test \"$v\" = 000000"], "123456\n").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn helper_that_stops_reading_is_reaped() {
        // More than a pipe buffer, so the write fails once the helper is gone.
        let value = "0".repeat(1 << 20);
        let err = feed_helper("sh", &["-c", "exit 0"], &value).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_helper_does_not_block_caller() {
        let started = Instant::now();
        let handle = spawn_helper("sh", &["-c", "sleep 1; cat >/dev/null"], "123456".into());
        assert!(started.elapsed() < Duration::from_millis(500));

        handle.await.unwrap().unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
