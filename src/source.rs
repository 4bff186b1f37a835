use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

use crate::account::{Account, now_unix, parse_line, parse_snapshot};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("no accounts in key listing ({skipped} lines skipped)")]
    NoAccounts { skipped: usize },
    #[error("could not read a code for {identity} from touch response")]
    TouchResponse { identity: String },
}

/// Where OTP codes come from.
///
/// Both calls block: `request_touch` only returns after the key was touched
/// (or the tool gave up), so callers run them off the event loop.
pub trait CodeSource: Send + Sync + 'static {
    fn poll(&self) -> Result<Vec<Account>, SourceError>;
    fn request_touch(&self, identity: &str) -> Result<Account, SourceError>;
}

/// `ykman oath accounts code`.
#[derive(Debug, Clone)]
pub struct Ykman {
    program: String,
    device: Option<String>,
    period: u64,
}

impl Ykman {
    pub fn new(program: impl Into<String>, device: Option<String>, period: u64) -> Self {
        Ykman {
            program: program.into(),
            device,
            period,
        }
    }

    fn args<'a>(&'a self, identity: Option<&'a str>) -> Vec<&'a str> {
        let mut args = Vec::new();
        if let Some(device) = self.device.as_deref() {
            args.extend(["--device", device]);
        }
        args.extend(["oath", "accounts", "code"]);
        if let Some(identity) = identity {
            args.push(identity);
        }
        args
    }

    fn run(&self, identity: Option<&str>) -> Result<String, SourceError> {
        let args = self.args(identity);
        debug!(program = %self.program, ?args, "running code source");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CodeSource for Ykman {
    fn poll(&self) -> Result<Vec<Account>, SourceError> {
        // Stamp at invocation so tool latency does not shift `time_remaining`.
        let invoked_at = now_unix();
        let stdout = self.run(None)?;
        let snapshot = parse_snapshot(&stdout, self.period, invoked_at);

        if snapshot.accounts.is_empty() {
            return Err(SourceError::NoAccounts {
                skipped: snapshot.skipped.len(),
            });
        }
        if !snapshot.skipped.is_empty() {
            warn!(skipped = snapshot.skipped.len(), "some listing lines were ignored");
        }

        Ok(snapshot.accounts)
    }

    fn request_touch(&self, identity: &str) -> Result<Account, SourceError> {
        let stdout = self.run(Some(identity))?;
        parse_touch_output(&stdout, identity, self.period, now_unix())
    }
}

/// Pick the resolved code out of a touch response.
///
/// Prefers a line naming `identity`; falls back to the first usable line.
pub fn parse_touch_output(
    output: &str,
    identity: &str,
    period: u64,
    now_unix: i64,
) -> Result<Account, SourceError> {
    let parsed: Vec<Account> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_line(line, period, now_unix).ok())
        .filter(|account| !account.requires_touch)
        .collect();

    let mut resolved = parsed
        .iter()
        .find(|account| account.identity == identity)
        .or_else(|| parsed.first())
        .cloned()
        .ok_or_else(|| SourceError::TouchResponse {
            identity: identity.to_string(),
        })?;

    if resolved.identity != identity {
        debug!(asked = identity, got = %resolved.identity, "touch response named another account");
        resolved = Account::new(identity, &resolved.code, period, now_unix);
    }

    Ok(resolved)
}
