use regex_lite::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

/// Period used when the key does not tell us otherwise.
pub const DEFAULT_PERIOD: u64 = 30;

/// Placeholder printed by the key instead of a code for touch-gated accounts.
pub const TOUCH_MARKER: &str = "[Requires Touch]";

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*\S)\s+(\d+|\[Requires Touch\])\s*$").expect("account line pattern is valid")
});

/// One OATH credential slot on the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// `issuer[:label]` exactly as the key prints it. Unique per snapshot.
    pub identity: String,
    pub issuer: String,
    pub label: String,
    pub code: String,
    pub requires_touch: bool,
    pub period: u64,
    /// Seconds left in the period at the moment this entry was observed.
    pub time_remaining: u64,
}

impl Account {
    pub fn new(identity: &str, code: &str, period: u64, now_unix: i64) -> Self {
        let (issuer, label) = match identity.split_once(':') {
            Some((issuer, label)) => (issuer, label),
            None => (identity, ""),
        };
        let period = if period == 0 { DEFAULT_PERIOD } else { period };

        Account {
            identity: identity.to_string(),
            issuer: issuer.to_string(),
            label: label.to_string(),
            code: code.to_string(),
            requires_touch: code == TOUCH_MARKER,
            period,
            time_remaining: time_remaining(period, now_unix),
        }
    }

    /// Seconds until this account's code rotates, recomputed for `now_unix`.
    pub fn remaining_at(&self, now_unix: i64) -> u64 {
        time_remaining(self.period, now_unix)
    }

    /// `(NN)` countdown shown next to the code.
    pub fn duration_label(&self, now_unix: i64) -> String {
        format!("({:02})", self.remaining_at(now_unix))
    }
}

pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// `period - now mod period`, always in `1..=period`.
pub fn time_remaining(period: u64, now_unix: i64) -> u64 {
    let period = period.max(1) as i64;
    (period - now_unix.rem_euclid(period)) as u64
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line does not look like `<name> <code>`: {0:?}")]
    Malformed(String),
}

/// Parse one `issuer[:label]   code|[Requires Touch]` line.
pub fn parse_line(line: &str, period: u64, now_unix: i64) -> Result<Account, ParseError> {
    let caps = LINE_RE
        .captures(line)
        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;

    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let code = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    Ok(Account::new(name, code, period, now_unix))
}

/// Result of parsing a full listing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub accounts: Vec<Account>,
    /// Lines that were not blank but could not be used.
    pub skipped: Vec<String>,
}

/// Parse the whole listing, skipping blank lines, malformed lines and
/// repeated identities instead of failing the batch.
pub fn parse_snapshot(output: &str, period: u64, now_unix: i64) -> Snapshot {
    let mut snapshot = Snapshot::default();
    let mut seen = HashSet::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line, period, now_unix) {
            Ok(account) => {
                if seen.insert(account.identity.clone()) {
                    snapshot.accounts.push(account);
                } else {
                    warn!(identity = %account.identity, "duplicate account in listing, skipped");
                    snapshot.skipped.push(line.to_string());
                }
            }
            Err(err) => {
                warn!("{err}");
                snapshot.skipped.push(line.to_string());
            }
        }
    }

    snapshot
}
