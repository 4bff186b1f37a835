mod account;
mod app;
mod clipboard;
mod config;
mod event;
mod messages;
mod reconcile;
mod runtime;
mod scheduler;
mod source;
mod touch;
mod ui;

use crate::account::now_unix;
use crate::app::{App, Timings};
use crate::clipboard::SystemClipboard;
use crate::config::{Config, DEVICE_ENV, config_path, save_config};
use crate::source::{CodeSource, Ykman};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "otpdash", version, about = "OTP codes from your YubiKey in the terminal")]
struct Cli {
    /// Config file (default: <config dir>/otpdash/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial of the key to use when several are plugged in
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive dashboard (default)
    Watch,

    /// Print current codes once
    ///
    /// Examples:
    ///   otpdash list
    ///   otpdash list --json
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = match cli.config {
        Some(ref p) => p.clone(),
        None => config_path()?,
    };
    let mut config = load_config(&path, Config::default().log_path().ok())?;
    config.resolve_device(cli.device, std::env::var(DEVICE_ENV).ok());

    init_logging(config.log_path().ok());

    let result = match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => cmd_watch(&config),
        Commands::List { json } => cmd_list(&config, json),
        Commands::Init => cmd_init(&path),
    };

    if let Err(ref e) = result {
        error!("{e:#}");
    }
    result
}

/// Load the config; a bad file is logged to `fallback_log` before bailing out.
fn load_config(path: &Path, fallback_log: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load(path).inspect_err(|e| {
        init_logging(fallback_log);
        error!("{e:#}");
    })
}

fn init_logging(log_path: Option<PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    // The terminal belongs to the dashboard, so never log to stdout.
    match file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .try_init();
        }
    }
}

fn code_source(config: &Config) -> Ykman {
    Ykman::new(config.ykman.clone(), config.device.clone(), config.period)
}

fn cmd_watch(config: &Config) -> anyhow::Result<()> {
    let clipboard = SystemClipboard::new()?;
    let source: Arc<dyn CodeSource> = Arc::new(code_source(config));
    let app = App::new(
        config.period,
        Timings {
            notice: config.notice(),
            touch_pending: config.touch_pending(),
        },
    );

    info!(device = ?config.device, period = config.period, "starting dashboard");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let result = rt.block_on(runtime::run(app, source, Box::new(clipboard)));

    // Touch requests still blocked on the key must not keep us alive.
    rt.shutdown_background();
    result
}

fn cmd_list(config: &Config, json: bool) -> anyhow::Result<()> {
    let accounts = code_source(config).poll()?;

    if json {
        let s = serde_json::to_string_pretty(&accounts)?;
        println!("{s}");
        return Ok(());
    }

    let now = now_unix();
    let width = accounts
        .iter()
        .map(|a| a.identity.chars().count())
        .max()
        .unwrap_or(0);
    for account in &accounts {
        println!(
            "{:<width$}  {:>16}  {}",
            account.identity,
            account.code,
            account.duration_label(now)
        );
    }

    Ok(())
}

fn cmd_init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        println!("Config already exists at: {}", path.display());
        return Ok(());
    }

    save_config(&Config::default(), path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
