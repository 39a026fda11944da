//! `camdeck`: terminal console for industrial camera consoles.
//!
//! Built on [ratatui](https://ratatui.rs) on top of `camdeck-core`'s view
//! controller. Two screens: the camera list and a camera's detail with its
//! feature readings, saved profiles, and live feed status.
//!
//! Logs are written to a file (default `/tmp/camdeck.log`) to avoid
//! corrupting the terminal UI. A background data bridge forwards
//! view-model, frame, and session changes into the TUI action loop.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screen;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use camdeck_core::{Console, ConsoleConfig, TlsVerification};

use crate::app::App;

/// Browse cameras, apply saved profiles, and watch live feeds.
#[derive(Parser, Debug)]
#[command(name = "camdeck", version, about)]
struct Cli {
    /// Console base URL (e.g., http://10.0.0.2:8000). Overrides the profile.
    #[arg(short = 'u', long, env = "CAMDECK_URL")]
    url: Option<String>,

    /// Config profile to use (defaults to the config's default_profile)
    #[arg(short = 'p', long)]
    profile: Option<String>,

    /// Anti-forgery token for mutating requests
    #[arg(long, env = "CAMDECK_CSRF_TOKEN", hide_env_values = true)]
    csrf_token: Option<String>,

    /// Store --csrf-token in the system keyring for the selected profile
    #[arg(long, requires = "csrf_token")]
    remember_token: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Log file path (defaults to /tmp/camdeck.log)
    #[arg(long, default_value = "/tmp/camdeck.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. Nothing may be logged to stdout/stderr
/// while the terminal is in raw mode. The returned guard flushes on drop.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "camdeck={log_level},camdeck_core={log_level},camdeck_api={log_level}"
        ))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("camdeck.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Resolve the console config. Priority: CLI flags > config profile.
fn build_console_config(cli: &Cli) -> Result<(String, ConsoleConfig)> {
    let cfg = camdeck_config::load_config_or_default();

    let (profile_name, mut config) = if let Some(raw) = cli.url.as_deref() {
        let url: Url = raw
            .parse()
            .wrap_err_with(|| format!("invalid console URL: {raw}"))?;
        let name = cli
            .profile
            .clone()
            .or_else(|| cfg.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        let mut config = ConsoleConfig::new(url);
        config.timeout = Duration::from_secs(cfg.defaults.timeout);
        if cfg.defaults.insecure {
            config.tls = TlsVerification::DangerAcceptInvalid;
        }
        (name, config)
    } else {
        let (name, profile) = cfg.profile(cli.profile.as_deref()).map_err(|e| {
            eyre!(
                "{e}; pass --url or add a profile to {}",
                camdeck_config::config_path().display()
            )
        })?;
        let config = camdeck_config::profile_to_console_config(profile, name, &cfg.defaults)?;
        (name.to_owned(), config)
    };

    if let Some(token) = &cli.csrf_token {
        config.csrf_token = Some(SecretString::from(token.clone()));
    }
    if cli.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    Ok((profile_name, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks go in before the terminal is touched
    tui::install_hooks()?;

    let _log_guard = setup_tracing(&cli);

    let (profile_name, config) = build_console_config(&cli)?;
    info!(
        url = %config.url,
        profile = %profile_name,
        "starting camdeck"
    );

    if cli.remember_token {
        if let Some(token) = &cli.csrf_token {
            match camdeck_config::store_csrf_token(&profile_name, token) {
                Ok(()) => info!(profile = %profile_name, "token stored in keyring"),
                Err(e) => warn!(profile = %profile_name, error = %e, "could not store token"),
            }
        }
    }

    let console = Console::connect(&config)
        .await
        .wrap_err_with(|| format!("cannot reach console at {}", config.url))?;

    let mut app = App::new(console);
    app.run().await?;

    Ok(())
}
