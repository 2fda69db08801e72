use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::listing::DEFAULT_MAX_PAGES;
use crate::retry::RetryPolicy;
use crate::session::LoadTimings;

/// Export every entry of a Penzu journal to a CSV file, resuming where the
/// previous run stopped.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Journal ID to export (the number in `https://penzu.com/journals/<ID>/...`).
    #[arg(value_parser = parse_journal_id)]
    pub journal_id: String,

    /// CSV file holding exported entries; appended to on every run.
    #[arg(long, default_value = "penzu_entries.csv")]
    pub out: PathBuf,

    /// Log in with this email instead of logging in by hand.
    #[arg(long, conflicts_with = "manual_login")]
    pub email: Option<String>,

    /// Password for `--email`.
    #[arg(long, env = "PENZU_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Log in by hand in the browser window, then confirm on the terminal.
    #[arg(long)]
    pub manual_login: bool,

    /// Run the browser without a visible window.
    #[arg(long)]
    pub headless: bool,

    /// Browser executable (default: detect a local Chrome/Chromium).
    #[arg(long)]
    pub chrome: Option<PathBuf>,

    /// Site root.
    #[arg(long, default_value = "https://penzu.com", value_parser = parse_base_url)]
    pub base_url: String,

    /// Give up if the listing still has entries after this many pages.
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    /// Maximum wait for a page to finish loading.
    #[arg(long, default_value_t = 30)]
    pub load_timeout_secs: u64,

    /// Wait after navigation before checking whether the page finished loading.
    #[arg(long, default_value_t = 5000)]
    pub load_grace_ms: u64,

    /// Pause after a page finished loading.
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,

    /// Interval between load checks.
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,

    /// Attempts per page when elements go stale mid-read.
    #[arg(long, default_value_t = 3)]
    pub retry_attempts: u32,

    /// Pause between attempts.
    #[arg(long, default_value_t = 3000)]
    pub retry_backoff_ms: u64,
}

/// How the browser session gets authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMode {
    Manual,
    Credentials { email: String, password: String },
}

impl Cli {
    pub fn login_mode(&self) -> anyhow::Result<LoginMode> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok(LoginMode::Credentials {
                email: email.clone(),
                password: password.clone(),
            }),
            (Some(_), None) => {
                anyhow::bail!("--email requires --password (or PENZU_PASSWORD)")
            }
            (None, Some(_)) => {
                anyhow::bail!("--password (or PENZU_PASSWORD) requires --email")
            }
            (None, None) => Ok(LoginMode::Manual),
        }
    }

    pub fn load_timings(&self) -> LoadTimings {
        LoadTimings {
            grace: Duration::from_millis(self.load_grace_ms),
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            timeout: Duration::from_secs(self.load_timeout_secs),
            settle: Duration::from_millis(self.settle_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn parse_journal_id(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("journal id must be digits, got {raw:?}"));
    }
    Ok(raw.to_owned())
}

fn parse_base_url(raw: &str) -> Result<String, String> {
    let url = url::Url::parse(raw).map_err(|err| format!("invalid url {raw:?}: {err}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("base url must be http/https: {raw}"));
    }
    Ok(raw.trim_end_matches('/').to_owned())
}
