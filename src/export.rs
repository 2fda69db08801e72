use anyhow::Context as _;

use crate::chrome::{ChromeDriver, ChromeOptions};
use crate::cli::{Cli, LoginMode};
use crate::driver::Driver;
use crate::error::{ExportError, Result};
use crate::fetch::EntryFetcher;
use crate::layout::PageLayout;
use crate::listing::{DEFAULT_MAX_PAGES, Paginator};
use crate::login::{CredentialLogin, Login, LoginMethod, ManualLogin};
use crate::resume_store::ResumeStore;
use crate::retry::RetryPolicy;
use crate::session::SessionGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records already in the store when the run started.
    pub existing: usize,
    pub added: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.existing + self.added
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub base_url: String,
    pub journal_id: String,
    pub max_pages: u32,
    pub retry: RetryPolicy,
}

impl ExportSettings {
    pub fn new(base_url: impl Into<String>, journal_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            journal_id: journal_id.into(),
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Drives one export run: every listed entry not yet in the store is fetched
/// and appended, in listing order.
pub struct Pipeline<'a, D: Driver> {
    gateway: &'a SessionGateway<D>,
    store: &'a mut ResumeStore,
    settings: &'a ExportSettings,
    state: RunState,
}

impl<'a, D: Driver> Pipeline<'a, D> {
    pub fn new(
        gateway: &'a SessionGateway<D>,
        store: &'a mut ResumeStore,
        settings: &'a ExportSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            settings,
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let outcome = self.drive().await;
        self.state = match &outcome {
            Ok(_) => RunState::Done,
            Err(err) => {
                tracing::error!(kind = err.kind(), %err, "export failed");
                RunState::Failed
            }
        };
        outcome
    }

    async fn drive(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary {
            existing: self.store.len(),
            ..RunSummary::default()
        };

        let mut listing = Paginator::new(
            self.gateway,
            self.settings.base_url.clone(),
            self.settings.journal_id.clone(),
        )
        .with_retry(self.settings.retry)
        .with_max_pages(self.settings.max_pages);
        let fetcher = EntryFetcher::new(self.gateway).with_retry(self.settings.retry);

        while let Some(reference) = listing.next_reference().await? {
            let entry_id = reference.entry_id();
            if self.store.contains(entry_id) {
                tracing::info!(entry_id, "skipping entry which has already been fetched");
                summary.skipped += 1;
                continue;
            }

            tracing::info!(entry_id, "fetching entry");
            let record = fetcher.fetch(&reference).await?;
            self.store.append(record)?;
            summary.added += 1;
        }

        tracing::info!(
            total = summary.total(),
            added = summary.added,
            skipped = summary.skipped,
            "export finished"
        );
        Ok(summary)
    }
}

/// Logs in, then runs the pipeline.
pub async fn export_journal<D: Driver, L: Login>(
    gateway: &SessionGateway<D>,
    login: &L,
    store: &mut ResumeStore,
    settings: &ExportSettings,
) -> Result<RunSummary> {
    login.login(gateway).await?;
    Pipeline::new(gateway, store, settings).run().await
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let login = match cli.login_mode().context("check login options")? {
        LoginMode::Manual => LoginMethod::Manual(ManualLogin {
            base_url: cli.base_url.clone(),
        }),
        LoginMode::Credentials { email, password } => LoginMethod::Credentials(CredentialLogin {
            base_url: cli.base_url.clone(),
            email,
            password,
            timings: cli.load_timings(),
        }),
    };
    let settings = ExportSettings {
        base_url: cli.base_url.clone(),
        journal_id: cli.journal_id.clone(),
        max_pages: cli.max_pages,
        retry: cli.retry_policy(),
    };

    let mut store = ResumeStore::load(&cli.out).map_err(labelled)?;

    let options = ChromeOptions {
        headless: cli.headless,
        executable: cli.chrome.clone(),
    };
    let driver = ChromeDriver::launch(&options).await.map_err(labelled)?;
    let gateway = SessionGateway::new(driver, PageLayout::default(), cli.load_timings());

    let outcome = tokio::select! {
        outcome = export_journal(&gateway, &login, &mut store, &settings) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    if let Err(err) = gateway.into_driver().close().await {
        tracing::warn!(%err, "failed to close browser");
    }

    match outcome {
        Some(Ok(summary)) => {
            println!(
                "Total number of entries: {} (added {} new entries)",
                summary.total(),
                summary.added
            );
            Ok(())
        }
        Some(Err(err)) => Err(labelled(err)),
        None => anyhow::bail!(
            "interrupted after saving {} entries to {}; run again to resume",
            store.len(),
            store.path().display()
        ),
    }
}

fn labelled(err: ExportError) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(kind)
}
