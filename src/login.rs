use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use crate::driver::Driver;
use crate::error::{ExportError, Result};
use crate::session::{LoadTimings, SessionGateway};

/// Authentication step awaited once before the export starts.
#[async_trait]
pub trait Login: Send + Sync {
    async fn login<D: Driver>(&self, gateway: &SessionGateway<D>) -> Result<()>;
}

pub fn login_url(base_url: &str, login_path: &str) -> String {
    format!("{}{login_path}", base_url.trim_end_matches('/'))
}

/// Opens the login page and waits for the user to sign in by hand.
#[derive(Debug, Clone)]
pub struct ManualLogin {
    pub base_url: String,
}

#[async_trait]
impl Login for ManualLogin {
    async fn login<D: Driver>(&self, gateway: &SessionGateway<D>) -> Result<()> {
        let url = login_url(&self.base_url, &gateway.layout().login_path);
        gateway.visit(&url).await?;

        eprintln!("Log in at {url} in the browser window, then press Enter here...");
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| ())
        })
        .await
        .map_err(|err| ExportError::Login {
            message: format!("waiting for confirmation: {err}"),
        })?
        .map_err(|err| ExportError::Login {
            message: format!("read confirmation from stdin: {err}"),
        })?;

        tracing::info!("manual login confirmed");
        Ok(())
    }
}

/// Fills in the login form with the given credentials.
#[derive(Clone)]
pub struct CredentialLogin {
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub timings: LoadTimings,
}

impl std::fmt::Debug for CredentialLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLogin")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Login for CredentialLogin {
    async fn login<D: Driver>(&self, gateway: &SessionGateway<D>) -> Result<()> {
        let layout = gateway.layout();
        let url = login_url(&self.base_url, &layout.login_path);
        gateway.visit(&url).await?;

        let email = gateway.wait_for_one(&layout.login_email).await?;
        gateway.type_text(&email, &self.email).await?;
        let password = gateway.find_one(&layout.login_password).await?;
        gateway.type_text(&password, &self.password).await?;
        let submit = gateway.find_one(&layout.login_submit).await?;
        gateway.click(&submit).await?;

        let deadline = Instant::now() + self.timings.timeout;
        loop {
            let current = gateway.current_url().await?;
            if !current.contains(&layout.login_path) {
                gateway.wait_for_load(&current).await?;
                tracing::info!(email = %self.email, "logged in");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ExportError::Login {
                    message: format!(
                        "still on the login page after {:?}; check the credentials",
                        self.timings.timeout
                    ),
                });
            }
            sleep(self.timings.poll_interval).await;
        }
    }
}

/// Login strategy picked on the command line.
#[derive(Debug, Clone)]
pub enum LoginMethod {
    Manual(ManualLogin),
    Credentials(CredentialLogin),
}

#[async_trait]
impl Login for LoginMethod {
    async fn login<D: Driver>(&self, gateway: &SessionGateway<D>) -> Result<()> {
        match self {
            Self::Manual(login) => login.login(gateway).await,
            Self::Credentials(login) => login.login(gateway).await,
        }
    }
}
