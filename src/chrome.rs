use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use tokio::task::JoinHandle;

use crate::driver::Driver;
use crate::error::{ExportError, Result};

// CDP messages seen when a node or its execution context vanished under a re-render.
const STALE_MARKERS: &[&str] = &[
    "could not find node with given id",
    "no node with given id found",
    "node is detached from document",
    "node with given id does not belong to the document",
    "cannot find context with specified id",
    "execution context was destroyed",
    "cannot find object with id",
];

#[derive(Debug, Clone, Default)]
pub struct ChromeOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
}

/// [`Driver`] backed by a local Chrome over the DevTools protocol.
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    pub async fn launch(options: &ChromeOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder
            .build()
            .map_err(|err| ExportError::driver(format!("browser config: {err}")))?;

        let (mut browser, mut events) = Browser::launch(config)
            .await
            .map_err(|err| ExportError::driver(format!("launch browser: {err}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "browser event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(ExportError::driver(format!("open page: {err}")));
            }
        };

        tracing::debug!(headless = options.headless, "browser launched");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|err| map_cdp(err, || format!("navigating to {url}")))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|err| map_cdp(err, || "reading current url".to_owned()))?;
        Ok(url.unwrap_or_default())
    }

    async fn find(&self, selector: &str) -> Result<Vec<Element>> {
        self.page
            .find_elements(selector)
            .await
            .map_err(|err| map_cdp(err, || format!("finding `{selector}`")))
    }

    async fn find_within(&self, parent: &Element, selector: &str) -> Result<Vec<Element>> {
        parent
            .find_elements(selector)
            .await
            .map_err(|err| map_cdp(err, || format!("finding `{selector}` within element")))
    }

    async fn read_text(&self, element: &Element) -> Result<String> {
        let text = element
            .inner_text()
            .await
            .map_err(|err| map_cdp(err, || "reading element text".to_owned()))?;
        Ok(text.unwrap_or_default())
    }

    async fn read_attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element
            .attribute(name)
            .await
            .map_err(|err| map_cdp(err, || format!("reading attribute `{name}`")))
    }

    async fn read_property(
        &self,
        element: &Element,
        name: &str,
    ) -> Result<Option<serde_json::Value>> {
        element
            .property(name)
            .await
            .map_err(|err| map_cdp(err, || format!("reading property `{name}`")))
    }

    async fn type_text(&self, element: &Element, text: &str) -> Result<()> {
        element
            .click()
            .await
            .map_err(|err| map_cdp(err, || "focusing input".to_owned()))?;
        element
            .type_str(text)
            .await
            .map_err(|err| map_cdp(err, || "typing into input".to_owned()))?;
        Ok(())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element
            .click()
            .await
            .map_err(|err| map_cdp(err, || "clicking element".to_owned()))?;
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        let waited = self.browser.wait().await;
        self.handler.abort();

        closed.map_err(|err| ExportError::driver(format!("close browser: {err}")))?;
        waited.map_err(|err| ExportError::driver(format!("wait for browser exit: {err}")))?;
        tracing::debug!("browser closed");
        Ok(())
    }
}

fn map_cdp(err: CdpError, context: impl FnOnce() -> String) -> ExportError {
    let message = err.to_string();
    if is_stale_message(&message) {
        ExportError::TransientElement { context: context() }
    } else {
        ExportError::driver(format!("{}: {message}", context()))
    }
}

fn is_stale_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    STALE_MARKERS.iter().any(|marker| message.contains(marker))
}
