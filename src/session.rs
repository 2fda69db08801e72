use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::driver::Driver;
use crate::error::{ExportError, Result};
use crate::layout::PageLayout;

/// Waits around page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTimings {
    /// Pause right after navigation, before the loader is first polled.
    pub grace: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Pause after the loader reports done.
    pub settle: Duration,
}

impl Default for LoadTimings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
            settle: Duration::from_secs(1),
        }
    }
}

/// Outcome of a lookup that must match exactly one element.
#[derive(Debug)]
pub enum Matches<T> {
    None,
    One(T),
    Many(usize),
}

impl<T> Matches<T> {
    pub fn from_vec(mut found: Vec<T>) -> Self {
        match found.len() {
            0 => Self::None,
            1 => Self::One(found.remove(0)),
            n => Self::Many(n),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One(_) => 1,
            Self::Many(n) => *n,
        }
    }

    pub fn into_one(self, selector: &str, url: &str) -> Result<T> {
        match self {
            Self::One(element) => Ok(element),
            other => Err(ExportError::Structure {
                selector: selector.to_owned(),
                url: url.to_owned(),
                found: other.count(),
            }),
        }
    }
}

/// Façade over a [`Driver`]: navigation that waits for the app to settle, and
/// lookups that enforce the expected page shape.
pub struct SessionGateway<D: Driver> {
    driver: D,
    layout: PageLayout,
    timings: LoadTimings,
    location: Mutex<String>,
}

impl<D: Driver> SessionGateway<D> {
    pub fn new(driver: D, layout: PageLayout, timings: LoadTimings) -> Self {
        Self {
            driver,
            layout,
            timings,
            location: Mutex::new(String::new()),
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// URL of the last navigation, used as error context.
    pub fn location(&self) -> String {
        self.location
            .lock()
            .map(|location| location.clone())
            .unwrap_or_default()
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        if let Ok(mut location) = self.location.lock() {
            url.clone_into(&mut location);
        }
        tracing::debug!(url, "navigating");
        self.driver.navigate(url).await?;
        self.wait_for_load(url).await
    }

    /// Navigates without waiting for the app's loader; for pages outside the app shell.
    pub async fn visit(&self, url: &str) -> Result<()> {
        if let Ok(mut location) = self.location.lock() {
            url.clone_into(&mut location);
        }
        tracing::debug!(url, "visiting");
        self.driver.navigate(url).await
    }

    /// Polls until `selector` matches exactly one element.
    pub async fn wait_for_one(&self, selector: &str) -> Result<D::Element> {
        let deadline = Instant::now() + self.timings.timeout;
        loop {
            let found = match self.driver.find(selector).await {
                Err(ExportError::TransientElement { .. }) => Vec::new(),
                other => other?,
            };
            match Matches::from_vec(found) {
                Matches::One(element) => return Ok(element),
                Matches::None if Instant::now() < deadline => {
                    sleep(self.timings.poll_interval).await;
                }
                Matches::None => {
                    return Err(ExportError::LoadTimeout {
                        url: self.location(),
                        timeout: self.timings.timeout,
                    });
                }
                many => return many.into_one(selector, &self.location()),
            }
        }
    }

    pub async fn current_url(&self) -> Result<String> {
        self.driver.current_url().await
    }

    pub async fn wait_for_load(&self, url: &str) -> Result<()> {
        sleep(self.timings.grace).await;

        let deadline = Instant::now() + self.timings.timeout;
        while !self.loader_done().await? {
            if Instant::now() >= deadline {
                return Err(ExportError::LoadTimeout {
                    url: url.to_owned(),
                    timeout: self.timings.timeout,
                });
            }
            sleep(self.timings.poll_interval).await;
        }

        sleep(self.timings.settle).await;
        Ok(())
    }

    async fn loader_done(&self) -> Result<bool> {
        let probe = async {
            let loader = self.find_one(&self.layout.loader).await?;
            let classes = self.driver.read_attribute(&loader, "class").await?;
            Ok::<_, ExportError>(self.layout.is_loader_done(classes.as_deref().unwrap_or_default()))
        };
        match probe.await {
            Err(ExportError::TransientElement { .. }) => Ok(false),
            other => other,
        }
    }

    pub async fn find_all(&self, selector: &str) -> Result<Vec<D::Element>> {
        self.driver.find(selector).await
    }

    pub async fn find_one(&self, selector: &str) -> Result<D::Element> {
        let found = self.driver.find(selector).await?;
        Matches::from_vec(found).into_one(selector, &self.location())
    }

    pub async fn find_one_within(&self, parent: &D::Element, selector: &str) -> Result<D::Element> {
        let found = self.driver.find_within(parent, selector).await?;
        Matches::from_vec(found).into_one(selector, &self.location())
    }

    pub async fn read_text(&self, element: &D::Element) -> Result<String> {
        self.driver.read_text(element).await
    }

    pub async fn read_attribute(&self, element: &D::Element, name: &str) -> Result<Option<String>> {
        self.driver.read_attribute(element, name).await
    }

    /// Reads a DOM property as text; absent or null reads as empty.
    pub async fn read_property_text(&self, element: &D::Element, name: &str) -> Result<String> {
        let value = self.driver.read_property(element, name).await?;
        Ok(match value {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(text)) => text,
            Some(other) => other.to_string(),
        })
    }

    pub async fn type_text(&self, element: &D::Element, text: &str) -> Result<()> {
        self.driver.type_text(element, text).await
    }

    pub async fn click(&self, element: &D::Element) -> Result<()> {
        self.driver.click(element).await
    }

    /// Hands the driver back so the caller can close it.
    pub fn into_driver(self) -> D {
        self.driver
    }
}
