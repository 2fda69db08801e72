use chrono::Utc;

use crate::driver::Driver;
use crate::error::Result;
use crate::formats::{EntryRecord, EntryReference};
use crate::retry::RetryPolicy;
use crate::session::SessionGateway;

/// Loads entry detail pages and turns them into records.
pub struct EntryFetcher<'a, D: Driver> {
    gateway: &'a SessionGateway<D>,
    retry: RetryPolicy,
}

impl<'a, D: Driver> EntryFetcher<'a, D> {
    pub fn new(gateway: &'a SessionGateway<D>) -> Self {
        Self {
            gateway,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn fetch(&self, reference: &EntryReference) -> Result<EntryRecord> {
        let what = format!("entry {}", reference.entry_id());
        self.retry
            .run(&what, || fetch_entry(self.gateway, reference))
            .await
    }
}

pub async fn fetch_entry<D: Driver>(
    gateway: &SessionGateway<D>,
    reference: &EntryReference,
) -> Result<EntryRecord> {
    gateway.navigate(reference.source_url()).await?;
    let layout = gateway.layout();

    let body = gateway.find_one(&layout.entry_content).await?;
    let content = gateway.read_text(&body).await?;

    let title_control = gateway.find_one(&layout.entry_title).await?;
    let title = gateway
        .read_property_text(&title_control, &layout.entry_title_property)
        .await?;

    Ok(EntryRecord::from_reference(
        reference,
        title,
        content,
        Utc::now(),
    ))
}
