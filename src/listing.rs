use std::collections::VecDeque;

use url::Url;

use crate::driver::Driver;
use crate::error::{ExportError, Result};
use crate::formats::EntryReference;
use crate::retry::RetryPolicy;
use crate::session::SessionGateway;

pub const DEFAULT_MAX_PAGES: u32 = 10_000;

pub fn listing_url(base_url: &str, journal_id: &str, page: u32) -> String {
    format!(
        "{}/journals/{journal_id}/entries?page={page}",
        base_url.trim_end_matches('/')
    )
}

/// Walks `entries?page=1, 2, ...` of one journal and yields every entry
/// reference in listing order. The first page without rows ends the walk.
pub struct Paginator<'a, D: Driver> {
    gateway: &'a SessionGateway<D>,
    retry: RetryPolicy,
    base_url: String,
    journal_id: String,
    max_pages: u32,
    next_page: u32,
    pending: VecDeque<EntryReference>,
    exhausted: bool,
}

impl<'a, D: Driver> Paginator<'a, D> {
    pub fn new(
        gateway: &'a SessionGateway<D>,
        base_url: impl Into<String>,
        journal_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            retry: RetryPolicy::default(),
            base_url: base_url.into(),
            journal_id: journal_id.into(),
            max_pages: DEFAULT_MAX_PAGES,
            next_page: 1,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Number of listing pages requested so far.
    pub fn pages_visited(&self) -> u32 {
        self.next_page - 1
    }

    pub async fn next_reference(&mut self) -> Result<Option<EntryReference>> {
        loop {
            if let Some(reference) = self.pending.pop_front() {
                return Ok(Some(reference));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self.next_page;
            let url = listing_url(&self.base_url, &self.journal_id, page);
            if page > self.max_pages {
                return Err(ExportError::PageLimit {
                    url,
                    max_pages: self.max_pages,
                });
            }

            tracing::info!(page, "fetching entries from page");
            let what = format!("listing page {page}");
            let references = self
                .retry
                .run(&what, || fetch_listing_page(self.gateway, &url))
                .await?;
            self.next_page += 1;

            if references.is_empty() {
                tracing::info!(page, "found no more entries");
                self.exhausted = true;
                return Ok(None);
            }
            self.pending.extend(references);
        }
    }
}

/// Loads one listing page and reads every row on it.
pub async fn fetch_listing_page<D: Driver>(
    gateway: &SessionGateway<D>,
    url: &str,
) -> Result<Vec<EntryReference>> {
    gateway.navigate(url).await?;
    let layout = gateway.layout();

    let rows = gateway.find_all(&layout.listing_row).await?;
    let mut references = Vec::with_capacity(rows.len());
    for row in &rows {
        let title_cell = gateway
            .find_one_within(row, &layout.listing_title_cell)
            .await?;
        let link = gateway
            .find_one_within(&title_cell, &layout.listing_link)
            .await?;
        let href = gateway
            .read_attribute(&link, "href")
            .await?
            .ok_or_else(|| ExportError::Structure {
                selector: format!("{}[href]", layout.listing_link),
                url: url.to_owned(),
                found: 0,
            })?;

        let date_cell = gateway
            .find_one_within(row, &layout.listing_date_cell)
            .await?;
        let created_at = gateway.read_text(&date_cell).await?;

        let source_url = resolve_href(url, &href);
        references.push(EntryReference::new(&source_url, created_at.trim())?);
    }

    tracing::debug!(url, count = references.len(), "listing page read");
    Ok(references)
}

// Raw `href` attributes may be relative to the listing page.
fn resolve_href(page_url: &str, href: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_owned())
}
