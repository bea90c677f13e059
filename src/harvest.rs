//! Page acquisition. The extraction core only ever sees the HTML these return.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, info, warn};

use crate::archive::{PageArchive, PageKey};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::CancelToken;

#[async_trait]
pub trait Harvester: Send + Sync {
    /// Listing pages `1..=count`, keyed by page number. Pages that fail to load
    /// are skipped; a tripped `cancel` stops before the next page.
    async fn fetch_listing_pages(&self, count: u32, cancel: &CancelToken) -> Result<PageArchive>;

    /// Raw HTML of one coin detail page.
    async fn fetch_detail_document(&self, slug: &str) -> Result<String>;

    /// Where a detail page lives, recorded as the record's source link.
    fn detail_url(&self, slug: &str) -> String;
}

/// Plain HTTP harvester over a shared `reqwest` client.
pub struct HttpHarvester {
    client: Client,
    base_url: String,
}

impl HttpHarvester {
    pub fn new(config: &Config) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(std::time::Duration::from_secs(5)))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn listing_url(&self, page: u32) -> String {
        if page <= 1 {
            self.base_url.clone()
        } else {
            format!("{}?page={}", self.base_url, page)
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!("{} returned {}", url, status)));
        }
        let html = response.text().await?;
        Ok(html)
    }
}

#[async_trait]
impl Harvester for HttpHarvester {
    async fn fetch_listing_pages(&self, count: u32, cancel: &CancelToken) -> Result<PageArchive> {
        let mut archive = PageArchive::new();
        for page in 1..=count {
            if cancel.is_cancelled() {
                info!(page, "listing harvest cancelled");
                break;
            }
            let url = self.listing_url(page);
            match self.fetch_html(&url).await {
                Ok(html) => {
                    debug!(page, bytes = html.len(), "listing page fetched");
                    archive.push(PageKey::Page(page), Some(url), html);
                }
                Err(err) => warn!(page, error = %err, "skipping listing page"),
            }
        }
        info!(pages = archive.len(), requested = count, "listing pages harvested");
        Ok(archive)
    }

    async fn fetch_detail_document(&self, slug: &str) -> Result<String> {
        self.fetch_html(&self.detail_url(slug)).await
    }

    fn detail_url(&self, slug: &str) -> String {
        format!("{}currencies/{}/", self.base_url, slug)
    }
}

/// Serves previously captured pages, for offline runs and fixtures.
pub struct ArchiveHarvester {
    listing: PageArchive,
    details: PageArchive,
}

impl ArchiveHarvester {
    pub fn new(listing: PageArchive, details: PageArchive) -> Self {
        Self { listing, details }
    }
}

#[async_trait]
impl Harvester for ArchiveHarvester {
    async fn fetch_listing_pages(&self, count: u32, cancel: &CancelToken) -> Result<PageArchive> {
        let mut archive = PageArchive::new();
        for page in self.listing.pages() {
            if cancel.is_cancelled() {
                break;
            }
            if matches!(page.key, PageKey::Page(n) if n <= count) {
                archive.push(page.key.clone(), page.url.clone(), page.html.clone());
            }
        }
        Ok(archive)
    }

    async fn fetch_detail_document(&self, slug: &str) -> Result<String> {
        self.details
            .get(&PageKey::Slug(slug.to_string()))
            .map(|p| p.html.clone())
            .ok_or_else(|| AppError::FetchError(format!("no archived page for {}", slug)))
    }

    fn detail_url(&self, slug: &str) -> String {
        self.details
            .get(&PageKey::Slug(slug.to_string()))
            .and_then(|p| p.url.clone())
            .unwrap_or_else(|| format!("archive:{}", slug))
    }
}
