//! Batch driver: Harvesting -> Extracting -> Filtering -> Exported.
//!
//! Each stage drains fully before the next starts. A tripped [`CancelToken`]
//! stops harvesting or extraction after the current document; whatever was
//! completed is still filtered and written.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::archive::{PageArchive, PageKey};
use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::export::{filter_by_ratio, ratio_file_name, write_json};
use crate::extract::{extract, CryptoRecord};
use crate::harvest::Harvester;
use crate::listing::detail_slugs;

pub const LISTING_ARCHIVE_FILE: &str = "cmc_pages.json";
pub const DETAIL_ARCHIVE_FILE: &str = "cmc_detail.json";
pub const RECORDS_FILE: &str = "cryptomonnaie.json";
pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Harvesting,
    Extracting,
    Filtering,
    Exported,
}

/// Shared "stop after the current document" flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts that tell "nothing fetched" apart from "nothing kept".
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub listing_pages: usize,
    pub slugs_found: usize,
    pub harvested: usize,
    pub failed: usize,
    pub extracted: usize,
    pub with_ratio: usize,
    pub kept: usize,
    pub ratio_threshold: f64,
    pub cancelled: bool,
    pub stage: Stage,
    pub records_path: Option<PathBuf>,
    pub kept_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    fn start(ratio_threshold: f64) -> Self {
        Self {
            listing_pages: 0,
            slugs_found: 0,
            harvested: 0,
            failed: 0,
            extracted: 0,
            with_ratio: 0,
            kept: 0,
            ratio_threshold,
            cancelled: false,
            stage: Stage::Harvesting,
            records_path: None,
            kept_path: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

pub struct Pipeline {
    config: ExtractionConfig,
    output_dir: PathBuf,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(config: ExtractionConfig, output_dir: impl Into<PathBuf>, cancel: CancelToken) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            cancel,
        }
    }

    /// Full run: list, fetch details, extract, filter, export.
    pub async fn run<H>(&self, harvester: &H, list_pages: u32) -> Result<RunSummary>
    where
        H: Harvester + ?Sized,
    {
        let mut summary = RunSummary::start(self.config.ratio_threshold);
        info!(stage = ?Stage::Harvesting, list_pages, "starting");

        let listing = harvester.fetch_listing_pages(list_pages, &self.cancel).await?;
        summary.listing_pages = listing.len();
        self.save_archive(&listing, LISTING_ARCHIVE_FILE);

        let mut slugs: Vec<String> = Vec::new();
        for page in &listing {
            for slug in detail_slugs(&page.html) {
                if !slugs.contains(&slug) {
                    slugs.push(slug);
                }
            }
        }
        summary.slugs_found = slugs.len();
        if let Some(limit) = self.config.record_limit {
            slugs.truncate(limit);
        }
        info!(found = summary.slugs_found, taking = slugs.len(), "detail links collected");

        let mut details = PageArchive::new();
        for (i, slug) in slugs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(done = i, total = slugs.len(), "harvesting cancelled");
                summary.cancelled = true;
                break;
            }
            match harvester.fetch_detail_document(slug).await {
                Ok(html) => {
                    details.push(PageKey::Slug(slug.clone()), Some(harvester.detail_url(slug)), html);
                }
                Err(err) => {
                    warn!(slug = %slug, error = %err, "skipping detail page");
                    summary.failed += 1;
                }
            }
        }
        summary.harvested = details.len();
        summary.cancelled |= self.cancel.is_cancelled();
        self.save_archive(&details, DETAIL_ARCHIVE_FILE);

        self.finish(&details, summary)
    }

    // The archives only serve offline replays; losing one must not cost the export.
    fn save_archive(&self, archive: &PageArchive, name: &str) {
        let path = self.output_dir.join(name);
        if let Err(err) = archive.save(&path) {
            warn!(path = %path.display(), error = %err, "could not save page archive");
        }
    }

    /// Offline run over a saved detail archive.
    pub fn run_archive(&self, details: &PageArchive) -> Result<RunSummary> {
        let mut summary = RunSummary::start(self.config.ratio_threshold);
        summary.harvested = details.len();
        self.finish(details, summary)
    }

    /// Extracts records in archive order, honoring the record limit and the
    /// cancel flag. The flag reports whether extraction stopped early.
    pub fn extract_all(&self, details: &PageArchive) -> (Vec<CryptoRecord>, bool) {
        self.extract_pages(details, true)
    }

    // Pages already harvested before a cancel are always extracted.
    fn extract_pages(&self, details: &PageArchive, watch_cancel: bool) -> (Vec<CryptoRecord>, bool) {
        let limit = self.config.record_limit.unwrap_or(usize::MAX);
        let mut records = Vec::with_capacity(details.len().min(limit));

        for page in details.pages().iter().take(limit) {
            if watch_cancel && self.cancel.is_cancelled() {
                info!(done = records.len(), "extraction cancelled");
                return (records, true);
            }
            let mut record = extract(&page.html, &self.config.stat_labels);
            if let Some(url) = &page.url {
                record = record.with_source_link(url.clone());
            }
            info!("{}", record.summary_line(records.len() + 1));
            records.push(record);
        }

        (records, false)
    }

    fn finish(&self, details: &PageArchive, mut summary: RunSummary) -> Result<RunSummary> {
        summary.stage = Stage::Extracting;
        info!(stage = ?summary.stage, documents = details.len(), "starting");
        let (records, cancelled) = self.extract_pages(details, !summary.cancelled);
        summary.cancelled |= cancelled;
        summary.extracted = records.len();
        summary.with_ratio = records.iter().filter(|r| r.ratio.is_some()).count();

        let records_path = write_json(self.output_dir.join(RECORDS_FILE), &records)?;

        summary.stage = Stage::Filtering;
        let kept = filter_by_ratio(records, self.config.ratio_threshold);
        summary.kept = kept.len();
        info!(
            stage = ?summary.stage,
            kept = summary.kept,
            threshold = self.config.ratio_threshold,
            "filtered"
        );

        let kept_path = write_json(
            self.output_dir.join(ratio_file_name(self.config.ratio_threshold)),
            &kept,
        )?;

        summary.stage = Stage::Exported;
        summary.records_path = Some(records_path);
        summary.kept_path = Some(kept_path);
        summary.finished_at = Some(Utc::now());

        let file = std::fs::File::create(self.output_dir.join(SUMMARY_FILE))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &summary)?;
        out.flush()?;

        info!(
            harvested = summary.harvested,
            failed = summary.failed,
            extracted = summary.extracted,
            kept = summary.kept,
            cancelled = summary.cancelled,
            "run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(n: usize) -> PageArchive {
        let mut archive = PageArchive::new();
        for i in 0..n {
            archive.push(PageKey::Slug(format!("coin-{i}")), None, format!("<h1>Coin {i}</h1>"));
        }
        archive
    }

    #[test]
    fn extraction_respects_limit() {
        let config = ExtractionConfig {
            record_limit: Some(2),
            ..ExtractionConfig::default()
        };
        let pipeline = Pipeline::new(config, ".", CancelToken::new());
        let (records, cancelled) = pipeline.extract_all(&details(5));
        assert_eq!(records.len(), 2);
        assert!(!cancelled);
        assert_eq!(records[1].name, "Coin 1");
    }

    #[test]
    fn cancelled_extraction_stops_early() {
        let token = CancelToken::new();
        token.cancel();
        let pipeline = Pipeline::new(ExtractionConfig::default(), ".", token);
        let (records, cancelled) = pipeline.extract_all(&details(3));
        assert!(records.is_empty());
        assert!(cancelled);
    }

    #[test]
    fn extraction_is_repeatable() {
        let pipeline = Pipeline::new(ExtractionConfig::default(), ".", CancelToken::new());
        let archive = details(3);
        assert_eq!(pipeline.extract_all(&archive).0, pipeline.extract_all(&archive).0);
    }
}
