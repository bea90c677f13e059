//! Captured HTML kept between harvesting and extraction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;

/// Identifies a captured page: a listing page number or a coin slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKey {
    Page(u32),
    Slug(String),
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Page(n) => write!(f, "page {n}"),
            PageKey::Slug(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedPage {
    pub key: PageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub html: String,
}

/// Ordered, append-only collection of captured pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageArchive {
    pages: Vec<ArchivedPage>,
}

impl PageArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: PageKey, url: Option<String>, html: String) {
        self.pages.push(ArchivedPage { key, url, html });
    }

    pub fn pages(&self) -> &[ArchivedPage] {
        &self.pages
    }

    pub fn get(&self, key: &PageKey) -> Option<&ArchivedPage> {
        self.pages.iter().find(|p| &p.key == key)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(file, self)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a PageArchive {
    type Item = &'a ArchivedPage;
    type IntoIter = std::slice::Iter<'a, ArchivedPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_survives_disk() {
        let mut archive = PageArchive::new();
        archive.push(PageKey::Slug("bitcoin".into()), Some("https://x/currencies/bitcoin/".into()), "<h1>BTC</h1>".into());
        archive.push(PageKey::Slug("ethereum".into()), None, "<h1>ETH</h1>".into());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detail.json");
        archive.save(&path).unwrap();
        let back = PageArchive::load(&path).unwrap();

        assert_eq!(back, archive);
        let keys: Vec<String> = back.pages().iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, vec!["bitcoin", "ethereum"]);
        assert_eq!(back.get(&PageKey::Slug("ethereum".into())).unwrap().html, "<h1>ETH</h1>");
    }

    #[test]
    fn page_key_display() {
        assert_eq!(PageKey::Page(2).to_string(), "page 2");
    }
}
