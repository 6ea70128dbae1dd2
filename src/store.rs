use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::normalize::NormalizedDocument;

const INDEX_FILE: &str = "crawl_index.json";
const PAGES_DIR: &str = "pages";

/// One line of the aggregate index per saved document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub file: String,
    pub title: String,
    pub text_length: usize,
}

/// Free-form per-source state for change-detection shortcuts: first-row
/// signatures of paginated listings and last-crawl stamps of daily sources.
/// Keys are `{source}_first_item`, `{source}_last_update`,
/// `{source}_last_crawl`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMeta(BTreeMap<String, String>);

impl SourceMeta {
    pub fn first_row_signature(&self, source: &str) -> Option<&str> {
        self.0.get(&format!("{}_first_item", source)).map(|s| s.as_str())
    }

    pub fn set_first_row_signature(&mut self, source: &str, signature: &str) {
        self.0
            .insert(format!("{}_first_item", source), signature.to_string());
        self.0
            .insert(format!("{}_last_update", source), now_stamp());
    }

    pub fn last_crawl(&self, source: &str) -> Option<NaiveDateTime> {
        let raw = self.0.get(&format!("{}_last_crawl", source))?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()
    }

    pub fn mark_crawled(&mut self, source: &str) {
        self.0.insert(format!("{}_last_crawl", source), now_stamp());
    }

    /// Daily gate: true when the stored last-crawl stamp falls on `today` or
    /// later.
    pub fn crawled_on(&self, source: &str, today: NaiveDate) -> bool {
        self.last_crawl(source)
            .is_some_and(|stamp| stamp.date() >= today)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn now_stamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Index state as loaded at the start of a run.
#[derive(Debug, Default)]
pub struct LoadedIndex {
    pub existing_urls: HashSet<String>,
    pub pages: Vec<PageSummary>,
    pub meta: SourceMeta,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    crawl_date: String,
    total_pages: usize,
    #[serde(default)]
    meta: SourceMeta,
    #[serde(default)]
    pages: Vec<PageSummary>,
}

/// Flat JSON store: one file per document named by a hash of its source URL,
/// plus the single aggregate index. Single writer per run; the index is only
/// rewritten, whole, at the end.
pub struct DocumentStore {
    pages_dir: PathBuf,
    index_path: PathBuf,
    pub pretty: bool,
}

impl DocumentStore {
    pub fn new(output_dir: &Path) -> Result<Self> {
        let pages_dir = output_dir.join(PAGES_DIR);
        fs::create_dir_all(&pages_dir)
            .with_context(|| format!("cannot create store at {}", output_dir.display()))?;
        Ok(Self {
            pages_dir,
            index_path: output_dir.join(INDEX_FILE),
            pretty: true,
        })
    }

    /// Write one document. The file name depends only on the source URL, so
    /// re-saving the same page overwrites its previous version in place.
    pub fn save_document(&self, doc: &NormalizedDocument) -> Result<PathBuf> {
        let path = self.pages_dir.join(format!("{}.json", url_key(&doc.source_url)));
        let body = if self.pretty {
            serde_json::to_string_pretty(doc)?
        } else {
            serde_json::to_string(doc)?
        };
        fs::write(&path, body)
            .with_context(|| format!("cannot write document {}", path.display()))?;
        Ok(path)
    }

    /// Full rewrite of the aggregate index, via a sibling temp file and a
    /// rename so a crash can never leave a half-written index behind.
    pub fn save_index(&self, pages: &[PageSummary], meta: &SourceMeta) -> Result<()> {
        let index = IndexFile {
            crawl_date: now_stamp(),
            total_pages: pages.len(),
            meta: meta.clone(),
            pages: pages.to_vec(),
        };
        let body = if self.pretty {
            serde_json::to_string_pretty(&index)?
        } else {
            serde_json::to_string(&index)?
        };

        let tmp = self.index_path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .with_context(|| format!("cannot write index {}", tmp.display()))?;
        fs::rename(&tmp, &self.index_path)
            .with_context(|| format!("cannot replace index {}", self.index_path.display()))?;
        Ok(())
    }

    /// Seed state for an incremental run. A missing index means a first run;
    /// an unreadable one is logged and treated the same rather than wedging
    /// every future crawl.
    pub fn load_index(&self) -> LoadedIndex {
        if !self.index_path.exists() {
            return LoadedIndex::default();
        }

        let parsed = fs::read_to_string(&self.index_path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<IndexFile>(&raw).map_err(Into::into));

        match parsed {
            Ok(index) => {
                let existing_urls = index.pages.iter().map(|p| p.url.clone()).collect();
                LoadedIndex {
                    existing_urls,
                    pages: index.pages,
                    meta: index.meta,
                }
            }
            Err(e) => {
                warn!("failed to load existing index: {:#}", e);
                LoadedIndex::default()
            }
        }
    }
}

/// Content-independent document key: first 16 hex chars of the URL's sha-256.
pub fn url_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}
