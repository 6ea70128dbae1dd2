use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// A standalone page crawled as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct PageTarget {
    pub url: String,
    pub name: String,
}

/// A notice board: listing pages are walked and each posting crawled.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardTarget {
    pub url: String,
    pub name: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub skip_date_filter: bool,
}

/// A page regenerated once per calendar day (cafeteria menus).
#[derive(Debug, Clone, Deserialize)]
pub struct DailyTarget {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SitemapTarget {
    pub url: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Crawl sources and tuning knobs. Defaults cover the campus sites; a JSON
/// file can replace any part of it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub output_dir: PathBuf,
    pub request_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub cutoff_date: Option<String>,
    pub cutoff_days_ago: Option<i64>,
    pub notify_endpoint: Option<String>,
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub min_word_count: usize,
    pub pages: Vec<PageTarget>,
    pub boards: Vec<BoardTarget>,
    pub schedule_url: Option<String>,
    pub daily: Vec<DailyTarget>,
    pub sitemap: Option<SitemapTarget>,
}

fn default_max_pages() -> usize {
    5
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let target = |url: &str, name: &str| PageTarget {
            url: url.to_string(),
            name: name.to_string(),
        };
        Self {
            output_dir: PathBuf::from("data/crawled"),
            request_delay_ms: 700,
            fetch_timeout_secs: 10,
            cutoff_date: None,
            cutoff_days_ago: None,
            notify_endpoint: None,
            min_text_length: 100,
            max_text_length: 500_000,
            min_word_count: 20,
            pages: vec![
                target(
                    "https://edison.kumoh.ac.kr/edison/sub0101.do",
                    "에디슨칼리지 첨단산업융합학부 소개",
                ),
                target(
                    "https://archi.kumoh.ac.kr/archi/sub0102.do",
                    "건축토목환경공학부 소개",
                ),
                target(
                    "https://env.kumoh.ac.kr/env/sub0101.do",
                    "환경공학전공 소개",
                ),
            ],
            boards: vec![
                BoardTarget {
                    url: "https://www.kumoh.ac.kr/ko/sub06_01_01_01.do".to_string(),
                    name: "공지사항 학사안내".to_string(),
                    max_pages: 5,
                    skip_date_filter: false,
                },
                BoardTarget {
                    url: "https://www.kumoh.ac.kr/ko/sub06_01_01_02.do".to_string(),
                    name: "공지사항 행사안내".to_string(),
                    max_pages: 5,
                    skip_date_filter: false,
                },
                BoardTarget {
                    url: "https://bus.kumoh.ac.kr/bus/sub01_01.do".to_string(),
                    name: "통학버스 공지".to_string(),
                    max_pages: 3,
                    skip_date_filter: false,
                },
            ],
            schedule_url: Some("https://www.kumoh.ac.kr/ko/schedule_reg.do".to_string()),
            daily: vec![
                DailyTarget {
                    url: "https://www.kumoh.ac.kr/ko/restaurant01.do".to_string(),
                    name: "학생식당".to_string(),
                },
                DailyTarget {
                    url: "https://www.kumoh.ac.kr/ko/restaurant02.do".to_string(),
                    name: "교직원식당".to_string(),
                },
                DailyTarget {
                    url: "https://dorm.kumoh.ac.kr/dorm/restaurant_menu01.do".to_string(),
                    name: "푸름관".to_string(),
                },
            ],
            sitemap: Some(SitemapTarget {
                url: "https://www.kumoh.ac.kr/ko/ko.xml".to_string(),
                prefix: Some("https://www.kumoh.ac.kr/ko/".to_string()),
                exclude: Vec::new(),
            }),
        }
    }
}

impl CrawlConfig {
    /// Built-in defaults, or the JSON file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("cannot read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.request_delay_ms, 700);
        assert_eq!(cfg.min_text_length, 100);
        assert!(!cfg.boards.is_empty());
        assert!(cfg.schedule_url.is_some());
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "output_dir": "/tmp/out",
                "boards": [{"url": "https://bus.kumoh.ac.kr/bus/sub01_01.do", "name": "통학버스"}],
                "cutoff_date": "2024-01-01"
            }"#,
        )
        .unwrap();

        let cfg = CrawlConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.boards.len(), 1);
        assert_eq!(cfg.boards[0].max_pages, 5);
        assert!(!cfg.boards[0].skip_date_filter);
        assert_eq!(cfg.cutoff_date.as_deref(), Some("2024-01-01"));
        // Untouched sections keep their defaults.
        assert_eq!(cfg.request_delay_ms, 700);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(CrawlConfig::load(Some(Path::new("/nonexistent/config.json"))).is_err());
    }
}
