use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

/// One `<url>` entry of a sitemap.
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

/// Href fragments that mark dynamic pages (board views, search, login,
/// downloads) which the static-page crawl must not touch.
const DYNAMIC_PATTERNS: &[&str] = &[
    "mode=", "articleNo=", "search", "Search",
    "login", "Login",
    "fileDownload", "fileDown", "download=",
    "board", "bbs", "reg.do",
];

const FILE_EXTENSIONS: &[&str] = &[".pdf", ".hwp", ".xls", ".xlsx", ".ppt", ".pptx", ".zip"];

enum Field {
    None,
    Loc,
    Lastmod,
}

/// Parse a urlset XML into entries, keeping `<lastmod>` when present.
pub fn parse_sitemap(xml: &str) -> Result<Vec<SitemapEntry>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut in_url = false;
    let mut field = Field::None;
    let mut loc = String::new();
    let mut lastmod: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"url" => {
                    in_url = true;
                    loc.clear();
                    lastmod = None;
                }
                b"loc" if in_url => field = Field::Loc,
                b"lastmod" if in_url => field = Field::Lastmod,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(e)) => match field {
                Field::Loc => loc.push_str(e.unescape()?.trim()),
                Field::Lastmod => lastmod = Some(e.unescape()?.trim().to_string()),
                Field::None => {}
            },
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"loc" | b"lastmod" => field = Field::None,
                b"url" => {
                    in_url = false;
                    if !loc.is_empty() {
                        entries.push(SitemapEntry {
                            loc: std::mem::take(&mut loc),
                            lastmod: lastmod.take(),
                        });
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

/// Reduce sitemap entries to static-page candidates: normalize scheme and
/// trailing slash, keep only the allowed prefix, drop dynamic/board/file/
/// anchored URLs and anything on the explicit exclude list, dedup.
pub fn filter_static_pages(
    entries: Vec<SitemapEntry>,
    prefix: Option<&str>,
    exclude: &[String],
) -> Vec<SitemapEntry> {
    let excluded: HashSet<&str> = exclude.iter().map(|s| s.as_str()).collect();
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for mut entry in entries {
        if let Some(rest) = entry.loc.strip_prefix("http://") {
            entry.loc = format!("https://{}", rest);
        }
        if let Some(prefix) = prefix {
            if !entry.loc.starts_with(prefix) {
                continue;
            }
        }

        entry.loc = entry.loc.trim_end_matches('/').to_string();

        if excluded.contains(entry.loc.as_str()) {
            info!("sitemap: excluded url skipped: {}", entry.loc);
            continue;
        }
        if DYNAMIC_PATTERNS.iter().any(|p| entry.loc.contains(p)) {
            continue;
        }
        let lower = entry.loc.to_lowercase();
        if FILE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            continue;
        }
        if entry.loc.contains('#') {
            continue;
        }
        if !seen.insert(entry.loc.clone()) {
            continue;
        }
        kept.push(entry);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>http://www.kumoh.ac.kr/ko/sub01_01.do</loc><lastmod>2025-11-01</lastmod></url>
  <url><loc>https://www.kumoh.ac.kr/ko/sub01_02.do/</loc></url>
  <url><loc>https://www.kumoh.ac.kr/ko/sub06_01_01_01.do?mode=view&amp;articleNo=1</loc></url>
  <url><loc>https://www.kumoh.ac.kr/ko/files/guide.pdf</loc></url>
  <url><loc>https://www.kumoh.ac.kr/ko/sub01_03.do#section</loc></url>
  <url><loc>https://www.kumoh.ac.kr/ko/bbs/list.do</loc></url>
  <url><loc>https://other.example.com/page</loc></url>
  <url><loc>http://www.kumoh.ac.kr/ko/sub01_01.do</loc></url>
</urlset>"#;

    #[test]
    fn parses_loc_and_lastmod() {
        let entries = parse_sitemap(SITEMAP).unwrap();
        assert_eq!(entries.len(), 8);
        assert_eq!(entries[0].loc, "http://www.kumoh.ac.kr/ko/sub01_01.do");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2025-11-01"));
        assert!(entries[1].lastmod.is_none());
    }

    #[test]
    fn keeps_only_static_candidates() {
        let entries = parse_sitemap(SITEMAP).unwrap();
        let kept = filter_static_pages(entries, Some("https://www.kumoh.ac.kr/ko/"), &[]);
        let locs: Vec<&str> = kept.iter().map(|e| e.loc.as_str()).collect();
        // Scheme normalized, slash trimmed, dynamic/file/anchor/board and the
        // foreign host dropped, duplicate collapsed.
        assert_eq!(
            locs,
            vec![
                "https://www.kumoh.ac.kr/ko/sub01_01.do",
                "https://www.kumoh.ac.kr/ko/sub01_02.do",
            ]
        );
        assert_eq!(kept[0].lastmod.as_deref(), Some("2025-11-01"));
    }

    #[test]
    fn explicit_exclusions_apply_after_normalization() {
        let entries = parse_sitemap(SITEMAP).unwrap();
        let kept = filter_static_pages(
            entries,
            Some("https://www.kumoh.ac.kr/ko/"),
            &["https://www.kumoh.ac.kr/ko/sub01_01.do".to_string()],
        );
        let locs: Vec<&str> = kept.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["https://www.kumoh.ac.kr/ko/sub01_02.do"]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_sitemap("<urlset><url><loc>x</url>").is_err());
    }
}
