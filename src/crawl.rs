use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use crate::attachments::{find_attachments, AttachmentSink, MetadataOnlySink};
use crate::config::{BoardTarget, CrawlConfig, DailyTarget, SitemapTarget};
use crate::extract::{board, ContentExtractor};
use crate::fetch::PageFetcher;
use crate::listing;
use crate::normalize::{normalize, DocContext, SourceType};
use crate::notify::Notifier;
use crate::quality::QualityFilter;
use crate::recency::RecencyGate;
use crate::sitemap;
use crate::store::{DocumentStore, PageSummary, SourceMeta};

/// Data rows on the schedule listing carry number/title/start/end/posted.
const SCHEDULE_MIN_CELLS: usize = 5;
const SCHEDULE_KEY: &str = "schedule";

/// Run counters, printed at the end. Rejections are not failures: they get
/// their own buckets so operator reports can tell them apart.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub filtered: usize,
    pub filtered_date: usize,
    pub attachments_found: usize,
}

impl CrawlStats {
    pub fn print(&self) {
        println!("Total:      {}", self.total);
        println!("Success:    {}", self.success);
        println!("Skipped:    {}", self.skipped);
        println!("Failed:     {}", self.failed);
        println!(
            "Filtered:   {} (by date: {}, by quality: {})",
            self.filtered,
            self.filtered_date,
            self.filtered - self.filtered_date
        );
        println!("Attachments: {}", self.attachments_found);
    }
}

/// What happened to one page. Filtered and Skipped are expected control
/// outcomes, not errors.
#[derive(Debug)]
pub enum CrawlOutcome {
    Saved(PathBuf),
    Skipped,
    Filtered(String),
    Failed(String),
}

/// Per-page crawl context passed down from the source definition.
#[derive(Debug, Default, Clone)]
pub struct PageContext {
    pub source_type: Option<SourceType>,
    pub name: Option<String>,
    pub board_name: Option<String>,
    pub site: Option<String>,
    pub skip_date_filter: bool,
    /// Sitemap hint checked before fetching.
    pub lastmod: Option<String>,
    /// Store the page even when the quality gate rejects it (menu front
    /// pages are sparse by nature).
    pub allow_low_quality: bool,
    pub title_override: Option<String>,
    pub title_suffix: Option<String>,
    /// Replaces the extracted text (rendered menu tables).
    pub text_override: Option<String>,
}

impl PageContext {
    fn board(name: &str, skip_date_filter: bool) -> Self {
        Self {
            source_type: Some(SourceType::Board),
            board_name: Some(name.to_string()),
            skip_date_filter,
            ..Self::default()
        }
    }

    fn page(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// One crawl run over the configured sources: fetch, gate, extract,
/// normalize, persist, strictly one page at a time.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: PageFetcher,
    extractor: ContentExtractor,
    quality: QualityFilter,
    recency: RecencyGate,
    store: DocumentStore,
    notifier: Notifier,
    sink: Box<dyn AttachmentSink>,
    pub stats: CrawlStats,
    existing_urls: HashSet<String>,
    saved_pages: Vec<PageSummary>,
    meta: SourceMeta,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let store = DocumentStore::new(&config.output_dir)?;
        let loaded = store.load_index();
        if !loaded.existing_urls.is_empty() {
            info!("loaded existing index: {} urls", loaded.existing_urls.len());
        }

        let fetcher = PageFetcher::new(
            Duration::from_secs(config.fetch_timeout_secs),
            Duration::from_millis(config.request_delay_ms),
        )?;
        let quality = QualityFilter::new(
            config.min_text_length,
            config.max_text_length,
            config.min_word_count,
        );
        let recency = RecencyGate::new(config.cutoff_date.as_deref(), config.cutoff_days_ago)?;
        let notifier = Notifier::new(config.notify_endpoint.clone());

        Ok(Self {
            config,
            fetcher,
            extractor: ContentExtractor::default(),
            quality,
            recency,
            store,
            notifier,
            sink: Box::new(MetadataOnlySink),
            stats: CrawlStats::default(),
            existing_urls: loaded.existing_urls,
            saved_pages: loaded.pages,
            meta: loaded.meta,
        })
    }

    /// All configured sources, then one index rewrite.
    pub async fn run(&mut self) -> Result<()> {
        let pages = self.config.pages.clone();
        for target in &pages {
            let ctx = PageContext::page(&target.name);
            self.crawl_page(&target.url, ctx).await;
        }

        if let Some(url) = self.config.schedule_url.clone() {
            self.crawl_schedule(&url).await;
        }

        let daily = self.config.daily.clone();
        for target in &daily {
            self.crawl_daily(target).await;
        }

        let boards = self.config.boards.clone();
        for target in &boards {
            self.crawl_board(target).await;
        }

        if let Some(target) = self.config.sitemap.clone() {
            self.crawl_sitemap(&target).await;
        }

        self.finish()
    }

    /// Rewrite the aggregate index. Called once, after the run; nothing is
    /// flushed mid-run.
    pub fn finish(&self) -> Result<()> {
        self.store.save_index(&self.saved_pages, &self.meta)?;
        info!("index saved: {} pages", self.saved_pages.len());
        Ok(())
    }

    /// Crawl a single page. The dedup check runs before any network call.
    pub async fn crawl_page(&mut self, url: &str, ctx: PageContext) -> CrawlOutcome {
        self.stats.total += 1;

        if self.existing_urls.contains(url) {
            info!("already crawled, skipping: {}", url);
            self.stats.skipped += 1;
            return CrawlOutcome::Skipped;
        }

        if !ctx.skip_date_filter {
            if let Some(lastmod) = &ctx.lastmod {
                if !self.recency.is_recent(Some(lastmod)) {
                    info!("lastmod {} before cutoff, skipping: {}", lastmod, url);
                    self.stats.filtered += 1;
                    self.stats.filtered_date += 1;
                    return CrawlOutcome::Filtered(format!("lastmod before cutoff: {}", lastmod));
                }
            }
        }

        info!("crawling: {}", url);
        let html = match self.fetcher.get(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("fetch failed for {}: {:#}", url, e);
                self.stats.failed += 1;
                return CrawlOutcome::Failed(e.to_string());
            }
        };

        self.process_html(url, &html, ctx).await
    }

    /// The per-page pipeline after the HTML is in hand: quality gate,
    /// extraction, recency gate, normalization, persistence, notification.
    async fn process_html(&mut self, url: &str, html: &str, ctx: PageContext) -> CrawlOutcome {
        let verdict = self.quality.classify(html, url);
        if !verdict.accepted && !ctx.allow_low_quality {
            warn!("quality gate rejected {}: {}", url, verdict.reason);
            self.stats.filtered += 1;
            return CrawlOutcome::Filtered(verdict.reason);
        }

        let content = self.extractor.extract_with_metadata(html);

        let view_meta = board::board_meta(html);
        let page_date = view_meta
            .created_at
            .clone()
            .or_else(|| board::fallback_date(html));

        if !ctx.skip_date_filter {
            if let Some(date) = &page_date {
                if !self.recency.is_recent(Some(date)) {
                    info!("date filter: {} before cutoff {}", date, self.recency.cutoff_str());
                    self.stats.filtered += 1;
                    self.stats.filtered_date += 1;
                    return CrawlOutcome::Filtered(format!("posted before cutoff: {}", date));
                }
            }
        }

        let source_type = ctx.source_type.unwrap_or(SourceType::Page);
        let board_heading = match source_type {
            SourceType::Board => board::board_title(html),
            SourceType::Page => None,
        };
        let title = resolve_title(&ctx, source_type, &content.title, board_heading);

        let detected_at = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let mut attachments = match Url::parse(url) {
            Ok(page_url) => find_attachments(&page_url, html, &detected_at),
            Err(_) => Vec::new(),
        };
        for attachment in &mut attachments {
            self.sink.process(attachment);
        }
        self.stats.attachments_found += attachments.len();

        // Only the posting header counts as a confident date; the fallback
        // scan gates recency but never becomes part of the record.
        let created_at = view_meta.created_at.clone();
        let has_explicit_date = created_at.is_some();

        let board_name = match source_type {
            SourceType::Board => ctx.board_name.clone(),
            SourceType::Page => non_empty(&content.title).or_else(|| ctx.name.clone()),
        };

        let text = ctx.text_override.as_deref().unwrap_or(&content.text);

        let doc = normalize(
            url,
            &title,
            text,
            DocContext {
                source_type: Some(source_type),
                site: ctx.site.clone(),
                board_name,
                display_title: non_empty(&title),
                author: view_meta.author,
                created_at,
                has_explicit_date,
                view_count: view_meta.view_count,
                attachments,
                images: content.images,
            },
        );

        let path = match self.store.save_document(&doc) {
            Ok(path) => path,
            Err(e) => {
                warn!("store failed for {}: {:#}", url, e);
                self.stats.failed += 1;
                return CrawlOutcome::Failed(e.to_string());
            }
        };

        self.saved_pages.push(PageSummary {
            url: url.to_string(),
            file: path.display().to_string(),
            title: title.clone(),
            text_length: text.chars().count(),
        });
        self.existing_urls.insert(url.to_string());
        self.stats.success += 1;

        info!(
            "saved {} ({} chars, {} words, {} paragraphs)",
            doc.doc_id,
            text.chars().count(),
            content.word_count,
            content.paragraphs
        );

        self.notifier.notify(url, &title).await;

        CrawlOutcome::Saved(path)
    }

    /// Walk a board listing page by page and crawl every posting found.
    pub async fn crawl_board(&mut self, target: &BoardTarget) {
        info!("[{}] board crawl: {}", target.name, target.url);

        let mut page = 0;
        loop {
            let page_url = listing::page_offset_url(&target.url, page);
            let html = match self.fetcher.get(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("[{}] listing fetch failed: {:#}", target.name, e);
                    break;
                }
            };

            let links = listing::find_article_links(&page_url, &html);
            if links.is_empty() {
                info!("[{}] page {}: no articles, stopping", target.name, page + 1);
                break;
            }
            info!("[{}] page {}: {} articles", target.name, page + 1, links.len());

            for link in &links {
                let ctx = PageContext::board(&target.name, target.skip_date_filter);
                self.crawl_page(link, ctx).await;
            }

            page += 1;
            if target.max_pages > 0 && page >= target.max_pages {
                info!("[{}] reached max pages ({})", target.name, target.max_pages);
                break;
            }
        }
    }

    /// Academic schedule listing: every page is itself a document, and an
    /// unchanged first row means nothing new was prepended, so the whole
    /// listing is skipped after one fetch.
    pub async fn crawl_schedule(&mut self, url: &str) {
        info!("schedule crawl: {}", url);

        let mut page = 0;
        loop {
            let page_url = listing::page_offset_url(url, page);

            if self.existing_urls.contains(&page_url) {
                self.stats.skipped += 1;
                page += 1;
                continue;
            }

            let html = match self.fetcher.get(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("schedule fetch failed: {:#}", e);
                    break;
                }
            };

            if page == 0 {
                if let Some(signature) = listing::first_row_signature(&html, SCHEDULE_MIN_CELLS) {
                    if self.meta.first_row_signature(SCHEDULE_KEY) == Some(signature.as_str()) {
                        info!("schedule unchanged, skipping listing");
                        break;
                    }
                    info!("schedule changed, recrawling listing");
                    self.meta.set_first_row_signature(SCHEDULE_KEY, &signature);
                }
            }

            if listing::count_rows(&html, SCHEDULE_MIN_CELLS) == 0 {
                info!("schedule page {}: no rows, stopping", page + 1);
                break;
            }

            self.stats.total += 1;
            let ctx = PageContext {
                skip_date_filter: true,
                title_suffix: Some(format!(" - 페이지 {}", page + 1)),
                ..PageContext::default()
            };
            self.process_html(&page_url, &html, ctx).await;

            page += 1;
        }
    }

    /// Daily menu page: recrawled at most once per calendar day.
    pub async fn crawl_daily(&mut self, target: &DailyTarget) {
        info!("[{}] daily crawl: {}", target.name, target.url);

        let key = target.url.rsplit('/').next().unwrap_or(&target.url).to_string();
        let today = Local::now().date_naive();

        if self.existing_urls.contains(&target.url) {
            if self.meta.crawled_on(&key, today) {
                info!("[{}] already crawled today, skipping", target.name);
                self.stats.skipped += 1;
                return;
            }
            if self.meta.last_crawl(&key).is_some() {
                info!("[{}] new day, recrawling", target.name);
                self.existing_urls.remove(&target.url);
            } else {
                info!("[{}] already crawled, skipping", target.name);
                self.stats.skipped += 1;
                return;
            }
        }

        self.stats.total += 1;
        let html = match self.fetcher.get(&target.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("[{}] fetch failed: {:#}", target.name, e);
                self.stats.failed += 1;
                return;
            }
        };

        let menu = listing::render_menu_table(&html);
        let ctx = PageContext {
            name: Some(target.name.clone()),
            title_override: Some(target.name.clone()),
            skip_date_filter: true,
            allow_low_quality: true,
            text_override: if menu.is_empty() { None } else { Some(menu) },
            ..PageContext::default()
        };
        if let CrawlOutcome::Saved(_) = self.process_html(&target.url, &html, ctx).await {
            self.meta.mark_crawled(&key);
        }
    }

    /// Crawl every static page named by the sitemap, gating on `<lastmod>`.
    pub async fn crawl_sitemap(&mut self, target: &SitemapTarget) {
        info!("sitemap crawl: {}", target.url);

        let xml = match self.fetcher.get(&target.url).await {
            Ok(xml) => xml,
            Err(e) => {
                warn!("sitemap fetch failed: {:#}", e);
                return;
            }
        };
        let entries = match sitemap::parse_sitemap(&xml) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("sitemap parse failed: {:#}", e);
                return;
            }
        };

        let total = entries.len();
        let pages = sitemap::filter_static_pages(entries, target.prefix.as_deref(), &target.exclude);
        info!("sitemap: {} urls, {} static candidates", total, pages.len());

        let pb = ProgressBar::new(pages.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        for entry in &pages {
            let ctx = PageContext {
                name: Some(entry.loc.clone()),
                lastmod: entry.lastmod.clone(),
                ..PageContext::default()
            };
            self.crawl_page(&entry.loc, ctx).await;
            pb.inc(1);
        }
        pb.finish_and_clear();
    }
}

fn resolve_title(
    ctx: &PageContext,
    source_type: SourceType,
    content_title: &str,
    board_heading: Option<String>,
) -> String {
    if let Some(title) = &ctx.title_override {
        return title.clone();
    }
    let base = match source_type {
        SourceType::Board => board_heading
            .or_else(|| non_empty(content_title))
            .or_else(|| ctx.board_name.clone())
            .or_else(|| ctx.name.clone())
            .unwrap_or_default(),
        SourceType::Page => ctx
            .name
            .clone()
            .or_else(|| non_empty(content_title))
            .unwrap_or_default(),
    };
    match &ctx.title_suffix {
        Some(suffix) => format!("{}{}", base, suffix),
        None => base,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizedDocument;

    fn test_crawler(dir: &std::path::Path) -> Crawler {
        let config = CrawlConfig {
            output_dir: dir.to_path_buf(),
            ..CrawlConfig::default()
        };
        Crawler::new(config).unwrap()
    }

    #[tokio::test]
    async fn pipeline_saves_normalized_document_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = test_crawler(dir.path());

        let html = std::fs::read_to_string("tests/fixtures/notice_view.html").unwrap();
        let url = "https://www.kumoh.ac.kr/ko/sub06_01_01_01.do?mode=view&articleNo=545717";
        let ctx = PageContext::board("공지사항 학사안내", false);

        let outcome = crawler.process_html(url, &html, ctx.clone()).await;
        let CrawlOutcome::Saved(path) = outcome else {
            panic!("expected save, got {:?}", outcome)
        };

        let doc: NormalizedDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.doc_id, "www_notice_545717");
        assert_eq!(doc.source_type, SourceType::Board);
        assert_eq!(doc.title.as_deref(), Some("2026학년도 1학기 수강신청 일정 안내"));
        assert_eq!(doc.board_name.as_deref(), Some("공지사항 학사안내"));
        assert_eq!(doc.author.as_deref(), Some("학사지원팀"));
        assert_eq!(doc.view_count, Some(1532));
        assert_eq!(doc.created_at.as_deref(), Some("2026-01-15"));
        assert!(doc.has_explicit_date);
        assert!(doc.main_text.contains("수강신청 기간"));
        assert!(!doc.main_text.contains("Copyright"));
        // hwp + pdf links and the editor image.
        assert_eq!(doc.attachments.len(), 3);
        assert!(doc
            .attachments
            .iter()
            .all(|a| a.status.as_deref() == Some("metadata_only")));

        crawler.finish().unwrap();

        // Same URL again: skipped before any fetch would happen.
        let outcome = crawler.crawl_page(url, ctx.clone()).await;
        assert!(matches!(outcome, CrawlOutcome::Skipped));

        // A fresh crawler seeded from the saved index skips it too.
        let mut second = test_crawler(dir.path());
        let outcome = second.crawl_page(url, ctx).await;
        assert!(matches!(outcome, CrawlOutcome::Skipped));
        assert_eq!(second.stats.skipped, 1);
    }

    #[tokio::test]
    async fn quality_rejection_counts_as_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = test_crawler(dir.path());

        let outcome = crawler
            .process_html(
                "https://www.kumoh.ac.kr/ko/empty.do",
                "<html><head><title>빈 페이지</title></head><body>내용 없음</body></html>",
                PageContext::default(),
            )
            .await;
        assert!(matches!(outcome, CrawlOutcome::Filtered(_)));
        assert_eq!(crawler.stats.filtered, 1);
        assert_eq!(crawler.stats.success, 0);
    }

    #[tokio::test]
    async fn stale_posting_is_date_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = test_crawler(dir.path());

        let body = "이 문단은 날짜 필터 동작을 확인하기 위한 충분히 긴 본문입니다. ".repeat(10);
        let html = format!(
            "<html><head><title>옛 공지</title></head><body>\
             <div class=\"board-view-information\">\
             <dl><dt>작성일</dt><dd>2019.03.01</dd></dl></div>\
             <main><p>{}</p></main></body></html>",
            body
        );

        let outcome = crawler
            .process_html(
                "https://www.kumoh.ac.kr/ko/old.do?mode=view&articleNo=1",
                &html,
                PageContext::board("옛 게시판", false),
            )
            .await;
        assert!(matches!(outcome, CrawlOutcome::Filtered(_)));
        assert_eq!(crawler.stats.filtered_date, 1);

        // The same posting passes when the source opts out of the gate.
        let outcome = crawler
            .process_html(
                "https://www.kumoh.ac.kr/ko/old.do?mode=view&articleNo=1",
                &html,
                PageContext::board("옛 게시판", true),
            )
            .await;
        assert!(matches!(outcome, CrawlOutcome::Saved(_)));
    }

    #[test]
    fn board_title_resolution_order() {
        let ctx = PageContext::board("통학버스 공지", false);
        assert_eq!(
            resolve_title(&ctx, SourceType::Board, "문서 제목", Some("게시글 제목".into())),
            "게시글 제목"
        );
        assert_eq!(
            resolve_title(&ctx, SourceType::Board, "문서 제목", None),
            "문서 제목"
        );
        assert_eq!(resolve_title(&ctx, SourceType::Board, "", None), "통학버스 공지");
    }

    #[test]
    fn page_title_prefers_source_name() {
        let ctx = PageContext::page("학과 소개");
        assert_eq!(resolve_title(&ctx, SourceType::Page, "사이트 제목", None), "학과 소개");

        let anon = PageContext::default();
        assert_eq!(resolve_title(&anon, SourceType::Page, "사이트 제목", None), "사이트 제목");
    }

    #[test]
    fn title_override_and_suffix() {
        let ctx = PageContext {
            title_override: Some("학생식당".into()),
            title_suffix: Some(" - 페이지 2".into()),
            ..PageContext::default()
        };
        // Override wins outright, suffix is ignored with it.
        assert_eq!(resolve_title(&ctx, SourceType::Page, "x", None), "학생식당");

        let suffixed = PageContext {
            title_suffix: Some(" - 페이지 2".into()),
            ..PageContext::default()
        };
        assert_eq!(
            resolve_title(&suffixed, SourceType::Page, "학사일정", None),
            "학사일정 - 페이지 2"
        );
    }
}
