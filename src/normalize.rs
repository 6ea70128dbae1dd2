use chrono::Local;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::attachments::AttachmentDescriptor;
use crate::extract::PageImage;

/// Where a document came from: a standalone page or a board posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Page,
    Board,
}

/// Query parameter the campus boards use to number articles.
const ARTICLE_PARAM: &str = "articleNo";

/// Path suffixes stripped before a path becomes a slug.
const SLUG_EXTENSIONS: &[&str] = &[".do", ".html", ".htm", ".php", ".jsp", ".asp", ".aspx"];

/// Caller-supplied context for normalization: source kind, board naming,
/// posting metadata, and anything already collected from the page.
#[derive(Debug, Default, Clone)]
pub struct DocContext {
    pub source_type: Option<SourceType>,
    pub site: Option<String>,
    pub board_name: Option<String>,
    pub display_title: Option<String>,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub has_explicit_date: bool,
    pub view_count: Option<u32>,
    pub attachments: Vec<AttachmentDescriptor>,
    pub images: Vec<PageImage>,
}

/// The persisted unit. `doc_id` is deterministic for a given logical
/// document, no matter how or when the URL was reached, which is what makes
/// re-saves idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub doc_id: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub site: String,
    pub doc_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub has_explicit_date: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u32>,
    pub main_text: String,
    pub attachments: Vec<AttachmentDescriptor>,
    pub images: Vec<PageImage>,
    pub crawled_at: String,
}

/// Build the normalized record for one crawled page. Identity rules:
/// board postings key on the article number when the URL carries one,
/// everything else keys on a path-derived slug, both prefixed with the
/// host's leading label.
pub fn normalize(url: &str, title: &str, text: &str, ctx: DocContext) -> NormalizedDocument {
    let parsed = Url::parse(url).ok();

    let site = ctx
        .site
        .clone()
        .or_else(|| parsed.as_ref().and_then(site_code))
        .unwrap_or_else(|| "unknown".to_string());

    let source_type = ctx.source_type.unwrap_or(SourceType::Page);

    let doc_id = match source_type {
        SourceType::Board => match parsed.as_ref().and_then(article_number) {
            Some(no) => format!("{}_notice_{}", site, no),
            None => format!("{}_notice_{}", site, slug_for(parsed.as_ref(), url)),
        },
        SourceType::Page => format!("{}_page_{}", site, slug_for(parsed.as_ref(), url)),
    };

    let doc_type = if text.is_empty() && !ctx.images.is_empty() {
        "image_html"
    } else {
        "html"
    };

    NormalizedDocument {
        doc_id,
        source_url: url.to_string(),
        source_type,
        site,
        doc_type: doc_type.to_string(),
        board_name: ctx.board_name,
        title: if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        },
        display_title: ctx.display_title,
        author: ctx.author,
        created_at: ctx.created_at,
        has_explicit_date: ctx.has_explicit_date,
        view_count: ctx.view_count,
        main_text: text.to_string(),
        attachments: ctx.attachments,
        images: ctx.images,
        crawled_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

/// Leading label of the host: `bus.kumoh.ac.kr` → `bus`.
fn site_code(url: &Url) -> Option<String> {
    url.host_str()
        .and_then(|h| h.split('.').next())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn article_number(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == ARTICLE_PARAM)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// Path-derived identifier: separators become underscores, known suffix
/// extensions are dropped. Query strings never participate, so incidental
/// parameters cannot split a document's identity.
fn slug_for(parsed: Option<&Url>, raw: &str) -> String {
    let path = match parsed {
        Some(url) => url.path().trim_matches('/').to_string(),
        None => raw
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect(),
    };

    let mut slug = path;
    for ext in SLUG_EXTENSIONS {
        if slug.to_lowercase().ends_with(ext) {
            slug.truncate(slug.len() - ext.len());
            break;
        }
    }
    let slug = slug.replace('/', "_");
    if slug.is_empty() {
        "root".to_string()
    } else {
        slug
    }
}
