use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::extract::dom;

/// File extensions treated as downloadable attachments.
const DOWNLOAD_EXTENSIONS: &[&str] = &[".pdf", ".hwp", ".docx", ".xlsx", ".pptx", ".zip"];

/// Href fragments that must never be treated as attachments.
const EXCLUDE_PATTERNS: &[&str] = &["/cms/fileDownload.do"];

/// Page-chrome imagery (logos, buttons, background art) skipped when
/// collecting content images.
const ICON_IMAGE_KEYWORDS: &[&str] = &[
    "/_res/ko/img/icon/",
    "/_res/ko/img/common/",
    "logo",
    "btn_",
    "btn-",
    "bg_subvisual",
    "wa-mark",
    "bubble_tail",
    "btn_top_go",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".svg"];

/// One discovered downloadable link or content image. The crawler only fills
/// the descriptor fields; a sink collaborator may enrich the rest after an
/// upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub page_url: String,
    pub link_text: String,
    pub download_url: String,
    pub detected_at: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
}

/// Out-of-band upload collaborator. The crawler hands over each descriptor
/// once; implementations may fill in status/filename/hash/storage fields.
pub trait AttachmentSink {
    fn process(&self, attachment: &mut AttachmentDescriptor);
}

/// Default sink: record the descriptor, upload nothing.
pub struct MetadataOnlySink;

impl AttachmentSink for MetadataOnlySink {
    fn process(&self, attachment: &mut AttachmentDescriptor) {
        attachment.status = Some("metadata_only".to_string());
    }
}

/// Scan a page for attachment links and content images, resolving every
/// candidate against the page URL.
pub fn find_attachments(page_url: &Url, html: &str, detected_at: &str) -> Vec<AttachmentDescriptor> {
    let doc = Html::parse_document(html);
    let mut found = Vec::new();

    for node in doc.tree.root().descendants() {
        let Node::Element(el) = node.value() else {
            continue;
        };

        if el.name() == "a" {
            let Some(href) = el.attr("href") else { continue };
            if !is_download_href(href) {
                continue;
            }
            let Ok(abs) = page_url.join(href) else { continue };
            found.push(AttachmentDescriptor {
                page_url: page_url.to_string(),
                link_text: dom::label_text(&doc, node.id()),
                download_url: abs.to_string(),
                detected_at: detected_at.to_string(),
                kind: None,
                status: None,
                filename: None,
                sha256: None,
                file_size: None,
                storage_url: None,
            });
        } else if el.name() == "img" {
            let Some(src) = el.attr("src") else { continue };
            if !is_content_image(src) {
                continue;
            }
            let Ok(abs) = page_url.join(src) else { continue };
            let alt = el.attr("alt").unwrap_or_default().trim().to_string();
            found.push(AttachmentDescriptor {
                page_url: page_url.to_string(),
                link_text: if alt.is_empty() { "(image)".to_string() } else { alt },
                download_url: abs.to_string(),
                detected_at: detected_at.to_string(),
                kind: Some("image".to_string()),
                status: None,
                filename: None,
                sha256: None,
                file_size: None,
                storage_url: None,
            });
        }
    }

    found
}

fn is_download_href(href: &str) -> bool {
    if EXCLUDE_PATTERNS.iter().any(|p| href.contains(p)) {
        return false;
    }
    let lower = href.to_lowercase();
    lower.contains("mode=download")
        || lower.contains("download")
        || DOWNLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_content_image(src: &str) -> bool {
    if ICON_IMAGE_KEYWORDS.iter().any(|key| src.contains(key)) {
        return false;
    }
    let no_query = src.split('?').next().unwrap_or(src).to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| no_query.ends_with(ext))
        || no_query.contains("editorimage.do")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> Vec<AttachmentDescriptor> {
        let page = Url::parse("https://www.kumoh.ac.kr/ko/sub06_01_01_01.do?mode=view&articleNo=1")
            .unwrap();
        find_attachments(&page, html, "2026-08-08T10:00:00")
    }

    #[test]
    fn detects_extension_and_mode_download() {
        let found = scan(
            "<body><a href=\"/files/plan.PDF\">계획서</a>\
             <a href=\"?mode=download&attachNo=3\">첨부</a>\
             <a href=\"/ko/page.do\">일반 링크</a></body>",
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].link_text, "계획서");
        assert_eq!(found[0].download_url, "https://www.kumoh.ac.kr/files/plan.PDF");
        assert!(found[1].download_url.contains("mode=download"));
        assert!(found[1].download_url.contains("/ko/sub06_01_01_01.do"));
    }

    #[test]
    fn honors_exclude_patterns() {
        let found = scan("<body><a href=\"/cms/fileDownload.do?id=9\">excluded</a></body>");
        assert!(found.is_empty());
    }

    #[test]
    fn collects_content_images_not_icons() {
        let found = scan(
            "<body><img src=\"/_res/ko/img/common/logo.png\" alt=\"로고\">\
             <img src=\"/upload/editorImage.do?id=7\" alt=\"\">\
             <img src=\"/upload/poster.jpg?x=1\" alt=\"포스터\"></body>",
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind.as_deref(), Some("image"));
        assert_eq!(found[0].link_text, "(image)");
        assert_eq!(found[1].link_text, "포스터");
    }

    #[test]
    fn metadata_only_sink_marks_status() {
        let mut found = scan("<body><a href=\"/files/a.zip\">zip</a></body>");
        MetadataOnlySink.process(&mut found[0]);
        assert_eq!(found[0].status.as_deref(), Some("metadata_only"));
    }
}
