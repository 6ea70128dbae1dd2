pub mod board;
pub mod dom;

use scraper::{Html, Node};
use serde::{Deserialize, Serialize};

/// How many links/images make it into the extracted metadata.
const METADATA_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageImage {
    pub src: String,
    pub alt: String,
}

/// Cleaned main-content text plus the structural metadata around it.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub text: String,
    pub title: String,
    pub paragraphs: usize,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    pub char_count: usize,
    pub word_count: usize,
}

/// Locates the main content inside arbitrary HTML and returns clean text.
/// Malformed input degrades to empty output, never an error.
pub struct ContentExtractor {
    pub keep_links: bool,
    pub keep_images: bool,
    pub container_id: String,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ContentExtractor {
    pub fn new(keep_links: bool, keep_images: bool) -> Self {
        Self {
            keep_links,
            keep_images,
            container_id: "jwxe_main_content".to_string(),
        }
    }

    /// Main-content plain text: strip chrome, select the region, prune it by
    /// pattern, then flatten to normalized paragraphs.
    pub fn extract_clean_text(&self, html: &str) -> String {
        let mut doc = Html::parse_document(html);

        dom::strip_chrome(&mut doc);
        let region = dom::find_main_region(&doc, &self.container_id);
        dom::remove_by_patterns(&mut doc, region);

        if !self.keep_links {
            dom::unwrap_anchors(&mut doc, region);
        }
        if !self.keep_images {
            dom::drop_images(&mut doc, region);
        }

        dom::normalize_text(&dom::region_text(&doc, region))
    }

    /// Text plus title, paragraph count, links, and images. The title and the
    /// link list come from the whole document; images only from the main
    /// region, so site-wide decoration stays out of the image list.
    pub fn extract_with_metadata(&self, html: &str) -> ExtractedContent {
        let doc = Html::parse_document(html);

        let title = dom::title_text(&doc)
            .or_else(|| dom::first_heading_text(&doc))
            .unwrap_or_default();

        let mut links = collect_links(&doc);
        links.truncate(METADATA_LIMIT);

        let region = dom::find_main_region(&doc, &self.container_id);
        let mut images = collect_images(&doc, region);
        images.truncate(METADATA_LIMIT);

        let text = self.extract_clean_text(html);
        let paragraphs = count_paragraphs(&text);

        ExtractedContent {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            paragraphs,
            text,
            title,
            links,
            images,
        }
    }
}

/// Non-empty blocks between blank lines.
pub fn count_paragraphs(text: &str) -> usize {
    text.split("\n\n").filter(|b| !b.trim().is_empty()).count()
}

fn collect_links(doc: &Html) -> Vec<PageLink> {
    let mut links = Vec::new();
    for node in doc.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            if el.name() == "a" {
                if let Some(href) = el.attr("href") {
                    links.push(PageLink {
                        text: dom::label_text(doc, node.id()),
                        href: href.to_string(),
                    });
                }
            }
        }
    }
    links
}

fn collect_images(doc: &Html, region: ego_tree::NodeId) -> Vec<PageImage> {
    let Some(region_ref) = doc.tree.get(region) else {
        return Vec::new();
    };
    let mut images = Vec::new();
    for node in region_ref.descendants() {
        if let Node::Element(el) = node.value() {
            if el.name() == "img" {
                if let Some(src) = el.attr("src") {
                    images.push(PageImage {
                        src: src.to_string(),
                        alt: el.attr("alt").unwrap_or_default().to_string(),
                    });
                }
            }
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html>
<html>
<head><title>테스트 페이지</title></head>
<body>
  <header><nav class="gnb"><ul><li>메뉴1</li><li>메뉴2</li></ul></nav></header>
  <div class="sidebar">광고 영역</div>
  <main>
    <article>
      <h1>본문 제목</h1>
      <p>이것은 실제 본문 내용입니다. 중요한 정보가 담겨있습니다.</p>
      <p>두 번째 문단입니다. 더 많은 정보가 있습니다.</p>
    </article>
  </main>
  <footer><p>Copyright 2025</p></footer>
</body>
</html>"#;

    #[test]
    fn clean_text_excludes_chrome() {
        let text = ContentExtractor::default().extract_clean_text(SAMPLE);
        assert!(text.contains("실제 본문 내용"));
        assert!(text.contains("두 번째 문단"));
        assert!(!text.contains("메뉴1"));
        assert!(!text.contains("광고 영역"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn metadata_counts_paragraph_blocks() {
        let content = ContentExtractor::default().extract_with_metadata(SAMPLE);
        assert_eq!(content.title, "테스트 페이지");
        assert_eq!(content.paragraphs, 3);
        assert_eq!(content.char_count, content.text.chars().count());
        assert!(content.word_count > 0);
    }

    #[test]
    fn heading_and_paragraphs_without_title_element() {
        let html = "<html><body><nav class=\"gnb\">menu menu</nav>\
                    <main><article><h1>T</h1><p>para one</p><p>para two</p></article></main>\
                    <footer>footer text</footer></body></html>";
        let content = ContentExtractor::default().extract_with_metadata(html);
        assert_eq!(content.title, "T");
        assert!(content.text.contains("para one"));
        assert!(content.text.contains("para two"));
        assert!(!content.text.contains("menu"));
        assert!(!content.text.contains("footer text"));
        assert_eq!(content.paragraphs, 3);
    }

    #[test]
    fn no_body_yields_empty_content() {
        for html in ["", "<!----->", "not html at all <<<>>>"] {
            let content = ContentExtractor::default().extract_with_metadata(html);
            assert_eq!(content.paragraphs, count_paragraphs(&content.text));
        }
        let content = ContentExtractor::default().extract_with_metadata("<head></head>");
        assert_eq!(content.text, "");
        assert_eq!(content.title, "");
        assert_eq!(content.paragraphs, 0);
    }

    #[test]
    fn notice_fixture_full_extraction() {
        let html = std::fs::read_to_string("tests/fixtures/notice_view.html").unwrap();
        let content = ContentExtractor::default().extract_with_metadata(&html);

        assert_eq!(content.title, "공지사항(학사안내) - 금오공과대학교");
        assert!(content.text.contains("수강신청 일정을 다음과 같이 안내"));
        assert!(content.text.contains("054-478-7025"));
        // Chrome stays out: top menus, hidden block, share widget, footer.
        assert!(!content.text.contains("로그인"));
        assert!(!content.text.contains("대학소개"));
        assert!(!content.text.contains("숨김"));
        assert!(!content.text.contains("페이스북"));
        assert!(!content.text.contains("Copyright"));

        // Images come from the selected region only.
        assert_eq!(content.images.len(), 1);
        assert!(content.images[0].src.contains("editorImage.do"));
        assert_eq!(content.images[0].alt, "수강신청 일정표");

        // Links are document-wide, attachment links included.
        assert!(content.links.iter().any(|l| l.href.contains("mode=download")));
        assert!(content.links.len() <= 10);
    }

    #[test]
    fn images_restricted_to_main_region() {
        let html = "<body><div class=\"wrap\"><img src=\"/logo.png\" alt=\"logo\"></div>\
                    <main><p>body</p><img src=\"/photo.jpg\" alt=\"사진\"></main></body>";
        let content = ContentExtractor::default().extract_with_metadata(html);
        assert_eq!(content.images.len(), 1);
        assert_eq!(content.images[0].src, "/photo.jpg");
    }

    #[test]
    fn links_collected_document_wide() {
        let html = "<body><nav><a href=\"/menu\">menu</a></nav>\
                    <main><a href=\"/doc.pdf\">첨부</a></main></body>";
        let content = ContentExtractor::default().extract_with_metadata(html);
        let hrefs: Vec<&str> = content.links.iter().map(|l| l.href.as_str()).collect();
        assert!(hrefs.contains(&"/menu"));
        assert!(hrefs.contains(&"/doc.pdf"));
    }
}
