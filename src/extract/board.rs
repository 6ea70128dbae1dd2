use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node};

use super::dom;

/// Posting header of a board detail page: 작성자 / 조회수 / 작성일.
#[derive(Debug, Default, Clone)]
pub struct BoardMeta {
    pub author: Option<String>,
    pub view_count: Option<u32>,
    pub created_at: Option<String>,
}

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[.-](\d{2})[.-](\d{2})").unwrap());
static DATEISH_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)date|time").unwrap());

/// Post title from the board header block (h4/strong inside the title area),
/// which is more precise than the document `<title>`.
pub fn board_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let head = find_by_class(&doc, "title-area")?;
    for tag in ["h4", "h3", "strong"] {
        let hit = doc
            .tree
            .get(head)?
            .descendants()
            .find(|node| matches!(node.value(), Node::Element(el) if el.name() == tag));
        if let Some(node) = hit {
            let text = dom::label_text(&doc, node.id());
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Author, view count, and posted date from the dl/dt/dd rows of the board
/// information block. Missing block or rows leave the fields None.
pub fn board_meta(html: &str) -> BoardMeta {
    let doc = Html::parse_document(html);
    let mut meta = BoardMeta::default();

    let Some(info) = find_by_class(&doc, "board-view-information") else {
        return meta;
    };
    let Some(info_ref) = doc.tree.get(info) else {
        return meta;
    };

    for dl in info_ref
        .descendants()
        .filter(|n| matches!(n.value(), Node::Element(el) if el.name() == "dl"))
    {
        let dt = dl
            .descendants()
            .find(|n| matches!(n.value(), Node::Element(el) if el.name() == "dt"));
        let dd = dl
            .descendants()
            .find(|n| matches!(n.value(), Node::Element(el) if el.name() == "dd"));
        let (Some(dt), Some(dd)) = (dt, dd) else {
            continue;
        };

        let key = dom::label_text(&doc, dt.id());
        let val = dom::label_text(&doc, dd.id());

        if key.contains("작성자") {
            meta.author = Some(val);
        } else if key.contains("조회") {
            let digits: String = val.chars().filter(|c| c.is_ascii_digit()).collect();
            meta.view_count = digits.parse().ok();
        } else if key.contains("작성일") {
            meta.created_at = iso_date(&val);
        }
    }

    meta
}

/// Fallback date scan for pages without the board information block:
/// any `<dd>` text, then date-ish class names, then article meta tags.
pub fn fallback_date(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    for node in doc.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            if el.name() == "dd" {
                if let Some(date) = iso_date(&dom::label_text(&doc, node.id())) {
                    return Some(date);
                }
            }
        }
    }

    for node in doc.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            let class_hit = el
                .attr("class")
                .is_some_and(|c| DATEISH_CLASS_RE.is_match(c));
            if class_hit {
                if let Some(date) = iso_date(&dom::label_text(&doc, node.id())) {
                    return Some(date);
                }
            }
        }
    }

    for node in doc.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            if el.name() == "meta"
                && matches!(
                    el.attr("property"),
                    Some("article:published_time") | Some("article:modified_time")
                )
            {
                if let Some(date) = el.attr("content").and_then(|c| iso_date(c)) {
                    return Some(date);
                }
            }
        }
    }

    None
}

fn iso_date(text: &str) -> Option<String> {
    DATE_RE
        .captures(text)
        .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
}

fn find_by_class(doc: &Html, class: &str) -> Option<ego_tree::NodeId> {
    doc.tree
        .root()
        .descendants()
        .find(|node| match node.value() {
            Node::Element(el) => el
                .attr("class")
                .is_some_and(|c| c.split_whitespace().any(|t| t == class)),
            _ => false,
        })
        .map(|node| node.id())
}
