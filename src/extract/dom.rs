use std::sync::LazyLock;

use regex::Regex;
use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node};

/// Tags that are never content, removed document-wide before region selection.
pub const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe",
    "nav", "header", "footer", "aside",
    "form", "button", "input", "select", "textarea",
];

/// Class/id fragments that mark page chrome. Matched case-insensitively
/// against each class token and the whole id, inside the selected region only.
pub const REMOVE_PATTERNS: &[&str] = &[
    "nav", "sidebar", "header", "footer",
    "breadcrumb", "share", "social", "comment",
    "ad", "advertisement", "banner", "popup",
    "login", "search", "pagination", "paging",
    "related", "recommend", "popular", "recent",
    "copyright", "privacy", "terms",
    "gnb", "lnb", "snb",
    "top-menu", "bottom-menu", "side-menu",
    "util-menu", "quick-menu", "floating",
    "footer-wrapper",
];

/// Class/id fragments that suggest a main-content container.
pub const CONTENT_PATTERNS: &[&str] = &[
    "content", "article", "main", "body",
    "post", "entry", "text", "detail",
    "board", "notice", "view",
];

// Elements after which the text walk emits a paragraph break vs a line break.
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6",
    "div", "section", "article", "main",
    "ul", "ol", "dl", "table", "blockquote", "pre", "figure",
];
const LINE_TAGS: &[&str] = &["li", "tr", "td", "th", "dt", "dd", "caption", "hr"];

// The campus CMS layout wrapper penalised during container scoring: a `main`
// region carrying the container id usually wraps the real content block.
const LAYOUT_WRAPPER_TAG: &str = "main";
const LAYOUT_WRAPPER_PENALTY: i64 = 1000;

static DISPLAY_NONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)display\s*:\s*none").unwrap());
static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

// ── Removal passes ──

/// Detach every occurrence of the given tags from the whole document.
pub fn remove_tags(html: &mut Html, tags: &[&str]) {
    let doomed: Vec<NodeId> = html
        .tree
        .root()
        .descendants()
        .filter(|node| match node.value() {
            Node::Element(el) => tags.contains(&el.name()),
            _ => false,
        })
        .map(|node| node.id())
        .collect();
    detach_all(html, &doomed);
}

/// Remove non-content scaffolding: the fixed tag set, HTML comments, and
/// anything hidden via inline style or the `hidden` attribute.
pub fn strip_chrome(html: &mut Html) {
    let mut doomed = Vec::new();
    for node in html.tree.root().descendants() {
        match node.value() {
            Node::Comment(_) => doomed.push(node.id()),
            Node::Element(el) => {
                if REMOVE_TAGS.contains(&el.name()) || el.attr("hidden").is_some() {
                    doomed.push(node.id());
                } else if let Some(style) = el.attr("style") {
                    if DISPLAY_NONE_RE.is_match(style) {
                        doomed.push(node.id());
                    }
                }
            }
            _ => {}
        }
    }
    detach_all(html, &doomed);
}

/// Second removal pass, scoped to the selected region so content elsewhere in
/// the document never influences it.
pub fn remove_by_patterns(html: &mut Html, region: NodeId) {
    let Some(region_ref) = html.tree.get(region) else {
        return;
    };
    let doomed: Vec<NodeId> = region_ref
        .descendants()
        .skip(1)
        .filter(|node| match node.value() {
            Node::Element(el) => {
                attr_matches(el.attr("class"), REMOVE_PATTERNS)
                    || attr_matches(el.attr("id"), REMOVE_PATTERNS)
            }
            _ => false,
        })
        .map(|node| node.id())
        .collect();
    detach_all(html, &doomed);
}

/// Unwrap anchors inside the region: children are spliced into the parent in
/// place of the `<a>`, so link text survives without the element.
pub fn unwrap_anchors(html: &mut Html, region: NodeId) {
    let anchors = collect_named(html, region, "a");
    for anchor in anchors {
        let Some(node) = html.tree.get(anchor) else {
            continue;
        };
        if node.parent().is_none() {
            continue;
        }
        let children: Vec<NodeId> = node.children().map(|c| c.id()).collect();
        for child in children {
            if let Some(mut slot) = html.tree.get_mut(anchor) {
                slot.insert_id_before(child);
            }
        }
        if let Some(mut slot) = html.tree.get_mut(anchor) {
            slot.detach();
        }
    }
}

/// Drop `<img>` elements inside the region entirely.
pub fn drop_images(html: &mut Html, region: NodeId) {
    let doomed = collect_named(html, region, "img");
    detach_all(html, &doomed);
}

fn collect_named(html: &Html, region: NodeId, tag: &str) -> Vec<NodeId> {
    let Some(region_ref) = html.tree.get(region) else {
        return Vec::new();
    };
    region_ref
        .descendants()
        .filter(|node| matches!(node.value(), Node::Element(el) if el.name() == tag))
        .map(|node| node.id())
        .collect()
}

fn detach_all(html: &mut Html, ids: &[NodeId]) {
    for &id in ids {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn attr_matches(attr: Option<&str>, patterns: &[&str]) -> bool {
    let Some(attr) = attr else { return false };
    let lower = attr.to_lowercase();
    lower
        .split_whitespace()
        .any(|token| patterns.iter().any(|p| token.contains(p)))
}

// ── Region selection ──

/// Pick the most likely main-content subtree. Ordered heuristic, first hit
/// wins; always returns some node (worst case the document root).
pub fn find_main_region(html: &Html, container_id: &str) -> NodeId {
    // Platform container id, possibly duplicated between a layout wrapper and
    // the real content block: take the one with the most text, penalising
    // the wrapper tag.
    let mut best: Option<(i64, NodeId)> = None;
    for node in html.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            if el.attr("id") == Some(container_id) {
                let penalty = if el.name() == LAYOUT_WRAPPER_TAG {
                    LAYOUT_WRAPPER_PENALTY
                } else {
                    0
                };
                let score = non_ws_len(html, node.id()) as i64 - penalty;
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, node.id()));
                }
            }
        }
    }
    if let Some((_, id)) = best {
        return id;
    }

    for tag in ["main", "article"] {
        if let Some(id) = first_named(html, tag) {
            return id;
        }
    }

    if let Some(id) = html
        .tree
        .root()
        .descendants()
        .find(|node| matches!(node.value(), Node::Element(el) if el.attr("role") == Some("main")))
        .map(|node| node.id())
    {
        return id;
    }

    // div/section whose class or id looks content-like, largest text wins.
    let mut best: Option<(usize, NodeId)> = None;
    for node in html.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            if (el.name() == "div" || el.name() == "section")
                && (attr_matches(el.attr("class"), CONTENT_PATTERNS)
                    || attr_matches(el.attr("id"), CONTENT_PATTERNS))
            {
                let score = non_ws_len(html, node.id());
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, node.id()));
                }
            }
        }
    }
    if let Some((_, id)) = best {
        return id;
    }

    first_named(html, "body").unwrap_or_else(|| html.tree.root().id())
}

pub fn first_named(html: &Html, tag: &str) -> Option<NodeId> {
    html.tree
        .root()
        .descendants()
        .find(|node| matches!(node.value(), Node::Element(el) if el.name() == tag))
        .map(|node| node.id())
}

// ── Text extraction ──

/// Concatenated text of a subtree, no separators.
pub fn subtree_text(html: &Html, id: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = html.tree.get(id) {
        for desc in node.descendants() {
            if let Node::Text(t) = desc.value() {
                out.push_str(t);
            }
        }
    }
    out
}

/// Subtree text with whitespace collapsed to single spaces, for labels.
pub fn label_text(html: &Html, id: NodeId) -> String {
    subtree_text(html, id)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_ws_len(html: &Html, id: NodeId) -> usize {
    subtree_text(html, id)
        .chars()
        .filter(|c| !c.is_whitespace())
        .count()
}

/// Depth-first text walk over the region: block-level elements end with a
/// blank line, row/item-level ones with a newline, so paragraph boundaries
/// survive into the normalized text.
pub fn region_text(html: &Html, region: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = html.tree.get(region) {
        walk_text(node, &mut out);
    }
    out
}

fn walk_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(t) => out.push_str(t),
        Node::Element(el) => {
            if el.name() == "br" {
                out.push('\n');
                return;
            }
            for child in node.children() {
                walk_text(child, out);
            }
            if BLOCK_TAGS.contains(&el.name()) {
                out.push_str("\n\n");
            } else if LINE_TAGS.contains(&el.name()) {
                out.push('\n');
            }
        }
        _ => {
            for child in node.children() {
                walk_text(child, out);
            }
        }
    }
}

/// Collapse space runs, trim every line, and reduce any run of blank lines to
/// a single one, so paragraphs are exactly the blocks between blank lines.
pub fn normalize_text(raw: &str) -> String {
    let collapsed: Vec<String> = raw
        .lines()
        .map(|line| SPACE_RUN_RE.replace_all(line, " ").trim().to_string())
        .collect();

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_pending = false;
    for line in &collapsed {
        if line.is_empty() {
            if !lines.is_empty() {
                blank_pending = true;
            }
        } else {
            if blank_pending {
                lines.push("");
                blank_pending = false;
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// All text nodes trimmed and joined by single spaces. Mirrors how the
/// quality checks measure page text.
pub fn spaced_text(html: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in html.tree.root().descendants() {
        if let Node::Text(t) = node.value() {
            let trimmed = t.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }
    parts.join(" ")
}

/// Text of the `<title>` element, if the document has one.
pub fn title_text(html: &Html) -> Option<String> {
    first_named(html, "title").map(|id| label_text(html, id))
}

pub fn first_heading_text(html: &Html) -> Option<String> {
    first_named(html, "h1").map(|id| label_text(html, id))
}
