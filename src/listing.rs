use std::collections::{HashMap, HashSet};

use ego_tree::NodeId;
use scraper::{Html, Node};
use url::Url;

use crate::extract::dom;

/// Rows per listing page on the campus boards; pagination advances
/// `article.offset` in steps of this size.
const PAGE_SIZE: usize = 10;

/// Listing URL for the n-th page (0-based).
pub fn page_offset_url(base: &str, page: usize) -> String {
    if page == 0 {
        return base.to_string();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}article.offset={}", base, sep, page * PAGE_SIZE)
}

/// Article detail links on a board listing page: anchors whose href carries
/// the view mode or an article number, resolved against the listing URL,
/// deduplicated in document order.
pub fn find_article_links(listing_url: &str, html: &str) -> Vec<String> {
    let Ok(base) = Url::parse(listing_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for node in doc.tree.root().descendants() {
        let Node::Element(el) = node.value() else {
            continue;
        };
        if el.name() != "a" {
            continue;
        }
        let Some(href) = el.attr("href") else { continue };
        if !href.contains("mode=view") && !href.contains("articleNo") {
            continue;
        }
        let Ok(abs) = base.join(href) else { continue };
        let abs = abs.to_string();
        if seen.insert(abs.clone()) {
            links.push(abs);
        }
    }
    links
}

/// Number of table rows that look like data rows: at least `min_cells`
/// `<td>` cells.
pub fn count_rows(html: &str, min_cells: usize) -> usize {
    let doc = Html::parse_document(html);
    data_rows(&doc, min_cells).len()
}

/// Cheap fingerprint of a listing that only ever prepends new rows: the
/// first data row's first three cell texts joined with `|`. Equal signatures
/// on consecutive runs mean the whole listing can be skipped.
pub fn first_row_signature(html: &str, min_cells: usize) -> Option<String> {
    let doc = Html::parse_document(html);
    let row = *data_rows(&doc, min_cells).first()?;
    let cells: Vec<String> = row_cells(&doc, row)
        .into_iter()
        .take(3)
        .map(|id| dom::label_text(&doc, id))
        .collect();
    if cells.len() < 2 {
        return None;
    }
    Some(cells.join("|"))
}

fn data_rows(doc: &Html, min_cells: usize) -> Vec<NodeId> {
    let mut rows = Vec::new();
    for node in doc.tree.root().descendants() {
        if let Node::Element(el) = node.value() {
            if el.name() == "tr" && row_cells(doc, node.id()).len() >= min_cells {
                rows.push(node.id());
            }
        }
    }
    rows
}

fn row_cells(doc: &Html, row: NodeId) -> Vec<NodeId> {
    let Some(row_ref) = doc.tree.get(row) else {
        return Vec::new();
    };
    row_ref
        .descendants()
        .filter(|n| matches!(n.value(), Node::Element(el) if el.name() == "td"))
        .map(|n| n.id())
        .collect()
}

/// Flatten the weekly cafeteria table (columns = days, cells = one meal each
/// with a heading `<p>` and `<li>` menu items) into a per-day text block:
///
/// ```text
/// [월(11.24)]
///   중식: menu / menu
///   석식: menu / menu
/// ```
///
/// Returns an empty string when the page has no usable menu table.
pub fn render_menu_table(html: &str) -> String {
    let doc = Html::parse_document(html);

    let Some(table) = pick_menu_table(&doc) else {
        return String::new();
    };

    let Some(thead) = descendant_named(&doc, table, "thead") else {
        return String::new();
    };
    let day_labels: Vec<String> = descendants_named(&doc, thead, "th")
        .into_iter()
        .map(|id| dom::label_text(&doc, id))
        .filter(|t| !t.is_empty())
        .collect();
    if day_labels.is_empty() {
        return String::new();
    }

    let Some(tbody) = descendant_named(&doc, table, "tbody") else {
        return String::new();
    };

    let mut per_day: Vec<HashMap<String, Vec<String>>> = vec![HashMap::new(); day_labels.len()];
    let mut meal_order: Vec<String> = Vec::new();

    for row in descendants_named(&doc, tbody, "tr") {
        for (col, td) in row_cells(&doc, row).into_iter().enumerate() {
            if col >= day_labels.len() {
                break;
            }
            let Some(p) = descendant_named(&doc, td, "p") else {
                continue;
            };
            let meal = dom::label_text(&doc, p);
            if meal.is_empty() {
                continue;
            }
            let items: Vec<String> = descendants_named(&doc, td, "li")
                .into_iter()
                .map(|id| dom::label_text(&doc, id))
                .filter(|t| !t.is_empty())
                .collect();
            if items.is_empty() {
                continue;
            }
            if !meal_order.contains(&meal) {
                meal_order.push(meal.clone());
            }
            per_day[col].entry(meal).or_default().extend(items);
        }
    }

    let mut lines: Vec<String> = Vec::new();
    for (day, label) in day_labels.iter().enumerate() {
        lines.push(format!("[{}]", label));
        for meal in &meal_order {
            if let Some(items) = per_day[day].get(meal) {
                if !items.is_empty() {
                    lines.push(format!("  {}: {}", meal, items.join(" / ")));
                }
            }
        }
        lines.push(String::new());
    }
    lines.join("\n").trim().to_string()
}

/// Prefer the table whose caption names the cafeteria menu, else the first.
fn pick_menu_table(doc: &Html) -> Option<NodeId> {
    let tables: Vec<NodeId> = doc
        .tree
        .root()
        .descendants()
        .filter(|n| matches!(n.value(), Node::Element(el) if el.name() == "table"))
        .map(|n| n.id())
        .collect();
    for &table in &tables {
        if let Some(cap) = descendant_named(doc, table, "caption") {
            if dom::label_text(doc, cap).contains("식당 메뉴 표") {
                return Some(table);
            }
        }
    }
    tables.first().copied()
}

fn descendant_named(doc: &Html, root: NodeId, tag: &str) -> Option<NodeId> {
    descendants_named(doc, root, tag).into_iter().next()
}

fn descendants_named(doc: &Html, root: NodeId, tag: &str) -> Vec<NodeId> {
    let Some(root_ref) = doc.tree.get(root) else {
        return Vec::new();
    };
    root_ref
        .descendants()
        .skip(1)
        .filter(|n| matches!(n.value(), Node::Element(el) if el.name() == tag))
        .map(|n| n.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<body><table><tbody>
      <tr><td>3</td><td><a href="?mode=view&articleNo=545717&article.offset=0">수강신청 안내</a></td><td>2026-01-15</td><td>학사지원팀</td><td>120</td></tr>
      <tr><td>2</td><td><a href="?mode=view&articleNo=534374&article.offset=0">장학금 신청</a></td><td>2026-01-10</td><td>학생지원팀</td><td>98</td></tr>
      <tr><td>1</td><td><a href="/ko/sub06_01_01_01.do?mode=view&articleNo=430818">등록금 납부</a></td><td>2026-01-02</td><td>재무팀</td><td>77</td></tr>
    </tbody></table></body>"#;

    #[test]
    fn offset_pagination() {
        assert_eq!(page_offset_url("https://a/b.do", 0), "https://a/b.do");
        assert_eq!(
            page_offset_url("https://a/b.do", 2),
            "https://a/b.do?article.offset=20"
        );
        assert_eq!(
            page_offset_url("https://a/b.do?x=1", 1),
            "https://a/b.do?x=1&article.offset=10"
        );
    }

    #[test]
    fn discovers_article_links() {
        let listing = "https://www.kumoh.ac.kr/ko/sub06_01_01_01.do";
        let links = find_article_links(listing, LISTING);
        assert_eq!(links.len(), 3);
        assert!(links[0].contains("articleNo=545717"));
        assert!(links[0].starts_with("https://www.kumoh.ac.kr/ko/sub06_01_01_01.do?"));
        assert!(links[2].contains("articleNo=430818"));
    }

    #[test]
    fn duplicate_hrefs_collapse() {
        let html = r#"<body>
          <a href="?mode=view&articleNo=1">제목</a>
          <a href="?mode=view&articleNo=1">제목 다시</a>
          <a href="/other.do">무관</a>
        </body>"#;
        let links = find_article_links("https://bus.kumoh.ac.kr/bus/board.do", html);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn signature_from_first_data_row() {
        let sig = first_row_signature(LISTING, 5).unwrap();
        assert_eq!(sig, "3|수강신청 안내|2026-01-15");
        // Stable across reparses of the same listing.
        assert_eq!(first_row_signature(LISTING, 5).unwrap(), sig);
    }

    #[test]
    fn signature_requires_enough_cells() {
        let html = "<body><table><tr><td>only</td><td>two</td></tr></table></body>";
        assert!(first_row_signature(html, 5).is_none());
        assert_eq!(count_rows(html, 5), 0);
        assert_eq!(count_rows(html, 2), 1);
    }

    #[test]
    fn unchanged_listing_matches_stored_signature() {
        use crate::store::SourceMeta;

        // First run stores the signature; the second run sees the same
        // listing and the comparison short-circuits the whole crawl.
        let mut meta = SourceMeta::default();
        let first = first_row_signature(LISTING, 5).unwrap();
        meta.set_first_row_signature("schedule", &first);

        let second = first_row_signature(LISTING, 5).unwrap();
        assert_eq!(meta.first_row_signature("schedule"), Some(second.as_str()));

        // A new row prepended changes the signature.
        let updated = LISTING.replace(
            "<tr><td>3</td>",
            "<tr><td>4</td><td><a href=\"?mode=view&articleNo=999\">신규 공지</a></td><td>2026-02-01</td><td>교무처</td><td>1</td></tr><tr><td>3</td>",
        );
        let changed = first_row_signature(&updated, 5).unwrap();
        assert_ne!(meta.first_row_signature("schedule"), Some(changed.as_str()));
    }

    #[test]
    fn renders_weekly_menu() {
        let html = r#"<body><table>
          <caption>학생식당 식당 메뉴 표</caption>
          <thead><tr><th>월(11.24)</th><th>화(11.25)</th></tr></thead>
          <tbody>
            <tr>
              <td><p>중식</p><ul><li>제육볶음</li><li>미역국</li></ul></td>
              <td><p>중식</p><ul><li>돈까스</li></ul></td>
            </tr>
            <tr>
              <td><p>석식</p><ul><li>김치찌개</li></ul></td>
              <td><p>석식</p><ul><li>비빔밥</li></ul></td>
            </tr>
          </tbody>
        </table></body>"#;
        let text = render_menu_table(html);
        assert!(text.starts_with("[월(11.24)]"));
        assert!(text.contains("중식: 제육볶음 / 미역국"));
        assert!(text.contains("[화(11.25)]"));
        assert!(text.contains("석식: 비빔밥"));
    }

    #[test]
    fn menu_table_absent() {
        assert_eq!(render_menu_table("<body><p>공지</p></body>"), "");
        let no_thead = "<body><table><tbody><tr><td>x</td></tr></tbody></table></body>";
        assert_eq!(render_menu_table(no_thead), "");
    }
}
