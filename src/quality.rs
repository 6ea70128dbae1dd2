use scraper::Html;

use crate::extract::dom;

/// Accept/reject decision with the reason spelled out for run reports.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityVerdict {
    pub accepted: bool,
    pub reason: String,
}

impl QualityVerdict {
    fn reject(reason: String) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }

    fn ok() -> Self {
        Self {
            accepted: true,
            reason: "OK".to_string(),
        }
    }
}

/// Gates pages before any extraction work: length and word-count floors,
/// error-page signatures, title presence, whitespace ratio. Checks run
/// cheapest first and stop at the first failure.
pub struct QualityFilter {
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub min_word_count: usize,
    pub skip_patterns: Vec<String>,
}

/// Signatures of error/denial pages the campus sites serve with HTTP 200.
const ERROR_PATTERNS: &[&str] = &[
    "404 Not Found",
    "404 error",
    "페이지를 찾을 수 없습니다",
    "요청하신 페이지가 존재하지 않습니다",
    "접근 권한이 없습니다",
    "Access Denied",
    "로그인이 필요합니다",
    "세션이 만료되었습니다",
];

const STRIP_FOR_MEASURE: &[&str] = &["script", "style", "nav", "header", "footer"];

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(100, 500_000, 20)
    }
}

impl QualityFilter {
    pub fn new(min_text_length: usize, max_text_length: usize, min_word_count: usize) -> Self {
        Self {
            min_text_length,
            max_text_length,
            min_word_count,
            skip_patterns: ERROR_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Always returns a verdict; malformed HTML just measures as whatever
    /// text the parser can salvage.
    pub fn classify(&self, html: &str, _url: &str) -> QualityVerdict {
        let mut doc = Html::parse_document(html);
        dom::remove_tags(&mut doc, STRIP_FOR_MEASURE);

        let text = dom::spaced_text(&doc);
        let len = text.chars().count();

        if len < self.min_text_length {
            return QualityVerdict::reject(format!("Too short: {} chars", len));
        }
        if len > self.max_text_length {
            return QualityVerdict::reject(format!("Too long: {} chars", len));
        }

        let words = text.split_whitespace().count();
        if words < self.min_word_count {
            return QualityVerdict::reject(format!("Too few words: {}", words));
        }

        let lower = text.to_lowercase();
        for pattern in &self.skip_patterns {
            if lower.contains(&pattern.to_lowercase()) {
                return QualityVerdict::reject(format!("Error pattern detected: {}", pattern));
            }
        }

        let title_ok = dom::title_text(&doc).is_some_and(|t| t.chars().count() >= 2);
        if !title_ok {
            return QualityVerdict::reject("No valid title".to_string());
        }

        // Guards against pages that are mostly formatting whitespace; only
        // space and newline are discounted, matching the length measure.
        let non_ws = text.chars().filter(|&c| c != ' ' && c != '\n').count();
        if non_ws * 2 < self.min_text_length {
            return QualityVerdict::reject("Too much whitespace".to_string());
        }

        QualityVerdict::ok()
    }
}
