use serde::Serialize;
use tracing::{info, warn};

/// Title keywords that trigger an alert, with the category the notification
/// service expects.
pub const KEYWORD_MAP: &[(&str, &str)] = &[
    ("장학", "SCHOLARSHIP"),
    ("학사", "COURSE"),
    ("수강", "COURSE"),
    ("생활관", "DORM"),
    ("기숙사", "DORM"),
    ("행사", "EVENT"),
    ("특강", "EVENT"),
    ("취업", "EMPLOYMENT"),
    ("인턴", "EMPLOYMENT"),
    ("채용", "EMPLOYMENT"),
];

/// First matching category for a title, if any.
pub fn match_keyword(title: &str) -> Option<&'static str> {
    KEYWORD_MAP
        .iter()
        .find(|(word, _)| title.contains(word))
        .map(|(_, category)| *category)
}

#[derive(Serialize)]
struct Alert<'a> {
    url: &'a str,
    keyword: &'a str,
    title: &'a str,
}

/// Posts keyword alerts to an external endpoint. Failures are logged and
/// swallowed: the crawl never depends on the notification service being up.
pub struct Notifier {
    endpoint: Option<String>,
    client: reqwest::Client,
}

const NOTIFY_TIMEOUT_SECS: u64 = 5;

impl Notifier {
    pub fn new(endpoint: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { endpoint, client }
    }

    /// Send an alert when the title matches a keyword. Returns whether an
    /// alert was actually delivered.
    pub async fn notify(&self, url: &str, title: &str) -> bool {
        let Some(keyword) = match_keyword(title) else {
            return false;
        };
        let Some(endpoint) = &self.endpoint else {
            return false;
        };

        let alert = Alert { url, keyword, title };
        match self.client.post(endpoint).json(&alert).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("alert sent [{}] {}", keyword, title);
                true
            }
            Ok(resp) => {
                warn!("alert endpoint returned {}: {}", resp.status(), title);
                false
            }
            Err(e) => {
                warn!("alert send failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_matching() {
        assert_eq!(match_keyword("2026 국가장학금 신청 안내"), Some("SCHOLARSHIP"));
        assert_eq!(match_keyword("수강신청 일정 변경"), Some("COURSE"));
        assert_eq!(match_keyword("생활관 입주 안내"), Some("DORM"));
        assert_eq!(match_keyword("동계 인턴 모집"), Some("EMPLOYMENT"));
        assert_eq!(match_keyword("도서관 휴관일"), None);
    }

    #[test]
    fn first_match_wins() {
        // Contains both 학사 (COURSE) and 행사 (EVENT); map order decides.
        assert_eq!(match_keyword("학사 일정 및 행사 안내"), Some("COURSE"));
    }

    #[tokio::test]
    async fn disabled_notifier_never_sends() {
        let n = Notifier::new(None);
        assert!(!n.notify("https://x", "장학금 공지").await);
    }
}
