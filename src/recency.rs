use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

/// Cutoff-date filter for page timestamps. Missing or unparseable input is
/// treated as recent: absence of evidence is not evidence of staleness.
pub struct RecencyGate {
    cutoff: NaiveDateTime,
}

const DEFAULT_CUTOFF: (i32, u32, u32) = (2021, 1, 1);

impl RecencyGate {
    /// Explicit `YYYY-MM-DD` cutoff, or a rolling "N days before now", or the
    /// default epoch when neither is given.
    pub fn new(cutoff_date: Option<&str>, cutoff_days_ago: Option<i64>) -> Result<Self> {
        let cutoff = if let Some(date) = cutoff_date {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("invalid cutoff date: {}", date))?
                .and_hms_opt(0, 0, 0)
                .unwrap()
        } else if let Some(days) = cutoff_days_ago {
            Local::now().naive_local() - Duration::days(days)
        } else {
            let (y, m, d) = DEFAULT_CUTOFF;
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        Ok(Self { cutoff })
    }

    /// True when the timestamp is at or after the cutoff, or when there is no
    /// usable timestamp at all (fail-open).
    pub fn is_recent(&self, timestamp: Option<&str>) -> bool {
        let Some(raw) = timestamp else { return true };
        match parse_instant(raw) {
            Some(instant) => instant >= self.cutoff,
            None => true,
        }
    }

    pub fn cutoff_str(&self) -> String {
        self.cutoff.format("%Y-%m-%d").to_string()
    }
}

/// Accepts full timestamps (`2021-03-01T09:30:00`, with or without an offset
/// or trailing Z) and bare dates (`2021-03-01`, extra text after the date is
/// ignored).
fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.contains('T') {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Some(dt);
        }
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
