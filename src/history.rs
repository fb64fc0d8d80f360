//! Age buckets for the session list, and loading exported history.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use assist_harness_core::models::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionAge {
    Today,
    Previous7Days,
    Older,
}

impl SessionAge {
    /// Bucket `date` relative to `now`. The same UTC calendar day (or any
    /// future date) is today; otherwise the elapsed time decides, with
    /// anything up to seven days old in the previous week.
    pub fn classify(date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if date >= now || date.date_naive() == now.date_naive() {
            SessionAge::Today
        } else if now - date <= Duration::days(7) {
            SessionAge::Previous7Days
        } else {
            SessionAge::Older
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionAge::Today => "Today",
            SessionAge::Previous7Days => "Previous 7 Days",
            SessionAge::Older => "Older",
        }
    }
}

/// Sessions grouped by age, newest bucket first. Empty buckets are left out;
/// sessions keep their order within a bucket.
pub fn group_by_age(sessions: &[Session], now: DateTime<Utc>) -> Vec<(SessionAge, Vec<&Session>)> {
    let mut groups: Vec<(SessionAge, Vec<&Session>)> = Vec::new();
    for age in [SessionAge::Today, SessionAge::Previous7Days, SessionAge::Older] {
        let members: Vec<&Session> = sessions
            .iter()
            .filter(|s| SessionAge::classify(s.date, now) == age)
            .collect();
        if !members.is_empty() {
            groups.push((age, members));
        }
    }
    groups
}

/// Read a chat history export: a JSON array of sessions in the backend's
/// history shape.
pub fn load_export(path: &Path) -> Result<Vec<Session>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history export: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history export: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn buckets_by_elapsed_time() {
        let now = at(2024, 3, 10, 9);
        assert_eq!(SessionAge::classify(at(2024, 3, 10, 0), now), SessionAge::Today);
        assert_eq!(SessionAge::classify(at(2024, 3, 9, 23), now), SessionAge::Previous7Days);
        assert_eq!(SessionAge::classify(at(2024, 3, 3, 10), now), SessionAge::Previous7Days);
        assert_eq!(SessionAge::classify(at(2024, 3, 3, 9), now), SessionAge::Previous7Days);
        // Seven days and eight hours old.
        assert_eq!(SessionAge::classify(at(2024, 3, 3, 1), now), SessionAge::Older);
        assert_eq!(SessionAge::classify(at(2024, 3, 2, 23), now), SessionAge::Older);
    }

    #[test]
    fn future_dates_count_as_today() {
        let now = at(2024, 3, 10, 9);
        assert_eq!(SessionAge::classify(at(2024, 4, 1, 0), now), SessionAge::Today);
    }

    #[test]
    fn grouping_skips_empty_buckets() {
        let now = at(2024, 3, 10, 9);
        let sessions = vec![
            Session::new(0, at(2024, 1, 1, 0)),
            Session::new(1, at(2024, 3, 10, 8)),
            Session::new(2, at(2023, 12, 1, 0)),
        ];
        let groups = group_by_age(&sessions, now);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, SessionAge::Today);
        assert_eq!(groups[0].1[0].sid, 1);
        let older: Vec<u32> = groups[1].1.iter().map(|s| s.sid).collect();
        assert_eq!(older, vec![0, 2]);
    }

    #[test]
    fn export_parses_backend_history_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"[{"sid": 4, "name": "Budget", "date": "2024-03-10T08:00:00Z",
                "messages": [{"sender": "user", "text": "hi", "timestamp": 1}]}]"#,
        )
        .unwrap();
        let sessions = load_export(&path).unwrap();
        assert_eq!(sessions[0].sid, 4);
        assert_eq!(sessions[0].messages[0].text, "hi");
        assert!(load_export(&dir.path().join("missing.json")).is_err());
    }
}
