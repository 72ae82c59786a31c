// ABOUTME: Member availability from per-member iCalendar (.ics) files
// ABOUTME: Each timed VEVENT marks its start time available on every day it spans

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::Path;

/// Members available at each slot start, slots in chronological order
pub type Availability = BTreeMap<NaiveDateTime, Vec<String>>;

/// A timed event read from a calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CalendarEvent {
    /// Start time repeated on each day the event covers, the start day included
    pub fn slots(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        let days = (self.end - self.start).num_days().max(0);
        (0..=days).map(move |n| self.start + Duration::days(n))
    }
}

/// Unfold RFC 5545 continuation lines (lines starting with a space or tab)
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Parse a DTSTART/DTEND value. Date-only values (`VALUE=DATE`) are not timed
/// and yield `None`; zone suffixes and `TZID` parameters keep wall-clock time.
fn parse_datetime(params: &str, value: &str) -> Option<NaiveDateTime> {
    if params.to_ascii_uppercase().contains("VALUE=DATE") && !value.contains('T') {
        return None;
    }
    let value = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()
}

/// Every VEVENT with timed start and end in an .ics document
pub fn parse_events(text: &str) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    let mut in_event = false;
    let mut start = None;
    let mut end = None;

    for line in unfold(text) {
        let Some((name_and_params, value)) = line.split_once(':') else {
            continue;
        };
        let (name, params) = name_and_params
            .split_once(';')
            .unwrap_or((name_and_params, ""));

        match (name.to_ascii_uppercase().as_str(), value) {
            ("BEGIN", "VEVENT") => {
                in_event = true;
                start = None;
                end = None;
            }
            ("END", "VEVENT") => {
                if let (Some(start), Some(end)) = (start.take(), end.take()) {
                    events.push(CalendarEvent { start, end });
                }
                in_event = false;
            }
            ("DTSTART", _) if in_event => start = parse_datetime(params, value),
            ("DTEND", _) if in_event => end = parse_datetime(params, value),
            _ => {}
        }
    }
    events
}

/// Read every `.ics` file in `dir`; the file stem names the member.
/// Files are visited in name order so member lists are deterministic.
pub async fn load_availability(dir: &Path) -> Result<Availability> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read calendars in {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("ics") {
            files.push(path);
        }
    }
    files.sort();

    let mut availability = Availability::new();
    for path in files {
        let Some(member) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let events = parse_events(&text);
        tracing::debug!(member = %member, events = events.len(), "Loaded calendar");
        for event in &events {
            for slot in event.slots() {
                let members = availability.entry(slot).or_default();
                if !members.contains(&member) {
                    members.push(member.clone());
                }
            }
        }
    }
    Ok(availability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    const ALICE: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nSUMMARY:Free\r\nDTSTART:20240720T090000Z\r\nDTEND:20240722T120000Z\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20240801\r\nDTEND;VALUE=DATE:20240802\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    const BOB: &str = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART;TZID=Europe/Paris:20240721T090000\nDTEND;TZID=Europe/Paris:20240721T180000\nDESCRIPTION:long\n  folded line\nEND:VEVENT\nEND:VCALENDAR\n";

    #[test]
    fn test_parse_events_skips_all_day() {
        let events = parse_events(ALICE);
        assert_eq!(
            events,
            vec![CalendarEvent {
                start: at(2024, 7, 20, 9),
                end: at(2024, 7, 22, 12),
            }]
        );
    }

    #[test]
    fn test_slots_cover_each_day() {
        let event = CalendarEvent {
            start: at(2024, 7, 20, 9),
            end: at(2024, 7, 22, 12),
        };
        let slots: Vec<_> = event.slots().collect();
        assert_eq!(
            slots,
            vec![at(2024, 7, 20, 9), at(2024, 7, 21, 9), at(2024, 7, 22, 9)]
        );
    }

    #[test]
    fn test_unfold_continuation_lines() {
        let lines = unfold("A:one\n two\nB:three");
        assert_eq!(lines, vec!["A:onetwo", "B:three"]);
    }

    #[tokio::test]
    async fn test_load_availability_merges_members() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alice.ics"), ALICE).unwrap();
        std::fs::write(dir.path().join("bob.ics"), BOB).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let availability = load_availability(dir.path()).await.unwrap();

        assert_eq!(availability.len(), 3);
        assert_eq!(availability[&at(2024, 7, 20, 9)], vec!["alice"]);
        assert_eq!(availability[&at(2024, 7, 21, 9)], vec!["alice", "bob"]);
        assert_eq!(availability[&at(2024, 7, 22, 9)], vec!["alice"]);
    }

    #[tokio::test]
    async fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_availability(&dir.path().join("nope")).await.is_err());
    }
}
