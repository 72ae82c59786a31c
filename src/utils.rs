// ABOUTME: Shared helpers for message formatting and tabular text files
// ABOUTME: Markdown-to-HTML for Matrix formatted bodies, a small RFC 4180 CSV reader, and chat exports

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use pulldown_cmark::{html, Parser};
use salon_core::Message;

/// Convert markdown to HTML for Matrix message formatting
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Parse CSV text into rows of fields. Quoted fields may contain commas,
/// doubled quotes and line breaks. Blank lines are skipped.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Values of the named column (header match is case-insensitive), skipping empty cells
pub fn csv_column(text: &str, column: &str) -> Option<Vec<String>> {
    let mut rows = parse_csv(text).into_iter();
    let header = rows.next()?;
    let index = header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(column))?;
    Some(
        rows.filter_map(|r| r.get(index).map(|v| v.trim().to_string()))
            .filter(|v| !v.is_empty())
            .collect(),
    )
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Read a `Timestamp,Author,Message` chat export into message records.
///
/// Timestamps are RFC 3339 or `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub fn messages_from_csv(text: &str, channel: &str) -> Result<Vec<Message>> {
    let mut rows = parse_csv(text).into_iter();
    let header = rows.next().context("Export is empty")?;
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .with_context(|| format!("Export has no `{}` column", name))
    };
    let (ts_col, author_col, message_col) =
        (column("timestamp")?, column("author")?, column("message")?);

    rows.enumerate()
        .map(|(i, row)| {
            let line = i + 2;
            let field = |col: usize| row.get(col).map(String::as_str).unwrap_or_default();
            let timestamp = parse_timestamp(field(ts_col))
                .with_context(|| format!("Line {}: invalid timestamp `{}`", line, field(ts_col)))?;
            Ok(Message::new(
                timestamp,
                field(author_col),
                field(message_col),
                channel,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_html() {
        let html = markdown_to_html("### Title\n- item");
        assert!(html.contains("<h3>Title</h3>"));
        assert!(html.contains("<li>item</li>"));
    }

    #[test]
    fn test_parse_csv_quoting() {
        let rows = parse_csv("a,b,c\n1,\"x, y\",\"say \"\"hi\"\"\"\n\n2,\"two\nlines\",z");
        assert_eq!(
            rows,
            vec![
                vec!["a", "b", "c"],
                vec!["1", "x, y", "say \"hi\""],
                vec!["2", "two\nlines", "z"],
            ]
        );
    }

    #[test]
    fn test_parse_csv_crlf_and_trailing_newline() {
        let rows = parse_csv("h1,h2\r\nv1,v2\r\n");
        assert_eq!(rows, vec![vec!["h1", "h2"], vec!["v1", "v2"]]);
    }

    #[test]
    fn test_parse_csv_empty_last_field() {
        let rows = parse_csv("a,b\n1,");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", ""]]);
    }

    #[test]
    fn test_csv_column() {
        let text = "id,Activity\n1,Hiking\n2,\n3,Board games\n";
        assert_eq!(
            csv_column(text, "activity"),
            Some(vec!["Hiking".to_string(), "Board games".to_string()])
        );
        assert_eq!(csv_column(text, "missing"), None);
        assert_eq!(csv_column("", "activity"), None);
    }

    #[test]
    fn test_messages_from_csv() {
        let text = "Timestamp,Author,Message\n\
                    2024-03-01T10:00:00Z,alice,hello\n\
                    2024-03-01 10:05:00,bob,\"hi, alice\"\n";
        let messages = messages_from_csv(text, "export").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].author, "bob");
        assert_eq!(messages[1].content, "hi, alice");
        assert_eq!(messages[1].channel, "export");
        assert_eq!(
            messages[1].timestamp - messages[0].timestamp,
            chrono::Duration::minutes(5)
        );
    }

    #[test]
    fn test_messages_from_csv_errors() {
        let err = messages_from_csv("Timestamp,Author\n", "x").unwrap_err();
        assert!(err.to_string().contains("`message`"));

        let err = messages_from_csv("Timestamp,Author,Message\nyesterday,a,b\n", "x").unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }
}
