use serde_json::Value;
use terminal_size::{terminal_size, Height, Width};

use crate::search::{ResultPayload, SearchResult};
use crate::services::{AnnouncementRecord, ComplaintRecord};

// Cap per-column width to keep output readable.
const MAX_COL_WIDTH: usize = 60;

/// Render merged search results as an ASCII table. Empty input prints "no results".
pub fn print_search_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("no results");
        return;
    }
    let cols = ["match", "type", "id", "ward", "date", "summary"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = results.iter().map(search_row).collect();
    print_table(&cols, &rows);
}

fn search_row(r: &SearchResult) -> Vec<String> {
    let (kind, summary) = match &r.payload {
        ResultPayload::Complaint { status, category, description, .. } => {
            ("complaint", format!("[{}] {}: {}", status.replace('_', " ").to_uppercase(), category, description))
        }
        ResultPayload::Announcement { title, body } => ("announcement", format!("{}: {}", title, body)),
    };
    vec![
        format!("{:.0}%", r.relevance_score * 100.0),
        kind.to_string(),
        r.id.to_string(),
        r.ward.clone().unwrap_or_default(),
        r.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        summary,
    ]
}

pub fn print_complaints(items: &[ComplaintRecord]) {
    if items.is_empty() {
        println!("no complaints");
        return;
    }
    let cols = ["id", "status", "category", "ward", "description"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|c| vec![c.id.to_string(), c.status.clone(), c.category.clone(), c.ward.clone().unwrap_or_default(), c.description.clone()])
        .collect();
    print_table(&cols, &rows);
}

pub fn print_announcements(items: &[AnnouncementRecord]) {
    if items.is_empty() {
        println!("no announcements");
        return;
    }
    let cols = ["id", "ward", "date", "title", "message"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|a| vec![a.id.to_string(), a.ward.clone().unwrap_or_default(), a.date.clone().unwrap_or_default(), a.title.clone(), a.message.clone()])
        .collect();
    print_table(&cols, &rows);
}

/// Print an opaque JSON payload: flat objects as key/value tables, lists of objects as
/// tables over the union of their keys, anything else as pretty JSON.
pub fn print_json(val: &Value) {
    match table_from_json(val) {
        Some((cols, rows)) if !rows.is_empty() => print_table(&cols, &rows),
        _ => println!("{}", serde_json::to_string_pretty(val).unwrap_or_else(|_| val.to_string())),
    }
}

pub fn print_table(cols: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(cols, rows, get_terminal_width()));
}

/// Build the table text. Column widths shrink (widest first) until the table fits `max_width`.
pub fn render_table(cols: &[String], rows: &[Vec<String>], max_width: usize) -> String {
    let mut widths: Vec<usize> = cols.iter().map(|s| display_len(s).min(MAX_COL_WIDTH)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = display_len(cell);
            if w > widths[i] { widths[i] = w.min(MAX_COL_WIDTH); }
        }
    }
    fit_widths(&mut widths, max_width);

    let sep = build_separator(&widths);
    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&build_row(cols, &widths));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for r in rows {
        out.push_str(&build_row(r, &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&format!("rows: {}\n", rows.len()));
    out
}

fn fit_widths(widths: &mut [usize], max_width: usize) {
    // each column costs its width plus 3 chars of padding/border, plus the leading '|'
    let total = |w: &[usize]| w.iter().map(|x| x + 3).sum::<usize>() + 1;
    while total(widths) > max_width {
        let Some((idx, &w)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else { break };
        if w <= 4 { break; }
        widths[idx] = w - 1;
    }
}

fn table_from_json(val: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    match val {
        Value::Object(map) if map.values().all(|v| !v.is_object() && !v.is_array()) => {
            let cols = vec!["key".to_string(), "value".to_string()];
            let rows = map.iter().map(|(k, v)| vec![k.clone(), to_cell_string(v)]).collect();
            Some((cols, rows))
        }
        Value::Array(arr) if !arr.is_empty() && arr.iter().all(|v| v.is_object()) => {
            let mut keys: Vec<String> = Vec::new();
            for el in arr {
                if let Value::Object(m) = el {
                    for k in m.keys() { if !keys.contains(k) { keys.push(k.clone()); } }
                }
            }
            keys.sort();
            let rows = arr
                .iter()
                .map(|el| keys.iter().map(|k| el.get(k).map(to_cell_string).unwrap_or_default()).collect())
                .collect();
            Some((keys, rows))
        }
        _ => None,
    }
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::from("NULL"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // keep objects/arrays compact
        other => other.to_string(),
    }
}

fn display_len(s: &str) -> usize { s.chars().count() }

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let (text, align_right) = (truncate(&cell, *w), is_numeric_like(&cell));
        let pad = w.saturating_sub(display_len(&text));
        s.push(' ');
        if align_right {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    let take = max - 1;
    s.chars().take(take).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers (and percentages) to the right
    let st = s.trim();
    if st.is_empty() { return false; }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".-+eE,_%".contains(ch) { continue; }
        return false;
    }
    has_digit
}

fn get_terminal_width() -> usize {
    if let Some((Width(w), Height(_h))) = terminal_size() {
        return (w as usize).saturating_sub(4).max(40);
    }
    120
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_header_rows_and_footer() {
        let cols = vec!["id".to_string(), "title".to_string()];
        let rows = vec![vec!["7".to_string(), "Water cut".to_string()]];
        let out = render_table(&cols, &rows, 200);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "+----+-----------+");
        assert_eq!(lines[1], "| id | title     |");
        assert_eq!(lines[3], "|  7 | Water cut |");
        assert_eq!(lines.last().copied(), Some("rows: 1"));
    }

    #[test]
    fn shrinks_to_fit_width() {
        let cols = vec!["summary".to_string()];
        let rows = vec![vec!["x".repeat(50)]];
        let out = render_table(&cols, &rows, 30);
        assert!(out.lines().all(|l| l.chars().count() <= 30));
        assert!(out.contains('…'));
    }

    #[test]
    fn json_objects_become_tables() {
        let (cols, rows) = table_from_json(&json!({"total": 4, "ward": "Ward 3"})).unwrap();
        assert_eq!(cols, vec!["key", "value"]);
        assert_eq!(rows.len(), 2);
        let (cols, rows) = table_from_json(&json!([{"b": 1}, {"a": null}])).unwrap();
        assert_eq!(cols, vec!["a", "b"]);
        assert_eq!(rows[1], vec!["NULL".to_string(), String::new()]);
        assert!(table_from_json(&json!({"nested": {"x": 1}})).is_none());
    }
}
