//! Fixed-column ASCII rendering of a failure report.

use super::FailureReport;

pub fn render_report(report: &FailureReport) -> String {
    let mut headers = vec!["ID"];
    if let Some(resource) = report.category.resource_header() {
        headers.push(resource);
    }
    headers.extend(["Date", "Error Type", "Error Message"]);

    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|e| {
            let mut row = vec![e.id.clone()];
            if report.category.resource_header().is_some() {
                row.push(e.resource_id.clone().unwrap_or_default());
            }
            row.push(e.date.format("%Y-%m-%d %H:%M:%S").to_string());
            row.push(e.error_type.clone());
            row.push(e.message.replace('\n', " "));
            row
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let border = {
        let mut s = String::from("+");
        for w in &widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };
    let line = |cells: &[String]| {
        let mut s = String::from("|");
        for (cell, w) in cells.iter().zip(&widths) {
            let pad = w - cell.chars().count();
            s.push(' ');
            s.push_str(cell);
            s.push_str(&" ".repeat(pad + 1));
            s.push('|');
        }
        s
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut out = String::new();
    out.push_str(report.category.title());
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    out.push_str(&line(&header_cells));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&border);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{FailureCategory, FailureEntry};
    use chrono::TimeZone;

    fn entry(id: &str, resource: Option<&str>, message: &str) -> FailureEntry {
        FailureEntry {
            id: id.into(),
            resource_id: resource.map(Into::into),
            date: chrono::Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
            error_type: "CRITICAL".into(),
            message: message.into(),
        }
    }

    #[test]
    fn system_table_has_four_columns() {
        let report = FailureReport {
            category: FailureCategory::System,
            entries: vec![entry("f-1", None, "power supply degraded")],
        };
        let out = render_report(&report);
        assert!(out.starts_with("System Failures\n"));
        assert!(out.contains("| ID  | Date                | Error Type | Error Message         |"));
        assert!(out.contains("| f-1 | 2024-03-09 08:30:00 | CRITICAL   | power supply degraded |"));
        assert!(!out.contains("Pool ID"));
    }

    #[test]
    fn tape_table_includes_resource_column() {
        let report = FailureReport {
            category: FailureCategory::Tape,
            entries: vec![entry("t-9", Some("TAPE0042"), "cleaning required")],
        };
        let out = render_report(&report);
        assert!(out.contains("Tape ID"));
        assert!(out.contains("TAPE0042"));
        assert!(out.contains("cleaning required"));
        let widths: Vec<usize> = out.lines().skip(1).map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }
}
