//! Plain-text table rendering for validation reports.

use std::fmt::Write as _;

use crate::report::Issue;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w.max(&3) + 2))
        .collect::<Vec<_>>()
        .join("+");
    let _ = writeln!(output, "{separator}");
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| format!(" {:<width$} ", value, width = widths[idx]))
        .collect::<Vec<_>>()
        .join("|")
}

/// Prints a titled table of findings to stdout.
pub fn print_issues(title: &str, issues: &[Issue]) {
    if issues.is_empty() {
        return;
    }
    println!("{title}:");
    let headers = ["row", "column", "type", "content", "csv"]
        .map(str::to_string)
        .to_vec();
    let rows = issues
        .iter()
        .map(|issue| {
            vec![
                issue.row.clone(),
                issue.column.clone(),
                issue.kind.clone(),
                issue.content.clone(),
                issue.csv_path.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", render_table(&headers, &rows));
    println!();
}
