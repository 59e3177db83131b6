use crate::config::{RenderStyle, TableStyle};
use crate::error::{EngineError, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write rows as CSV. The BOM lets spreadsheet tools detect UTF-8 in the
/// Korean region names.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;
    let mut wtr = csv::Writer::from_writer(file);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn render_table<T>(rows: &[T], style: &RenderStyle) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(style.preview_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    let mut table = Table::new(slice);
    match style.table_style {
        TableStyle::Markdown => table.with(Style::markdown()),
        TableStyle::Ascii => table.with(Style::ascii()),
        TableStyle::Modern => table.with(Style::modern()),
        TableStyle::Psql => table.with(Style::psql()),
    };
    Some(table.to_string())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], style: &RenderStyle)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, style);
}

pub fn preview_table_rows<T>(rows: &[T], style: &RenderStyle)
where
    T: Tabled + Clone,
{
    match render_table(rows, style) {
        Some(table_str) => println!("{}\n", table_str),
        None => println!("(no rows)\n"),
    }
}

/// Notice shown in place of a report whose inputs could not be computed.
pub fn unavailable_notice(title: &str, err: &EngineError) -> String {
    format!("{}: data unavailable ({})", title, err)
}

pub fn print_unavailable(title: &str, err: &EngineError) {
    println!("{}\n", unavailable_notice(title, err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClusterRow;
    use tempfile::tempdir;

    fn rows() -> Vec<ClusterRow> {
        vec![
            ClusterRow {
                region: "서울".to_string(),
                score: "1.000".to_string(),
                cluster: 3,
                cluster_name: "선진형".to_string(),
            },
            ClusterRow {
                region: "부산".to_string(),
                score: "0.000".to_string(),
                cluster: 0,
                cluster_name: "개발필요형".to_string(),
            },
        ]
    }

    #[test]
    fn test_csv_starts_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.csv");
        write_csv(&path, &rows()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Region,CompositeScore,Cluster,ClusterName"));
        assert_eq!(lines.next(), Some("서울,1.000,3,선진형"));
    }

    #[test]
    fn test_json_summary_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &serde_json::json!({ "regions": 17 })).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["regions"], 17);
    }

    #[test]
    fn test_render_respects_preview_rows() {
        let style = RenderStyle {
            preview_rows: 1,
            table_style: TableStyle::Markdown,
        };
        let table = render_table(&rows(), &style).unwrap();
        assert!(table.contains("서울"));
        assert!(!table.contains("부산"));
        assert!(render_table::<ClusterRow>(&[], &style).is_none());
    }

    #[test]
    fn test_unavailable_notice() {
        let err = EngineError::malformed("doctors", "metric not loaded");
        let notice = unavailable_notice("Inequality Index", &err);
        assert!(notice.starts_with("Inequality Index: data unavailable"));
        assert!(notice.contains("metric not loaded"));
    }
}
