//! Parsed-corpus assembly: the structured table, the unmatched table and the
//! deduplicated per-template occurrence summary, plus their CSV writers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::LogRecord;
use crate::matcher::MatchedRecord;

/// One row of the per-template occurrence table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummaryRow {
    #[serde(rename = "EventId")]
    pub event_id: String,
    #[serde(rename = "EventTemplate")]
    pub event_template: String,
    #[serde(rename = "Occurrences")]
    pub occurrences: u64,
}

/// Deduplicate matched records by template id, counting occurrences. Rows
/// come out in first-seen order; each id appears exactly once and the counts
/// sum to the number of matched records.
pub fn build_summary(matched: &[MatchedRecord]) -> Vec<TemplateSummaryRow> {
    let mut rows: Vec<TemplateSummaryRow> = Vec::new();
    for m in matched {
        match rows.iter_mut().find(|r| r.event_id == m.template_id) {
            Some(row) => row.occurrences += 1,
            None => rows.push(TemplateSummaryRow {
                event_id: m.template_id.clone(),
                event_template: m.template_text.clone(),
                occurrences: 1,
            }),
        }
    }
    rows
}

/// Write the structured table: `LineId,<headers...>,EventId,EventTemplate`
/// plus a `ParameterList` column when parameter retention is on. Row order
/// follows the matched partition (input order).
pub fn write_structured(
    path: &Path,
    headers: &[String],
    matched: &[MatchedRecord],
    keep_para: bool,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header_row: Vec<&str> = vec!["LineId"];
    header_row.extend(headers.iter().map(String::as_str));
    header_row.push("EventId");
    header_row.push("EventTemplate");
    if keep_para {
        header_row.push("ParameterList");
    }
    writer.write_record(&header_row)?;

    for m in matched {
        let mut row: Vec<String> = Vec::with_capacity(header_row.len());
        row.push(m.record.line_id.to_string());
        row.extend(m.record.values.iter().cloned());
        row.push(m.template_id.clone());
        row.push(m.template_text.clone());
        if keep_para {
            row.push(m.parameters.join(", "));
        }
        writer.write_record(&row)?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Write the per-template occurrence table.
pub fn write_templates(path: &Path, summary: &[TemplateSummaryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in summary {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Write the unmatched table: the original fields only, input order.
pub fn write_unmatched(path: &Path, headers: &[String], unmatched: &[LogRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header_row: Vec<&str> = vec!["LineId"];
    header_row.extend(headers.iter().map(String::as_str));
    writer.write_record(&header_row)?;

    for record in unmatched {
        let mut row: Vec<String> = Vec::with_capacity(header_row.len());
        row.push(record.line_id.to_string());
        row.extend(record.values.iter().cloned());
        writer.write_record(&row)?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(line_id: usize, id: &str, text: &str) -> MatchedRecord {
        MatchedRecord {
            record: LogRecord {
                line_id,
                values: vec![format!("content {line_id}")],
            },
            template_id: id.to_string(),
            template_text: text.to_string(),
            parameters: vec![],
        }
    }

    #[test]
    fn summary_counts_and_uniqueness() {
        let matched = vec![
            matched(1, "T1", "a"),
            matched(2, "T2", "b"),
            matched(3, "T1", "a"),
            matched(4, "T1", "a"),
        ];
        let summary = build_summary(&matched);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].event_id, "T1");
        assert_eq!(summary[0].occurrences, 3);
        assert_eq!(summary[1].occurrences, 1);
        let total: u64 = summary.iter().map(|r| r.occurrences).sum();
        assert_eq!(total, matched.len() as u64);
    }

    #[test]
    fn structured_csv_round_trips_values_with_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_structured.csv");
        let rows = vec![MatchedRecord {
            record: LogRecord {
                line_id: 1,
                values: vec!["a, tricky \"value\"".to_string()],
            },
            template_id: "T1".to_string(),
            template_text: "t (.*)".to_string(),
            parameters: vec!["p1".to_string(), "p2".to_string()],
        }];
        write_structured(&path, &["Content".to_string()], &rows, true).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["LineId", "Content", "EventId", "EventTemplate", "ParameterList"]
        );
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "a, tricky \"value\"");
        assert_eq!(&record[4], "p1, p2");
    }

    #[test]
    fn templates_csv_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_templates.csv");
        let summary = vec![TemplateSummaryRow {
            event_id: "T1".to_string(),
            event_template: r"User (\w+) logged in".to_string(),
            occurrences: 7,
        }];
        write_templates(&path, &summary).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<TemplateSummaryRow> = reader
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows, summary);
    }
}
