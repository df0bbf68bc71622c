//! Scoring of a parsed structured log against a ground-truth structured log.
//!
//! Both tables are joined on `LineId` and compared by their `EventId`
//! grouping. Precision/recall/F1 come from pairwise cluster agreement;
//! accuracy is the fraction of ground-truth lines whose parsed cluster is
//! exactly its ground-truth cluster (same member set).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub f1: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

/// `LineId -> EventId` assignment read from a structured CSV.
fn read_assignments(path: &Path) -> Result<BTreeMap<u64, String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let missing = |column: &str| Error::Evaluation {
        path: PathBuf::from(path),
        reason: format!("missing {column} column"),
    };
    let line_idx = headers
        .iter()
        .position(|h| h == "LineId")
        .ok_or_else(|| missing("LineId"))?;
    let event_idx = headers
        .iter()
        .position(|h| h == "EventId")
        .ok_or_else(|| missing("EventId"))?;

    let mut assignments = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let line_id: u64 = record
            .get(line_idx)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Evaluation {
                path: PathBuf::from(path),
                reason: "non-numeric LineId".to_string(),
            })?;
        let event_id = record.get(event_idx).unwrap_or("").to_string();
        assignments.insert(line_id, event_id);
    }
    Ok(assignments)
}

fn pairs(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

fn group_by_event(assignments: &BTreeMap<u64, String>) -> BTreeMap<&str, Vec<u64>> {
    let mut groups: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
    for (line, event) in assignments {
        groups.entry(event.as_str()).or_default().push(*line);
    }
    groups
}

/// Score `parsed` against `ground_truth`. Lines present in the ground truth
/// but absent from the parsed table count as wrong and contribute no
/// agreeing pairs. Degenerate inputs (no pairs on either side) score 0.0
/// rather than NaN.
pub fn evaluate(ground_truth: &Path, parsed: &Path) -> Result<Scores> {
    let truth = read_assignments(ground_truth)?;
    let parsed = read_assignments(parsed)?;

    let truth_groups = group_by_event(&truth);
    // restrict the parsed grouping to the ground-truth universe
    let parsed_in_truth: BTreeMap<u64, String> = parsed
        .iter()
        .filter(|(line, _)| truth.contains_key(line))
        .map(|(line, event)| (*line, event.clone()))
        .collect();
    let parsed_groups = group_by_event(&parsed_in_truth);

    let truth_sizes: BTreeMap<&str, usize> = truth_groups
        .iter()
        .map(|(event, lines)| (*event, lines.len()))
        .collect();

    let real_pairs: u64 = truth_groups.values().map(|lines| pairs(lines.len())).sum();
    let parsed_pairs: u64 = parsed_groups.values().map(|lines| pairs(lines.len())).sum();

    let mut accurate_pairs = 0u64;
    let mut accurate_lines = 0usize;
    for lines in parsed_groups.values() {
        let mut truth_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for line in lines {
            let event = truth.get(line).map(String::as_str).unwrap_or("");
            *truth_counts.entry(event).or_default() += 1;
        }
        for (event, count) in &truth_counts {
            accurate_pairs += pairs(*count);
            // exact cluster agreement: one truth event covering the whole
            // parsed cluster, and the truth cluster no bigger
            if truth_counts.len() == 1 && truth_sizes.get(event) == Some(&lines.len()) {
                accurate_lines += lines.len();
            }
        }
    }

    let ratio = |num: u64, denom: u64| {
        if denom == 0 {
            0.0
        } else {
            num as f64 / denom as f64
        }
    };
    let precision = ratio(accurate_pairs, parsed_pairs);
    let recall = ratio(accurate_pairs, real_pairs);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let accuracy = if truth.is_empty() {
        0.0
    } else {
        accurate_lines as f64 / truth.len() as f64
    };

    Ok(Scores {
        f1,
        accuracy,
        precision,
        recall,
    })
}
