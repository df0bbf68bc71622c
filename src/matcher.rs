//! Template matching: assign each extracted record to the first template
//! whose pattern consumes its entire content field.

use crate::extract::LogRecord;
use crate::template::TemplateSet;

/// A record together with its assigned template and the extracted parameter
/// atoms.
#[derive(Debug, Clone)]
pub struct MatchedRecord {
    pub record: LogRecord,
    pub template_id: String,
    pub template_text: String,
    pub parameters: Vec<String>,
}

/// Matched/unmatched partition of an extraction. Both sides preserve the
/// relative input order; together they cover every record exactly once.
#[derive(Debug, Default)]
pub struct Partition {
    pub matched: Vec<MatchedRecord>,
    pub unmatched: Vec<LogRecord>,
}

/// Split one captured group into parameter atoms. A group containing commas
/// is a list by content convention: it is split on `,` and each atom is
/// trimmed of whitespace and `'` quotes. This is deliberately not a CSV
/// parser.
fn split_parameter_atoms(group: &str, out: &mut Vec<String>) {
    for atom in group.split(',') {
        out.push(atom.trim().replace('\'', ""));
    }
}

fn extract_parameters(caps: &regex::Captures<'_>) -> Vec<String> {
    let mut parameters = Vec::new();
    for group in caps.iter().skip(1).flatten() {
        split_parameter_atoms(group.as_str(), &mut parameters);
    }
    parameters
}

/// Classify every record, in input order, against the templates in priority
/// order; the first matching template wins. Records matching no template go
/// to the unmatched side untouched. O(records x templates) in the worst
/// case; templates are independent patterns that may overlap, so they must
/// be tried sequentially per record.
pub fn match_records(
    records: Vec<LogRecord>,
    templates: &TemplateSet,
    content_index: usize,
) -> Partition {
    let mut partition = Partition::default();

    for record in records {
        let content = record.value(content_index).trim().to_string();
        let hit = templates
            .templates
            .iter()
            .find_map(|t| t.pattern.captures(&content).map(|caps| (t, caps)));

        match hit {
            Some((template, caps)) => {
                let parameters = extract_parameters(&caps);
                partition.matched.push(MatchedRecord {
                    record,
                    template_id: template.id.clone(),
                    template_text: template.text.clone(),
                    parameters,
                });
            }
            None => partition.unmatched.push(record),
        }
    }

    partition
}
