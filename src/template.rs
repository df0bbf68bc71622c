//! Event templates: a regex over the content field whose capture groups mark
//! the variable parameter positions.
//!
//! Templates are seeded either from a plain-text file (one pattern per line,
//! ids `T1, T2, ...` assigned in file order) or from the structured CSV
//! companion form (`TemplateId,Template`). Collection order is match
//! priority: the matcher always takes the first template that matches.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    /// The pattern text as authored, without the full-match wrapping.
    pub text: String,
    /// The compiled pattern, wrapped `^(?:...)$` for full-string semantics.
    pub pattern: Regex,
}

impl Template {
    fn compile(id: String, text: String) -> Result<Template> {
        let pattern = Regex::new(&format!("^(?:{})$", text)).map_err(|source| Error::Template {
            id: id.clone(),
            source,
        })?;
        Ok(Template { id, text, pattern })
    }
}

/// An ordered template collection. Order is load order and determines match
/// priority.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub templates: Vec<Template>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TemplateRow {
    #[serde(rename = "TemplateId")]
    template_id: String,
    #[serde(rename = "Template")]
    template: String,
}

impl TemplateSet {
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load the structured companion form: a CSV with `TemplateId,Template`
    /// columns. A malformed pattern aborts loading before any matching runs.
    pub fn from_csv(path: &Path) -> Result<TemplateSet> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut templates = Vec::new();
        for row in reader.deserialize::<TemplateRow>() {
            let row = row?;
            templates.push(Template::compile(row.template_id, row.template.trim().to_string())?);
        }
        Ok(TemplateSet { templates })
    }

    /// Load a plain-text template file, one pattern per line, assigning
    /// sequential ids `T1, T2, ...` in file order. Blank lines are skipped.
    pub fn from_plain(path: &Path) -> Result<TemplateSet> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = BufReader::new(file);
        let mut templates = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| Error::io(path, e))?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let id = format!("T{}", templates.len() + 1);
            templates.push(Template::compile(id, text.to_string())?);
        }
        Ok(TemplateSet { templates })
    }
}

/// Turn a plain-text template file into its structured CSV companion,
/// assigning ids in file order. When `output` is `None` the result lands next
/// to the input as `<stem>_csv.csv`. Returns the output path.
pub fn write_structured_templates(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let set = TemplateSet::from_plain(input)?;

    let output = match output {
        Some(p) => p.to_path_buf(),
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("templates");
            input.with_file_name(format!("{stem}_csv.csv"))
        }
    };

    let mut writer = csv::Writer::from_path(&output)?;
    for template in &set.templates {
        writer.serialize(TemplateRow {
            template_id: template.id.clone(),
            template: template.text.clone(),
        })?;
    }
    writer.flush().map_err(|e| Error::io(&output, e))?;
    Ok(output)
}
