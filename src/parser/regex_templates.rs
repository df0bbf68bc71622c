//! Regex-template backend: parse a log file against a manually curated,
//! ordered set of regex event templates.

use std::fs;
use std::time::Instant;

use tracing::{debug, info};

use crate::corpus;
use crate::error::{Error, Result};
use crate::extract::extract_records;
use crate::format::{compile_log_format, CompiledFormat};
use crate::matcher::match_records;
use crate::template::TemplateSet;

use super::{LogParser, ParseArtifacts, ParserConfig, CONTENT_FIELD};

#[derive(Debug)]
pub struct RegexTemplateParser {
    config: ParserConfig,
    format: CompiledFormat,
    templates: TemplateSet,
}

impl RegexTemplateParser {
    /// Compiles the log format and loads the template CSV up front; both are
    /// fatal before any line is processed.
    pub fn new(config: ParserConfig) -> Result<RegexTemplateParser> {
        let format = compile_log_format(&config.log_format)?;
        if format.header_index(CONTENT_FIELD).is_none() {
            return Err(Error::Config(format!(
                "log format {:?} has no <{CONTENT_FIELD}> field",
                config.log_format
            )));
        }
        let templates_path = config.regex_templates.as_ref().ok_or_else(|| {
            Error::Config("regex method requires a regex_templates file".to_string())
        })?;
        let templates = TemplateSet::from_csv(templates_path)?;
        Ok(RegexTemplateParser {
            config,
            format,
            templates,
        })
    }
}

impl LogParser for RegexTemplateParser {
    fn parse(&mut self, log_name: &str) -> Result<ParseArtifacts> {
        let log_path = self.config.log_path(log_name);
        info!(log = %log_path.display(), templates = self.templates.len(), "parsing with regex templates");
        let started = Instant::now();

        let extraction = extract_records(&log_path, &self.format)?;
        debug!(
            records = extraction.records.len(),
            skipped = extraction.skipped_lines,
            "extracted records"
        );

        let content_index = self
            .format
            .header_index(CONTENT_FIELD)
            .expect("checked in constructor");
        let partition = match_records(extraction.records, &self.templates, content_index);
        let summary = corpus::build_summary(&partition.matched);

        fs::create_dir_all(&self.config.outdir)
            .map_err(|e| Error::io(&self.config.outdir, e))?;

        let structured = self.config.outdir.join(format!("{log_name}_structured.csv"));
        let templates = self.config.outdir.join(format!("{log_name}_templates.csv"));
        corpus::write_structured(
            &structured,
            &self.format.headers,
            &partition.matched,
            self.config.keep_para,
        )?;
        corpus::write_templates(&templates, &summary)?;

        let unmatched = if self.config.save_unparsed {
            let path = self.config.outdir.join(format!("{log_name}_unmatched.csv"));
            corpus::write_unmatched(&path, &self.format.headers, &partition.unmatched)?;
            Some(path)
        } else {
            None
        };

        info!(
            matched = partition.matched.len(),
            unmatched = partition.unmatched.len(),
            events = summary.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "parsing done"
        );

        Ok(ParseArtifacts {
            structured,
            templates,
            unmatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::template::write_structured_templates;

    fn config(dir: &std::path::Path, templates: Option<PathBuf>) -> ParserConfig {
        ParserConfig {
            log_format: "<Time> <Content>".to_string(),
            indir: dir.to_path_buf(),
            outdir: dir.join("out"),
            preprocess: vec![],
            keep_para: true,
            save_unparsed: true,
            regex_templates: templates,
        }
    }

    #[test]
    fn missing_template_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegexTemplateParser::new(config(dir.path(), None)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn end_to_end_single_template_scenario() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.log"),
            "10:00 User alice logged in\ngarbled\n",
        )
        .unwrap();
        let txt = dir.path().join("templates.txt");
        std::fs::write(&txt, "User (\\w+) logged in\n").unwrap();
        let templates_csv = write_structured_templates(&txt, None).unwrap();

        let mut parser =
            RegexTemplateParser::new(config(dir.path(), Some(templates_csv))).unwrap();
        let artifacts = parser.parse("app.log").unwrap();

        let mut reader = csv::Reader::from_path(&artifacts.structured).unwrap();
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        // LineId, Time, Content, EventId, EventTemplate, ParameterList
        assert_eq!(&rows[0][3], "T1");
        assert_eq!(&rows[0][5], "alice");

        let mut reader = csv::Reader::from_path(&artifacts.templates).unwrap();
        let summary: Vec<crate::corpus::TemplateSummaryRow> = reader
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].occurrences, 1);

        let unmatched_path = artifacts.unmatched.unwrap();
        let mut reader = csv::Reader::from_path(&unmatched_path).unwrap();
        let unmatched: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>().unwrap();
        // "garbled" fails the two-field format split entirely, so it is
        // dropped at extraction, not recorded as unmatched
        assert!(unmatched.is_empty());
    }

    #[test]
    fn unmatched_content_is_retained() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.log"),
            "10:00 User alice logged in\n10:01 something else entirely\n",
        )
        .unwrap();
        let txt = dir.path().join("templates.txt");
        std::fs::write(&txt, "User (\\w+) logged in\n").unwrap();
        let templates_csv = write_structured_templates(&txt, None).unwrap();

        let mut parser =
            RegexTemplateParser::new(config(dir.path(), Some(templates_csv))).unwrap();
        let artifacts = parser.parse("app.log").unwrap();

        let mut reader = csv::Reader::from_path(artifacts.unmatched.unwrap()).unwrap();
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][2], "something else entirely");
    }
}
