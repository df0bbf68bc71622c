//! The pluggable-parser seam: a uniform `parse(log file) -> artifacts`
//! contract over interchangeable template-discovery backends, selected by
//! name. New backends add a `Method` variant and a constructor arm; call
//! sites go through `build_parser` and the `LogParser` trait only.

pub mod drain;
pub mod regex_templates;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use fancy_regex::Regex as FancyRegex;

use crate::error::{Error, Result};

/// The log-format field carrying the free-text payload that templates are
/// matched against or discovered from.
pub const CONTENT_FIELD: &str = "Content";

/// Artifact paths produced by one parse run. `structured` and `templates`
/// always exist after a successful parse; `unmatched` only when unmatched
/// retention is enabled and the backend supports it.
#[derive(Debug, Clone)]
pub struct ParseArtifacts {
    pub structured: PathBuf,
    pub templates: PathBuf,
    pub unmatched: Option<PathBuf>,
}

/// A template-discovery backend. Implementations read
/// `config.indir/<log_name>` and write the artifact tables under
/// `config.outdir`, creating it if needed.
pub trait LogParser {
    fn parse(&mut self, log_name: &str) -> Result<ParseArtifacts>;
}

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Manually curated regex event templates (no discovery).
    Regex,
    /// Drain fixed-depth-tree clustering.
    Drain,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Regex => "regex",
            Method::Drain => "drain",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Method> {
        match s.to_ascii_lowercase().as_str() {
            "regex" => Ok(Method::Regex),
            "drain" => Ok(Method::Drain),
            other => Err(Error::Config(format!("unknown log parser method {other:?}"))),
        }
    }
}

/// Configuration shared by every backend: everything that is not a tunable
/// numeric knob.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub log_format: String,
    pub indir: PathBuf,
    pub outdir: PathBuf,
    /// Pre-processing rules applied to the content field before discovery;
    /// every match is rewritten to `<*>`.
    pub preprocess: Vec<String>,
    pub keep_para: bool,
    pub save_unparsed: bool,
    /// Template CSV for the regex backend.
    pub regex_templates: Option<PathBuf>,
}

impl ParserConfig {
    pub fn log_path(&self, log_name: &str) -> PathBuf {
        self.indir.join(log_name)
    }
}

/// Compiled preprocess rules. These use `fancy-regex` because curated rules
/// routinely rely on lookaround (e.g. number tokens bounded by
/// non-alphanumerics).
pub(crate) fn compile_preprocess(patterns: &[String]) -> Result<Vec<FancyRegex>> {
    patterns
        .iter()
        .map(|p| {
            FancyRegex::new(p).map_err(|e| Error::Preprocess {
                pattern: p.clone(),
                source: Box::new(e),
            })
        })
        .collect()
}

/// Rewrite every preprocess-rule match to the `<*>` wildcard.
pub(crate) fn apply_preprocess(rules: &[FancyRegex], content: &str) -> String {
    let mut result = content.to_string();
    for rule in rules {
        result = rule.replace_all(&result, "<*>").into_owned();
    }
    result
}

/// Instantiate a backend from its selector, the fixed configuration and the
/// (possibly tuned) numeric parameters.
pub fn build_parser(
    method: Method,
    config: &ParserConfig,
    parameters: &BTreeMap<String, f64>,
) -> Result<Box<dyn LogParser>> {
    match method {
        Method::Regex => Ok(Box::new(regex_templates::RegexTemplateParser::new(
            config.clone(),
        )?)),
        Method::Drain => Ok(Box::new(drain::DrainParser::new(config.clone(), parameters)?)),
    }
}
