//! The data-miner façade: a configured backend plus the parse entry point
//! used by the CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::MinerConfig;
use crate::error::{Error, Result};
use crate::parser::{build_parser, Method, ParseArtifacts, ParserConfig};

pub struct DataMiner {
    method: Method,
    parameters: BTreeMap<String, f64>,
    base_config: ParserConfig,
}

impl DataMiner {
    /// Resolve the backend and its fixed parameters from a config file. A
    /// range-form parameter is rejected here; ranges belong to the tuner.
    pub fn new(config_path: &Path, input_dir: &Path, output_dir: &Path) -> Result<DataMiner> {
        let config = MinerConfig::from_file(config_path)?;
        let method = config.method()?;
        let parameters = config.fixed_parameters()?;

        let base_config = ParserConfig {
            log_format: config.log_format.clone(),
            indir: input_dir.to_path_buf(),
            outdir: output_dir.to_path_buf(),
            preprocess: config.preprocess_rules(),
            keep_para: true,
            save_unparsed: false,
            regex_templates: config.logparser.regex_templates.clone(),
        };

        Ok(DataMiner {
            method,
            parameters,
            base_config,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Parse one raw log file into its structured artifacts.
    /// `save_parameters` toggles extraction of the runtime parameter list;
    /// `save_unparsed` additionally writes the records that matched no
    /// template to `<log>_unmatched.csv`.
    pub fn parse_logs(
        &mut self,
        log_file: &str,
        save_parameters: bool,
        save_unparsed: bool,
    ) -> Result<ParseArtifacts> {
        let mut config = self.base_config.clone();
        config.keep_para = save_parameters;
        config.save_unparsed = save_unparsed;
        let mut parser = build_parser(self.method, &config, &self.parameters)?;
        let artifacts = parser.parse(log_file)?;
        info!(
            structured = %artifacts.structured.display(),
            templates = %artifacts.templates.display(),
            "mining done"
        );
        Ok(artifacts)
    }

    /// Row count and distinct event count of a structured log.
    pub fn inspect_parsed_result(path: &Path) -> Result<(usize, usize)> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let event_idx = headers
            .iter()
            .position(|h| h == "EventId")
            .ok_or_else(|| Error::Evaluation {
                path: PathBuf::from(path),
                reason: "missing EventId column".to_string(),
            })?;

        let mut rows = 0usize;
        let mut events = std::collections::BTreeSet::new();
        for record in reader.records() {
            let record = record?;
            rows += 1;
            if let Some(event) = record.get(event_idx) {
                events.insert(event.to_string());
            }
        }
        Ok((rows, events.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mines_with_a_drain_config_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.log"),
            "10:00 User alice logged in\n10:01 User bob logged in\n",
        )
        .unwrap();
        let config_path = dir.path().join("miner.yaml");
        std::fs::write(
            &config_path,
            r#"
log_format: "<Time> <Content>"
preprocess: []
logparser:
  method: drain
  parameters:
    depth: 4
    st: 0.4
"#,
        )
        .unwrap();

        let mut miner =
            DataMiner::new(&config_path, dir.path(), &dir.path().join("out")).unwrap();
        let artifacts = miner.parse_logs("app.log", true, false).unwrap();

        let (rows, events) = DataMiner::inspect_parsed_result(&artifacts.structured).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(events, 1);
    }
}
