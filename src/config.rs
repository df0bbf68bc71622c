//! YAML configuration consumed by the miner and the tuner.
//!
//! ```yaml
//! log_format: "<Date> <Time> <Pid> <Level> <Component>: <Content>"
//! preprocess:
//!   - 'blk_(|-)[0-9]+'
//!   - ~                     # null entries are ignored
//! logparser:
//!   method: drain
//!   parameters:
//!     depth: 4                            # fixed value (mining)
//!     st: {min: 0.2, max: 0.6, step: 0.1} # range (tuning)
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Range;
use crate::parser::Method;

/// A parameter entry: a fixed value for plain mining, or a `{min,max,step}`
/// range for tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamSetting {
    Range(Range),
    Fixed(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogParserSection {
    pub method: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSetting>,
    /// Template CSV consumed by the regex method; other methods ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_templates: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    pub log_format: String,
    /// Pre-processing regexes; null entries are tolerated and dropped.
    #[serde(default)]
    pub preprocess: Vec<Option<String>>,
    pub logparser: LogParserSection,
}

impl MinerConfig {
    pub fn from_file(path: &Path) -> Result<MinerConfig> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let config: MinerConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.log_format.trim().is_empty() {
            return Err(Error::Config("log_format must not be empty".to_string()));
        }
        self.method()?;
        Ok(())
    }

    pub fn method(&self) -> Result<Method> {
        self.logparser.method.parse()
    }

    /// Non-null preprocess rules, trimmed, in declared order.
    pub fn preprocess_rules(&self) -> Vec<String> {
        self.preprocess
            .iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// All parameters as fixed values; a range entry is rejected because it
    /// does not describe a single runnable configuration.
    pub fn fixed_parameters(&self) -> Result<BTreeMap<String, f64>> {
        let mut fixed = BTreeMap::new();
        for (name, setting) in &self.logparser.parameters {
            match setting {
                ParamSetting::Fixed(value) => {
                    fixed.insert(name.clone(), *value);
                }
                ParamSetting::Range(_) => {
                    return Err(Error::Config(format!(
                        "parameter {name:?} is a range; mining needs a fixed value"
                    )))
                }
            }
        }
        Ok(fixed)
    }

    /// All parameters as ranges; a fixed entry is rejected because the tuner
    /// grid-searches every declared parameter.
    pub fn tunable_parameters(&self) -> Result<BTreeMap<String, Range>> {
        let mut ranges = BTreeMap::new();
        for (name, setting) in &self.logparser.parameters {
            match setting {
                ParamSetting::Range(range) => {
                    ranges.insert(name.clone(), *range);
                }
                ParamSetting::Fixed(_) => {
                    return Err(Error::Config(format!(
                        "parameter {name:?} is fixed; tuning needs {{min, max, step}} ranges"
                    )))
                }
            }
        }
        if ranges.is_empty() {
            return Err(Error::Config(
                "logparser.parameters declares nothing to tune".to_string(),
            ));
        }
        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), yaml).unwrap();
        f
    }

    #[test]
    fn parses_ranges_fixed_values_and_null_preprocess() {
        let f = write_config(
            r#"
log_format: "<Date> <Time> <Content>"
preprocess:
  - 'blk_(|-)[0-9]+'
  - ~
logparser:
  method: drain
  parameters:
    st: {min: 0.2, max: 0.6, step: 0.1}
    depth: 4
"#,
        );
        let config = MinerConfig::from_file(f.path()).unwrap();
        assert_eq!(config.method().unwrap(), Method::Drain);
        assert_eq!(config.preprocess_rules(), vec!["blk_(|-)[0-9]+".to_string()]);
        assert_eq!(
            config.logparser.parameters["st"],
            ParamSetting::Range(Range {
                min: 0.2,
                max: 0.6,
                step: 0.1
            })
        );
        assert_eq!(config.logparser.parameters["depth"], ParamSetting::Fixed(4.0));
    }

    #[test]
    fn missing_required_keys_are_fatal() {
        let f = write_config("preprocess: []\n");
        assert!(MinerConfig::from_file(f.path()).is_err());

        let f = write_config("log_format: \"<Content>\"\nlogparser:\n  method: nosuch\n");
        assert!(MinerConfig::from_file(f.path()).is_err());
    }

    #[test]
    fn mining_rejects_ranges_and_tuning_rejects_fixed() {
        let f = write_config(
            r#"
log_format: "<Content>"
logparser:
  method: drain
  parameters:
    st: {min: 0.2, max: 0.4, step: 0.1}
"#,
        );
        let config = MinerConfig::from_file(f.path()).unwrap();
        assert!(config.fixed_parameters().is_err());
        assert!(config.tunable_parameters().is_ok());

        let f = write_config(
            r#"
log_format: "<Content>"
logparser:
  method: drain
  parameters:
    st: 0.4
"#,
        );
        let config = MinerConfig::from_file(f.path()).unwrap();
        assert!(config.fixed_parameters().is_ok());
        assert!(config.tunable_parameters().is_err());
    }
}
