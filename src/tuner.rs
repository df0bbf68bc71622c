//! Grid-search tuning of a log-parsing backend against a ground-truth
//! structured log.
//!
//! Every grid point gets its own `run_{idx}/` output directory, one parser
//! run and one evaluation, strictly in enumeration order. Every point is
//! recorded; the point with the maximum accuracy wins, first occurrence on
//! ties. A failure at any point aborts the whole run, identifying the
//! offending index and parameter tuple; artifacts of earlier points are left
//! on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{MinerConfig, ParamSetting};
use crate::error::{Error, Result};
use crate::evaluator::{evaluate, Scores};
use crate::grid::ParameterGrid;
use crate::parser::{build_parser, Method, ParserConfig};

/// Audit row for one grid point.
#[derive(Debug, Clone)]
pub struct TuningRecord {
    pub run: usize,
    pub parameters: BTreeMap<String, f64>,
    pub scores: Scores,
}

#[derive(Debug, Serialize)]
struct TuningRecordRow {
    #[serde(rename = "Run")]
    run: usize,
    #[serde(rename = "Parameter Set")]
    parameter_set: String,
    #[serde(rename = "Accuracy")]
    accuracy: f64,
    #[serde(rename = "F1")]
    f1: f64,
    #[serde(rename = "Precision")]
    precision: f64,
    #[serde(rename = "Recall")]
    recall: f64,
}

#[derive(Debug)]
pub struct TuningOutcome {
    pub optimal_index: usize,
    pub optimal_parameters: BTreeMap<String, f64>,
    pub records: Vec<TuningRecord>,
    /// Path of the persisted audit table.
    pub record_path: PathBuf,
}

fn format_parameters(parameters: &BTreeMap<String, f64>) -> String {
    let body = parameters
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

pub struct ParserTuner {
    config: MinerConfig,
    method: Method,
    grid: ParameterGrid,
    optimal: Option<BTreeMap<String, f64>>,
}

impl ParserTuner {
    pub fn from_config_file(path: &Path) -> Result<ParserTuner> {
        let config = MinerConfig::from_file(path)?;
        let method = config.method()?;
        let ranges = config.tunable_parameters()?;
        let grid = ParameterGrid::from_ranges(&ranges);
        if grid.is_empty() {
            return Err(Error::Config(
                "tunable parameter ranges expand to an empty grid".to_string(),
            ));
        }
        Ok(ParserTuner {
            config,
            method,
            grid,
            optimal: None,
        })
    }

    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    /// Search the whole grid and select the arg-max accuracy configuration.
    pub fn tune(
        &mut self,
        log_file: &str,
        input_dir: &Path,
        output_dir: &Path,
        ground_truth: &Path,
    ) -> Result<TuningOutcome> {
        let started_at = Local::now();
        let started = Instant::now();
        fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;

        info!(
            method = self.method.as_str(),
            combinations = self.grid.len(),
            log = log_file,
            "starting grid search"
        );

        let mut records: Vec<TuningRecord> = Vec::with_capacity(self.grid.len());
        let mut best: Option<(usize, f64)> = None;

        for (idx, point) in self.grid.iter().enumerate() {
            let run_dir = output_dir.join(format!("run_{idx}"));
            let scores = self
                .run_point(log_file, input_dir, &run_dir, ground_truth, &point)
                .map_err(|source| Error::GridPoint {
                    index: idx,
                    parameters: point.clone(),
                    source: Box::new(source),
                })?;

            debug!(
                run = idx,
                parameters = %format_parameters(&point),
                accuracy = scores.accuracy,
                f1 = scores.f1,
                "grid point scored"
            );

            // strict > keeps the first maximum; NaN is never promoted
            if !scores.accuracy.is_nan()
                && best.map_or(true, |(_, acc)| scores.accuracy > acc)
            {
                best = Some((idx, scores.accuracy));
            }

            records.push(TuningRecord {
                run: idx,
                parameters: point,
                scores,
            });
        }

        let (optimal_index, best_accuracy) = best.ok_or_else(|| {
            Error::Config("no grid point produced a comparable accuracy score".to_string())
        })?;
        let optimal_parameters = records[optimal_index].parameters.clone();
        self.optimal = Some(optimal_parameters.clone());

        let stamp = started_at.format("%m-%d-%Y_%Hh%Mm%Ss");
        let record_path = output_dir.join(format!("tuning_record_{stamp}.csv"));
        let mut writer = csv::Writer::from_path(&record_path)?;
        for record in &records {
            writer.serialize(TuningRecordRow {
                run: record.run,
                parameter_set: format_parameters(&record.parameters),
                accuracy: record.scores.accuracy,
                f1: record.scores.f1,
                precision: record.scores.precision,
                recall: record.scores.recall,
            })?;
        }
        writer.flush().map_err(|e| Error::io(&record_path, e))?;

        let log_path = output_dir.join(format!("data_miner_tuning_log_{stamp}.txt"));
        let mut log = fs::File::create(&log_path).map_err(|e| Error::io(&log_path, e))?;
        writeln!(log, "==========================").map_err(|e| Error::io(&log_path, e))?;
        writeln!(
            log,
            "Parser tuning - {}",
            started_at.format("%d %b %Y , %H:%M:%S")
        )
        .map_err(|e| Error::io(&log_path, e))?;
        writeln!(log, "Log parsing method: {}", self.method.as_str())
            .map_err(|e| Error::io(&log_path, e))?;
        writeln!(log, "==========================").map_err(|e| Error::io(&log_path, e))?;
        writeln!(
            log,
            "Optimal combination of parameters: {}",
            format_parameters(&optimal_parameters)
        )
        .map_err(|e| Error::io(&log_path, e))?;
        writeln!(log, "Number of combinations: {}", self.grid.len())
            .map_err(|e| Error::io(&log_path, e))?;
        writeln!(
            log,
            "Time taken to search entire parameter space: {:.3} seconds",
            started.elapsed().as_secs_f64()
        )
        .map_err(|e| Error::io(&log_path, e))?;
        writeln!(
            log,
            "Tuning record available at {}",
            record_path.display()
        )
        .map_err(|e| Error::io(&log_path, e))?;

        info!(
            optimal = %format_parameters(&optimal_parameters),
            accuracy = best_accuracy,
            elapsed_s = started.elapsed().as_secs_f64(),
            "grid search complete"
        );

        Ok(TuningOutcome {
            optimal_index,
            optimal_parameters,
            records,
            record_path,
        })
    }

    fn run_point(
        &self,
        log_file: &str,
        input_dir: &Path,
        run_dir: &Path,
        ground_truth: &Path,
        point: &BTreeMap<String, f64>,
    ) -> Result<Scores> {
        let parser_config = ParserConfig {
            log_format: self.config.log_format.clone(),
            indir: input_dir.to_path_buf(),
            outdir: run_dir.to_path_buf(),
            preprocess: self.config.preprocess_rules(),
            keep_para: true,
            save_unparsed: false,
            regex_templates: self.config.logparser.regex_templates.clone(),
        };
        let mut parser = build_parser(self.method, &parser_config, point)?;
        let artifacts = parser.parse(log_file)?;
        evaluate(ground_truth, &artifacts.structured)
    }

    /// Write a boilerplate config file carrying the winning parameter values
    /// as fixed settings. The result is a starting point for mining runs and
    /// still needs manual review.
    pub fn write_optimal_config(&self, output_dir: &Path) -> Result<PathBuf> {
        let optimal = self.optimal.as_ref().ok_or_else(|| {
            Error::Config("no optimal configuration available; run tune() first".to_string())
        })?;

        let mut config = self.config.clone();
        config.logparser.parameters = optimal
            .iter()
            .map(|(name, value)| (name.clone(), ParamSetting::Fixed(*value)))
            .collect();

        let stamp = Local::now().format("%m-%d-%Y_%Hh%Mm%Ss");
        let path = output_dir.join(format!(
            "data_miner_config_{}_{stamp}.yaml",
            self.method.as_str()
        ));
        let file = fs::File::create(&path).map_err(|e| Error::io(&path, e))?;
        serde_yaml::to_writer(file, &config)?;
        info!(config = %path.display(), "wrote optimal config template");
        Ok(path)
    }
}
