use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use logminer::{DataMiner, ParserTuner, Result};

#[derive(Parser)]
#[command(name = "logminer", version, about = "Parse raw log files into structured events and tune log parsers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a raw log file into structured events using a configured backend
    Parse {
        /// Name of the raw log file (no path)
        #[arg(short = 'l', long)]
        log_file: String,
        /// Directory containing the log file
        #[arg(short = 'i', long)]
        input_dir: PathBuf,
        /// Directory for the structured output artifacts
        #[arg(short = 'o', long)]
        output_dir: PathBuf,
        /// YAML config with log_format, preprocess and logparser settings
        #[arg(short = 'c', long)]
        config_file: PathBuf,
        /// Skip extracting runtime parameters into the structured table
        #[arg(long)]
        no_params: bool,
        /// Also write records matching no template to <log>_unmatched.csv
        #[arg(long)]
        save_unparsed: bool,
        /// Print row/event counts of the parsed result
        #[arg(short = 'p', long)]
        print_stats: bool,
    },
    /// Grid-search a backend's tunable parameters against a ground truth
    Tune {
        /// Name of the raw log file (no path)
        #[arg(short = 'l', long)]
        log_file: String,
        /// Directory containing the log file
        #[arg(short = 'i', long)]
        input_dir: PathBuf,
        /// Directory for per-run artifacts and the tuning record
        #[arg(short = 'o', long)]
        output_dir: PathBuf,
        /// YAML config with tunable {min, max, step} parameter ranges
        #[arg(short = 'c', long)]
        config_file: PathBuf,
        /// Ground-truth structured log for the same file
        #[arg(short = 'g', long)]
        ground_truth: PathBuf,
        /// Also write a boilerplate config carrying the optimal values
        #[arg(short = 'n', long)]
        new_config: bool,
    },
    /// Assign ids to a plain-text regex template file, producing its CSV form
    StructureTemplates {
        /// Newline-separated regex template file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output CSV path; defaults to <input stem>_csv.csv beside the input
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Parse {
            log_file,
            input_dir,
            output_dir,
            config_file,
            no_params,
            save_unparsed,
            print_stats,
        } => {
            let mut miner = DataMiner::new(&config_file, &input_dir, &output_dir)?;
            let artifacts = miner.parse_logs(&log_file, !no_params, save_unparsed)?;
            println!("Structured log: {}", artifacts.structured.display());
            println!("Event templates: {}", artifacts.templates.display());
            if let Some(unmatched) = &artifacts.unmatched {
                println!("Unmatched messages: {}", unmatched.display());
            }
            if print_stats {
                let (rows, events) = DataMiner::inspect_parsed_result(&artifacts.structured)?;
                println!("Parsed {rows} log messages into {events} unique events");
            }
            Ok(())
        }
        Command::Tune {
            log_file,
            input_dir,
            output_dir,
            config_file,
            ground_truth,
            new_config,
        } => {
            let mut tuner = ParserTuner::from_config_file(&config_file)?;
            let outcome = tuner.tune(&log_file, &input_dir, &output_dir, &ground_truth)?;
            println!(
                "Optimal parameters (run {}): {:?}",
                outcome.optimal_index, outcome.optimal_parameters
            );
            println!("Tuning record: {}", outcome.record_path.display());
            if new_config {
                let config = tuner.write_optimal_config(&output_dir)?;
                println!("New template config file created: {}", config.display());
            }
            Ok(())
        }
        Command::StructureTemplates { input, output } => {
            let out = logminer::template::write_structured_templates(&input, output.as_deref())?;
            println!("Structured regex templates available at {}", out.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
