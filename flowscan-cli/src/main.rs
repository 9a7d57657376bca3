use clap::{Parser, Subcommand};
use colored::Colorize;
use flowscan::{
    config::parse_criterion,
    search::{
        parse_line,
        scanner::{decode_line, logical_lines},
        search_with, ParsedLine,
    },
    CliOverrides, DecodeMode, ScanConfig, ScanError, SearchOutput, SearchQuery,
};
use std::{fs, num::NonZeroUsize, path::PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, ScanError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Directory holding the uploaded flow-log files
    #[arg(short = 'd', long)]
    root: Option<PathBuf>,

    /// Exact-match criterion as field=value (can be specified multiple times)
    #[arg(short = 'c', long = "criteria")]
    criteria: Vec<String>,

    /// Only records whose interval ends at or after this epoch time
    #[arg(long)]
    start: Option<i64>,

    /// Only records whose interval starts at or before this epoch time
    #[arg(long)]
    end: Option<i64>,

    /// Number of scan workers
    #[arg(short = 'j', long)]
    workers: Option<NonZeroUsize>,

    /// Stop scanning a file after this many matches
    #[arg(short = 'm', long)]
    max_per_file: Option<usize>,

    /// Maximum number of results to print
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// JSON request body with criteria, starttime, endtime, workers, max_results_per_file
    #[arg(short = 'q', long)]
    query: Option<PathBuf>,

    /// Configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How to handle invalid UTF-8 sequences (ignore|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search flow-log files for matching records
    Search(Box<CliSearchConfig>),

    /// Show how each line of a file is parsed
    Parse {
        /// File to parse
        file: PathBuf,

        /// How to handle invalid UTF-8 sequences (ignore|lossy)
        #[arg(long, default_value = "ignore")]
        encoding: String,
    },
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => {
            let file_config = ScanConfig::load_from(args.config.as_deref())?;
            let config = file_config.merge_with_cli(cli_config(&args)?);
            init_logging(&config.log_level);
            debug!("Effective configuration: {:?}", config);

            let output = search_with(&config.root_path, &config.query, config.decode_mode);
            if args.json {
                let report = output.report(config.max_reported);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_search_results(&output, config.max_reported);
            }
            Ok(())
        }
        Commands::Parse { file, encoding } => {
            let mode: DecodeMode = encoding.parse()?;
            let bytes = fs::read(&file).map_err(|e| ScanError::from_io(&file, e))?;
            print_parsed_lines(&bytes, mode);
            Ok(())
        }
    }
}

/// Turns command-line arguments into a config layer
fn cli_config(args: &CliSearchConfig) -> Result<CliOverrides> {
    let query = match &args.query {
        Some(path) => {
            let body = fs::read_to_string(path).map_err(|e| ScanError::from_io(path, e))?;
            Some(SearchQuery::from_json(&body)?)
        }
        None => None,
    };
    let criteria = args
        .criteria
        .iter()
        .map(|raw| parse_criterion(raw))
        .collect::<Result<_>>()?;

    Ok(CliOverrides {
        root_path: args.root.clone(),
        query,
        criteria,
        starttime: args.start,
        endtime: args.end,
        workers: args.workers,
        max_results_per_file: args.max_per_file,
        decode_mode: args
            .encoding
            .as_deref()
            .map(str::parse::<DecodeMode>)
            .transpose()?,
        max_reported: args.limit,
        log_level: args.log_level.clone(),
    })
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_search_results(output: &SearchOutput, limit: usize) {
    let summaries = output.summaries(limit);
    for summary in &summaries {
        println!("{}: {}", summary.file.blue(), summary.summary);
    }

    if summaries.len() < output.total_matches() {
        println!(
            "\nShowing first {} of {} matches",
            summaries.len(),
            output.total_matches()
        );
    }
    println!(
        "\nFound {} matches in {} files ({}s)",
        output.total_matches(),
        output.files_with_matches,
        output.elapsed_seconds()
    );
    if output.files_failed > 0 {
        println!(
            "{}",
            format!("{} files could not be fully read", output.files_failed).yellow()
        );
    }
}

fn print_parsed_lines(bytes: &[u8], mode: DecodeMode) {
    let lines = bytes
        .split_inclusive(|&b| b == b'\n')
        .flat_map(|chunk| logical_lines(chunk));
    for (idx, raw) in lines.enumerate() {
        let line_number = (idx + 1).to_string();
        match parse_line(&decode_line(raw, mode)) {
            ParsedLine::Structured(record) => {
                println!("{} {} {:?}", line_number.green(), "json".cyan(), record.fields());
            }
            ParsedLine::Delimited(record) => {
                println!("{} {} {:?}", line_number.green(), "delimited".cyan(), record.fields());
            }
            ParsedLine::NoRecord => {
                println!("{} {}", line_number.green(), "no record".red());
            }
        }
    }
}
