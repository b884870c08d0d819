use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use search_syntax::{QueryReport, SearchConfig, SearchParser};
use slog::{o, Drain, Level, Logger};

/// Inspect how issue-search queries are tokenized and validated
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON file with search options and key descriptors; defaults to the
    /// built-in issue search keys
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// log parser activity to stderr
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the token tree as JSON
    Parse {
        query: String,
        #[clap(long)]
        pretty: bool,
    },
    /// Print highlight spans, one per line
    Flatten { query: String },
    /// Print the canonical form of the query
    Stringify { query: String },
    /// Report invalid and warning tokens; exits non-zero if any token is invalid
    Check { query: String },
}

fn logger(verbose: bool) -> Logger {
    let level = if verbose { Level::Debug } else { Level::Warning };
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(level)
        .fuse();
    Logger::root(drain, o!())
}

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let logger = logger(args.verbose);

    let config = match &args.config {
        Some(path) => SearchConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("{:?}", miette::Report::new(e)))?,
        None => SearchConfig::default(),
    };
    let parser = SearchParser::new(logger, config)?;

    match args.command {
        Command::Parse { query, pretty } => {
            let result = parser.parse(&query);
            let json = if pretty {
                serde_json::to_string_pretty(&result)
            } else {
                serde_json::to_string(&result)
            }
            .context("failed to serialize token tree")?;
            println!("{}", json);
        }
        Command::Flatten { query } => {
            if let Some(result) = parser.parse(&query) {
                for span in result.highlight() {
                    let flag = match (span.invalid, span.warning) {
                        (true, _) => " invalid",
                        (false, true) => " warning",
                        _ => "",
                    };
                    println!(
                        "{:>4}..{:<4} {:?} {:?}{}",
                        span.span.start,
                        span.span.end,
                        span.kind,
                        span.span.slice(result.source()),
                        flag
                    );
                }
            }
        }
        Command::Stringify { query } => {
            if let Some(result) = parser.parse(&query) {
                println!("{}", result.stringify());
            }
        }
        Command::Check { query } => {
            let Some(result) = parser.parse(&query) else {
                return Ok(());
            };
            match QueryReport::from_result(&result) {
                Some(report) => {
                    let invalid = report.invalid_count();
                    eprintln!("{:?}", miette::Report::new(report));
                    if invalid > 0 {
                        std::process::exit(1);
                    }
                }
                None => println!("ok"),
            }
        }
    }

    Ok(())
}
