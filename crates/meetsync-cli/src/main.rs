use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use meetsync::ical::{normalize_event, parse_export};
use meetsync::parser::{discover_event_urls, series_group};
use meetsync::source::{FileOutcome, ProcessOptions, process_source_file};
use meetsync::utils::RunStats;
use meetsync::{Fetch, FetchConfig, SeriesUpdater, WebScraper};

#[derive(Parser)]
#[command(name = "meetsync")]
#[command(about = "Refreshes event-series records from meetup.com", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        default_value_t = 30,
        global = true,
        help = "HTTP request timeout in seconds"
    )]
    timeout: u64,

    #[arg(long, global = true, help = "User agent sent with HTTP requests")]
    user_agent: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh series records in YAML source files from their meetup.com pages
    Update {
        #[arg(required = true, help = "YAML source files to update")]
        files: Vec<PathBuf>,

        #[arg(long, help = "Print the updated YAML instead of writing it")]
        dry_run: bool,

        #[arg(
            long,
            help = "Write the records merged so far when an update fails part way"
        )]
        keep_partial: bool,
    },
    /// Parse a local calendar export and print its normalized event
    Ical {
        #[arg(help = "Path to an .ics file")]
        file: PathBuf,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// List the event pages linked from a meetup.com group page
    Discover {
        #[arg(help = "URL of the group page")]
        url: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn build_scraper(timeout: u64, user_agent: Option<String>) -> WebScraper {
    let mut config = FetchConfig {
        timeout: Duration::from_secs(timeout),
        ..Default::default()
    };
    if let Some(user_agent) = user_agent {
        config.user_agent = user_agent;
    }

    WebScraper::with_config(config).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Update {
            files,
            dry_run,
            keep_partial,
        } => {
            let updater = SeriesUpdater::new(build_scraper(cli.timeout, cli.user_agent));
            let options = ProcessOptions {
                dry_run,
                keep_partial,
            };

            let mut stats = RunStats::default();
            for path in &files {
                match process_source_file(&updater, path, options).await {
                    Ok(FileOutcome::Updated { stats: file_stats, yaml }) => {
                        log::info!("{}: {}", path.display(), file_stats);
                        if dry_run {
                            println!("# {}\n{}", path.display(), yaml);
                        }
                        stats.add_updated(file_stats);
                    }
                    Ok(FileOutcome::Skipped) => {
                        log::debug!("{}: nothing to scrape", path.display());
                        stats.skipped += 1;
                    }
                    Ok(FileOutcome::Invalid) => stats.invalid += 1,
                    Err(e) => {
                        log::error!("Failed to process source file {}: {}", path.display(), e);
                        stats.failed += 1;
                    }
                }
            }

            eprint!("{}", stats);
            if stats.failed > 0 {
                process::exit(1);
            }
        }

        Commands::Ical { file, format } => {
            let text = std::fs::read_to_string(&file).unwrap_or_else(|e| {
                log::error!("Error reading {}: {}", file.display(), e);
                process::exit(1);
            });

            let event = parse_export(&text)
                .map_err(|e| e.to_string())
                .and_then(|calendar| normalize_event(&calendar).map_err(|e| e.to_string()))
                .unwrap_or_else(|e| {
                    log::error!("Error reading calendar {}: {}", file.display(), e);
                    process::exit(1);
                });

            match format {
                OutputFormat::Json => serialize_json(&event),
                OutputFormat::Text => print!("{}", event),
            }
        }

        Commands::Discover { url, format } => {
            let group = series_group(&url).unwrap_or_else(|e| {
                log::error!("{}", e);
                process::exit(1);
            });

            log::info!("Fetching group page {}...", url);
            let scraper = build_scraper(cli.timeout, cli.user_agent);
            let page = scraper.fetch(&url).await.unwrap_or_else(|e| {
                log::error!("Error fetching group page: {}", e);
                process::exit(1);
            });

            let urls = discover_event_urls(&page.body, &page.url, &group).unwrap_or_else(|e| {
                log::error!("Error scanning group page: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&urls),
                OutputFormat::Text => {
                    if urls.is_empty() {
                        println!("No events found.");
                    } else {
                        for (i, url) in urls.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, url);
                        }
                    }
                }
            }
        }
    }
}
