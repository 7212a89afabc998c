use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use output::{OutputFormat, Renderer};
use progress::spinner;
use reviewer_client::TrackQuery;
use reviewer_core::{bootstrap, state::AppContext, ServerConfig, ServerMode};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod settings;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "reviewer",
    version,
    about = "Look up scraped title reviews and track stream counts, or serve them over HTTP."
)]
struct Cli {
    /// Preferred renderer for command output.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
    /// Override the directory holding the cache files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Settings file (TOML, JSON or YAML) applied before `REVIEWER_*` variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Disable ANSI colors in CLI output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators for network lookups.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Serve the lookup endpoints over HTTP until interrupted.
    Serve {
        /// Address to listen on.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Look up reviews for a title identifier such as tt1234567.
    Review { imdb_id: String },
    /// Look up the stream count for a track.
    Streams(StreamArgs),
    /// Inspect and maintain the cache files.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args, Clone)]
struct StreamArgs {
    #[arg(long)]
    album_id: Option<String>,
    #[arg(long)]
    track_id: Option<String>,
    /// 22-character track ID; skips the name/artist search when given.
    #[arg(long)]
    spotify_id: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    artist: Option<String>,
}

impl From<StreamArgs> for TrackQuery {
    fn from(args: StreamArgs) -> Self {
        TrackQuery {
            container_id: args.album_id,
            item_id: args.track_id,
            external_id: args.spotify_id,
            name: args.name,
            artist: args.artist,
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
enum CacheCommand {
    /// Report cache file locations, sizes and entry counts.
    Status,
    /// Prune expired and empty entries and rewrite both cache files.
    Flush,
}

#[derive(Clone, Debug, Serialize)]
struct CacheStatusReport {
    domain: &'static str,
    path: String,
    exists: bool,
    bytes: u64,
    entries: usize,
}

#[derive(Clone, Debug, Serialize)]
struct SweepSummary {
    reviews_removed: usize,
    stream_counts_removed: usize,
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if let Command::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "reviewer", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = ServerConfig::default();
    settings::Settings::load(cli.config.as_deref())?.apply(&mut config);
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config.mode = match &cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = *bind;
            }
            ServerMode::Http
        }
        _ => ServerMode::Headless,
    };

    let runtime = bootstrap(config).await?;
    let context = runtime.context();
    let renderer = Renderer::new(cli.format);

    match &cli.command {
        Command::Serve { .. } => runtime.serve().await,
        Command::Review { imdb_id } => handle_review(imdb_id, &cli, &renderer, &context).await,
        Command::Streams(args) => {
            handle_streams(args.clone().into(), &cli, &renderer, &context).await
        }
        Command::Cache { command } => {
            handle_cache_command(command.clone(), &cli, &renderer, &context).await
        }
        Command::Completions { .. } => Ok(()),
    }
}

async fn handle_review(
    imdb_id: &str,
    cli: &Cli,
    renderer: &Renderer,
    context: &Arc<AppContext>,
) -> Result<()> {
    let spinner = spinner(cli.progress_enabled(), format!("Fetching reviews for {imdb_id}..."));
    let result = context.reviews.lookup(imdb_id.trim()).await;
    finish_spinner(spinner);

    let reviews = result.map_err(|error| anyhow!("no reviews found for {imdb_id}: {error}"))?;
    info!(target: "reviewer_cli", imdb_id, count = reviews.len(), "reviews ready");
    renderer.reviews(&reviews)
}

async fn handle_streams(
    query: TrackQuery,
    cli: &Cli,
    renderer: &Renderer,
    context: &Arc<AppContext>,
) -> Result<()> {
    let spinner = spinner(cli.progress_enabled(), "Fetching stream count...");
    let result = context.streams.lookup(&query).await;
    finish_spinner(spinner);

    let count = result.map_err(|error| anyhow!("no stream data found: {error}"))?;
    renderer.stream_count(&count)
}

async fn handle_cache_command(
    command: CacheCommand,
    cli: &Cli,
    renderer: &Renderer,
    context: &Arc<AppContext>,
) -> Result<()> {
    match command {
        CacheCommand::Status => {
            let reviews = context.reviews.cache();
            let streams = context.streams.cache();
            let reports = [
                status_report("reviews", reviews.path(), reviews.len().await).await,
                status_report("stream_counts", streams.path(), streams.len().await).await,
            ];
            if cli.quiet {
                return Ok(());
            }
            renderer.cache_status(&reports)?;
        }
        CacheCommand::Flush => {
            let (reviews_removed, stream_counts_removed) = context.sweep().await;
            let stats = context.cache_stats();
            if stats.reviews.write_failures + stats.stream_counts.write_failures > 0 {
                return Err(anyhow!("failed to rewrite one or more cache files"));
            }
            if cli.quiet {
                return Ok(());
            }
            renderer.cache_swept(&SweepSummary {
                reviews_removed,
                stream_counts_removed,
            })?;
        }
    }
    Ok(())
}

async fn status_report(
    domain: &'static str,
    path: &std::path::Path,
    entries: usize,
) -> CacheStatusReport {
    let (exists, bytes) = match tokio::fs::metadata(path).await {
        Ok(metadata) => (true, metadata.len()),
        Err(error) => {
            info!(
                target: "reviewer_cli",
                error = %error,
                path = %path.display(),
                "unable to inspect cache file"
            );
            (false, 0)
        }
    };
    CacheStatusReport {
        domain,
        path: path.display().to_string(),
        exists,
        bytes,
        entries,
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let default = if cli.quiet {
        "warn"
    } else {
        "info,reviewer=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>) {
    if let Some(progress) = spinner {
        progress.finish_and_clear();
    }
}

mod output {
    use std::fmt::Write;

    use anyhow::Result;
    use clap::ValueEnum;
    use reviewer_client::{ReviewSet, StreamCount};

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        /// The delimiter-joined wire string.
        Text,
        Json,
        Table,
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        pub fn reviews(&self, reviews: &ReviewSet) -> Result<()> {
            match self.format {
                OutputFormat::Text => println!("{}", reviews.to_wire()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reviews)?),
                OutputFormat::Table => {
                    let rows: Vec<Vec<String>> = reviews
                        .records()
                        .iter()
                        .map(|record| {
                            vec![
                                record.author.clone(),
                                record.rating.clone(),
                                truncate(&sanitize(&record.content), 80),
                            ]
                        })
                        .collect();
                    render_table(&["Author", "Rating", "Review"], &rows);
                }
            }
            Ok(())
        }

        pub fn stream_count(&self, count: &StreamCount) -> Result<()> {
            match self.format {
                OutputFormat::Text => println!("{}", count.to_wire()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(count)?),
                OutputFormat::Table => {
                    let rows = vec![
                        vec!["Streams".to_string(), count.stream_count.clone()],
                        vec!["Title".to_string(), count.title.clone()],
                        vec!["Artist".to_string(), count.artist.clone()],
                        vec!["Released".to_string(), count.release_date.clone()],
                    ];
                    render_table(&["Field", "Value"], &rows);
                }
            }
            Ok(())
        }

        pub fn cache_status(&self, reports: &[crate::CacheStatusReport]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(reports)?);
                }
                OutputFormat::Table => {
                    let rows: Vec<Vec<String>> = reports
                        .iter()
                        .map(|report| {
                            vec![
                                report.domain.to_string(),
                                report.path.clone(),
                                report.exists.to_string(),
                                report.bytes.to_string(),
                                report.entries.to_string(),
                            ]
                        })
                        .collect();
                    render_table(&["Cache", "Path", "Exists", "Bytes", "Entries"], &rows);
                }
                OutputFormat::Text => {
                    for report in reports {
                        println!("{}:", report.domain);
                        println!("  File: {}", report.path);
                        println!("  Exists: {}", report.exists);
                        println!("  Size: {} bytes", report.bytes);
                        println!("  Entries: {}", report.entries);
                    }
                }
            }
            Ok(())
        }

        pub fn cache_swept(&self, summary: &crate::SweepSummary) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(summary)?);
                }
                OutputFormat::Table => {
                    let rows = vec![
                        vec!["Reviews removed".to_string(), summary.reviews_removed.to_string()],
                        vec![
                            "Stream counts removed".to_string(),
                            summary.stream_counts_removed.to_string(),
                        ],
                    ];
                    render_table(&["Field", "Value"], &rows);
                }
                OutputFormat::Text => {
                    println!(
                        "Cache flushed: {} review entries and {} stream counts removed.",
                        summary.reviews_removed, summary.stream_counts_removed
                    );
                }
            }
            Ok(())
        }
    }

    fn render_table(headers: &[&str], rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
        for row in rows {
            for (idx, cell) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }

        fn render_line(columns: &[&str], widths: &[usize]) -> String {
            let mut line = String::new();
            for (idx, value) in columns.iter().enumerate() {
                let width = widths[idx];
                let _ = write!(line, "| {value:width$} ");
            }
            line.push('|');
            line
        }

        println!("{}", render_line(headers, &widths));
        let separator: String = widths
            .iter()
            .map(|width| format!("|{:-^1$}", "", width + 2))
            .collect();
        println!("{separator}|");

        for row in rows {
            let cols: Vec<&str> = row.iter().map(String::as_str).collect();
            println!("{}", render_line(&cols, &widths));
        }
    }

    fn sanitize(value: &str) -> String {
        value
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn truncate(value: &str, max: usize) -> String {
        if value.chars().count() <= max {
            value.to_string()
        } else {
            let mut truncated = value
                .chars()
                .take(max.saturating_sub(1))
                .collect::<String>();
            truncated.push('…');
            truncated
        }
    }

}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(message_enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !message_enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}
