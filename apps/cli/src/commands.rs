//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sourcemill_pipeline::{Pipeline, ProgressReporter};
use sourcemill_shared::{
    AppConfig, IngestionRequest, IngestionResult, PipelineConfig, UploadedFile, init_config,
    load_config, load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sourcemill — normalize PDFs and blogs into knowledge items.
#[derive(Parser)]
#[command(
    name = "sourcemill",
    version,
    about = "Ingest PDFs and blog URLs into a uniform set of knowledge items.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output format for ingestion results.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Markdown,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest PDFs and blog URLs, printing the result to stdout.
    Ingest {
        /// PDF file to ingest (repeatable).
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Blog URL to crawl (repeatable).
        #[arg(short, long)]
        url: Vec<String>,

        /// File containing one URL per line.
        #[arg(long)]
        urls_file: Option<PathBuf>,

        /// Page budget per crawl job (1-100).
        #[arg(long, default_value = "10")]
        max_pages: u32,

        /// Team label for a source, as `source=label` (repeatable).
        /// Unlabeled sources get positional `team_N` labels.
        #[arg(short, long)]
        team: Vec<String>,

        /// Output format.
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Permit crawling localhost/private addresses (local testing).
        #[arg(long)]
        allow_private_hosts: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show {
        /// Path to an alternate config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest {
            file,
            url,
            urls_file,
            max_pages,
            team,
            format,
            allow_private_hosts,
        } => {
            cmd_ingest(
                &file,
                &url,
                urls_file.as_deref(),
                max_pages,
                &team,
                &format,
                allow_private_hosts,
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
        },
    }
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    files: &[PathBuf],
    urls: &[String],
    urls_file: Option<&std::path::Path>,
    max_pages: u32,
    team_args: &[String],
    format: &OutputFormat,
    allow_private_hosts: bool,
) -> Result<()> {
    if files.is_empty() && urls.is_empty() && urls_file.is_none() {
        return Err(eyre!("nothing to ingest: pass --file, --url, or --urls-file"));
    }

    let config = load_config()?;

    // Assemble URL lines: explicit --url flags first, then the file.
    let mut url_lines: Vec<String> = urls.to_vec();
    if let Some(path) = urls_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
        url_lines.extend(content.lines().map(str::to_string));
    }

    let mut uploaded = Vec::with_capacity(files.len());
    for path in files {
        let bytes = std::fs::read(path).map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| eyre!("file has no usable name: {}", path.display()))?
            .to_string();

        uploaded.push(UploadedFile {
            name,
            bytes,
            content_type: Some("application/pdf".into()),
        });
    }

    let request = IngestionRequest {
        files: uploaded,
        url_lines: url_lines.join("\n"),
        max_pages,
        source_team_map: parse_team_args(team_args)?,
    };

    let mut pipeline_config = PipelineConfig::from(&config);
    pipeline_config.crawl.allow_private_hosts = allow_private_hosts;

    info!(
        files = request.files.len(),
        max_pages,
        "starting ingestion"
    );

    let reporter = CliProgress::new();
    let pipeline = Pipeline::new(pipeline_config);
    let result = pipeline.run_with_progress(request, &reporter).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Markdown => print!("{}", sourcemill_markdown::render_result(&result)),
    }

    if result.timed_out {
        eprintln!("warning: request timed out, results are partial");
    }

    Ok(())
}

/// Parse repeated `source=label` arguments into the team map.
fn parse_team_args(args: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for arg in args {
        let Some((source, label)) = arg.split_once('=') else {
            return Err(eyre!("--team expects source=label, got '{arg}'"));
        };
        if source.is_empty() || label.is_empty() {
            return Err(eyre!("--team expects source=label, got '{arg}'"));
        }
        map.insert(source.to_string(), label.to_string());
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn job_started(&self, source_id: &str) {
        self.spinner.set_message(format!("Ingesting {source_id}"));
    }

    fn job_settled(&self, source_id: &str, items: usize, errors: usize) {
        self.spinner
            .set_message(format!("Done {source_id} ({items} items, {errors} errors)"));
    }

    fn done(&self, _result: &IngestionResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("created {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&std::path::Path>) -> Result<()> {
    let config: AppConfig = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
