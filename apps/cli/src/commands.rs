//! CLI command definitions, routing, and tracing setup.

use std::io::{Stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use docsmith_completion::HttpCompletionClient;
use docsmith_core::layout::WorkspaceLayout;
use docsmith_core::pipeline::{
    FileOutcome, PipelineConfig, ProcessedFile, ProgressReporter, RunOutcome, RunReport,
    SummaryStatus, run_pipeline,
};
use docsmith_database::QueryReader;
use docsmith_shared::{AppConfig, init_config, load_config, load_config_from, validate_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsmith — organise documents into a template with a chat model.
#[derive(Parser)]
#[command(
    name = "docsmith",
    version,
    about = "Process every document in doc/ against a template and write the model's output to result/.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.docsmith/docsmith.toml).
    #[arg(long, global = true, env = "DOCSMITH_CONFIG")]
    pub config: Option<PathBuf>,

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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process all documents in the working directory.
    Run {
        /// Working directory containing doc/, template/ and result/.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Template file name inside template/ (defaults to the first by name).
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Run a SQL query against the configured database and print the result.
    Query {
        /// SQL statement to execute.
        sql: String,
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
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsmith=info",
        1 => "docsmith=debug",
        _ => "docsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { root, template } => cmd_run(config_path, &root, template).await,
        Command::Query { sql } => cmd_query(config_path, &sql).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config file, apply environment overrides, and validate.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    config.apply_env_overrides(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

async fn cmd_run(config_path: Option<&Path>, root: &Path, template: Option<String>) -> Result<()> {
    let config = resolve_config(config_path)?;
    // Validate API key before doing anything
    let api_key = validate_api_key(&config)?;

    let client = HttpCompletionClient::new(&config.completion, api_key)?;
    let pipeline_config = PipelineConfig {
        layout: WorkspaceLayout::new(root, &config.workspace),
        template,
        system_prompt: config.completion.system_prompt.clone(),
    };

    info!(
        root = %root.display(),
        endpoint = client.endpoint(),
        model = %config.completion.model,
        "starting run"
    );

    let reporter = CliProgress::new();
    let outcome = run_pipeline(&pipeline_config, &client, &reporter).await;
    reporter.finish();

    match outcome? {
        RunOutcome::Completed(report) => print_report(&report),
        RunOutcome::NoTemplate { template_dir } => {
            println!(
                "No template found in '{}' folder. Please add a template file.",
                template_dir.display()
            );
        }
        RunOutcome::NoInputs { doc_dir } => {
            println!(
                "No files found in '{}' folder to process.",
                doc_dir.display()
            );
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("  Run complete!");
    println!("  Template:  {}", report.template.display());
    println!("  Processed: {}", report.completed_count());
    println!("  Failed:    {}", report.failed_count());
    if let SummaryStatus::Appended(line) = &report.summary {
        println!("  Summary:   {line}");
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

async fn cmd_query(config_path: Option<&Path>, sql: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let reader = QueryReader::new(config.database);

    info!(sql, "running query");
    let text = reader.query_to_text(sql).await?;
    println!("{text}");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: an indicatif spinner for the current phase, plus
/// plain status lines on stdout.
///
/// Status lines are written while the spinner is suspended, so they appear
/// even when the spinner itself is hidden (stderr not a terminal).
struct CliProgress<W: Write + Send = Stdout> {
    spinner: ProgressBar,
    out: Mutex<W>,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self::with_output(spinner, std::io::stdout())
    }
}

impl<W: Write + Send> CliProgress<W> {
    fn with_output(spinner: ProgressBar, out: W) -> Self {
        Self {
            spinner,
            out: Mutex::new(out),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    fn line(&self, message: String) {
        self.spinner.suspend(|| {
            if let Ok(mut out) = self.out.lock() {
                let _ = writeln!(out, "{message}");
            }
        });
    }
}

impl<W: Write + Send> ProgressReporter for CliProgress<W> {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_started(&self, name: &str, current: usize, total: usize) {
        self.line(format!("Processing {name}..."));
        self.spinner.set_message(format!("Waiting for model [{current}/{total}] {name}"));
    }

    fn file_saved(&self, file: &ProcessedFile) {
        self.line(format!("Saved result to {}", file.output_path.display()));
        if let FileOutcome::Failed { reason } = &file.outcome {
            self.line(format!("  (completion failed: {reason})"));
        }
    }

    fn summary_updated(&self, path: &Path, _summary: &str) {
        self.line(format!("Updated summary in {}", path.display()));
    }

    fn summary_failed(&self, reason: &str) {
        self.line(format!("Failed to update summary: {reason}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
