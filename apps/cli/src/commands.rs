//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use prospector_core::{NoCrm, ProgressReporter, ResearchPipeline};
use prospector_shared::{
    AppConfig, CompanyInput, CompanyResult, RunOptions, RunStatus, db_path, init_config,
    load_config,
};
use prospector_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Prospector — company and people research for private credit sales.
#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Research private credit companies: search, scrape, extract, and score.",
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research one or more companies and print the results as JSON.
    Run {
        /// Company to research, as NAME or NAME:person,person (repeatable).
        #[arg(short, long)]
        company: Vec<String>,

        /// Input file with one company per line: "Name, person; person".
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Bypass all cache layers and refresh every source.
        #[arg(long)]
        force_refresh: bool,

        /// Companies processed in parallel (overrides config).
        #[arg(long)]
        concurrency: Option<u32>,

        /// Process at most this many companies from the input.
        #[arg(long)]
        max_companies: Option<usize>,

        /// Only process companies with these names (repeatable).
        #[arg(long)]
        filter: Vec<String>,

        /// Write results to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Cache maintenance.
    Cache {
        /// Cache subcommand.
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Research run history.
    Runs {
        /// Runs subcommand.
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show per-namespace entry counts and cached companies.
    Stats,
    /// Drop every cache entry.
    Clear,
}

/// Runs subcommands.
#[derive(Subcommand)]
pub(crate) enum RunsAction {
    /// List recent research runs.
    List {
        /// Maximum rows to show.
        #[arg(long, default_value = "20")]
        limit: u32,
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
        0 => "info,hyper=warn,reqwest=warn,html5ever=warn,selectors=warn",
        1 => "debug,hyper=info,reqwest=info,html5ever=warn,selectors=warn",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
        Command::Run {
            company,
            input,
            force_refresh,
            concurrency,
            max_companies,
            filter,
            out,
        } => {
            cmd_run(
                &company,
                input.as_deref(),
                force_refresh,
                concurrency,
                max_companies,
                filter,
                out.as_deref(),
            )
            .await
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => cmd_cache_stats().await,
            CacheAction::Clear => cmd_cache_clear().await,
        },
        Command::Runs { action } => match action {
            RunsAction::List { limit } => cmd_runs_list(limit).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

/// Parse a `--company` value: `NAME` or `NAME:person,person`.
fn parse_company_arg(raw: &str) -> Result<CompanyInput> {
    let (name, people) = match raw.split_once(':') {
        Some((name, people)) => (name, people),
        None => (raw, ""),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(eyre!("empty company name in '{raw}'"));
    }

    let mut company = CompanyInput::new(name);
    company.people = people
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();
    Ok(company)
}

/// Parse an input file with one company per line: `Name, person; person`.
/// Blank lines and `#` comments are skipped.
fn parse_input_file(content: &str) -> Result<Vec<CompanyInput>> {
    let mut companies = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (name, people) = match line.split_once(',') {
            Some((name, people)) => (name, people),
            None => (line, ""),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(eyre!("line {}: missing company name", idx + 1));
        }

        let mut company = CompanyInput::new(name);
        company.people = people
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        companies.push(company);
    }
    Ok(companies)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    company_args: &[String],
    input: Option<&std::path::Path>,
    force_refresh: bool,
    concurrency: Option<u32>,
    max_companies: Option<usize>,
    filter: Vec<String>,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(n) = concurrency {
        config.limits.company_concurrency = n.max(1);
    }

    let mut companies: Vec<CompanyInput> = Vec::new();
    if let Some(path) = input {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read input file '{}': {e}", path.display()))?;
        companies.extend(parse_input_file(&content)?);
    }
    for raw in company_args {
        companies.push(parse_company_arg(raw)?);
    }
    if companies.is_empty() {
        return Err(eyre!("no companies given: use --company or --input"));
    }

    let storage = Arc::new(Storage::open(&db_path(&config)?).await?);
    let options = RunOptions {
        force_refresh,
        max_companies,
        company_filter: filter,
    };

    let pipeline = ResearchPipeline::new(config, options, storage, Box::new(NoCrm))?;

    info!(companies = companies.len(), force_refresh, "starting research");

    let reporter = CliProgress::new();
    let started = std::time::Instant::now();
    let results = pipeline.run(&companies, &reporter).await?;
    reporter.finish();

    let succeeded = results.iter().filter(|r| r.error.is_none()).count();
    let json = serde_json::to_string_pretty(&results)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
            println!();
            println!("  Researched {succeeded}/{} companies", results.len());
            println!("  Results:   {}", path.display());
            println!("  Time:      {:.1}s", started.elapsed().as_secs_f64());
            println!();
        }
        None => println!("{json}"),
    }

    Ok(())
}

async fn cmd_cache_stats() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&db_path(&config)?).await?;

    let stats = storage.cache_stats().await?;
    if stats.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    println!("Cache entries by namespace:");
    for (ns, count) in &stats {
        println!("  {ns:<10} {count}");
    }

    let companies = storage.list_cached_companies().await?;
    if !companies.is_empty() {
        println!();
        println!("Cached companies:");
        for name in companies {
            println!("  {name}");
        }
    }
    Ok(())
}

async fn cmd_cache_clear() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&db_path(&config)?).await?;
    let removed = storage.cache_invalidate_all().await?;
    println!("Removed {removed} cache entries.");
    Ok(())
}

async fn cmd_runs_list(limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&db_path(&config)?).await?;

    let runs = storage.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!("{:<38} {:<28} {:<16} {:>4}", "ID", "COMPANY", "STATUS", "PCT");
    for run in runs {
        println!(
            "{:<38} {:<28} {:<16} {:>3}%",
            run.id, run.company_name, run.status, run.progress_pct
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, company: &str, _status: RunStatus, pct: u32, msg: &str) {
        self.spinner.set_message(format!("[{pct:>3}%] {company}: {msg}"));
    }

    fn company_done(&self, result: &CompanyResult) {
        let line = match (&result.error, result.fit_score) {
            (Some(err), _) => format!("  ✗ {}: {err}", result.company_name),
            (None, Some(fit)) => {
                let mut tags = Vec::new();
                if result.from_cache {
                    tags.push("cached");
                }
                if result.degraded {
                    tags.push("degraded");
                }
                if result.insufficient_data {
                    tags.push("insufficient data");
                }
                let suffix = if tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", tags.join(", "))
                };
                format!(
                    "  ✓ {} — fit {}/100 ({}){suffix}",
                    result.company_name, fit.total, fit.rating
                )
            }
            (None, None) => format!("  ✓ {}", result.company_name),
        };
        self.spinner.println(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_arg_with_people() {
        let company = parse_company_arg("Meridian Credit: Jane Roe, John Doe").unwrap();
        assert_eq!(company.company_name, "Meridian Credit");
        assert_eq!(company.people, vec!["Jane Roe", "John Doe"]);
    }

    #[test]
    fn company_arg_without_people() {
        let company = parse_company_arg("Meridian Credit").unwrap();
        assert_eq!(company.company_name, "Meridian Credit");
        assert!(company.people.is_empty());
    }

    #[test]
    fn input_file_skips_comments_and_blanks() {
        let content = "# portfolio targets\n\nMeridian Credit, Jane Roe; John Doe\nApex Capital\n";
        let companies = parse_input_file(content).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].company_name, "Meridian Credit");
        assert_eq!(companies[0].people, vec!["Jane Roe", "John Doe"]);
        assert_eq!(companies[1].company_name, "Apex Capital");
        assert!(companies[1].people.is_empty());
    }

    #[test]
    fn input_file_rejects_missing_name() {
        assert!(parse_input_file(", Jane Roe\n").is_err());
    }
}
