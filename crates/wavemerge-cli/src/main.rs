use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wavemerge_core::{Facet, MergeConfig, Report, Severity};
use wavemerge_engine::{MergeOutcome, MergePipeline};
use wavemerge_source::{JsonDirectorySink, JsonDirectorySource, OutputSink, OverrideRuleSource, WaveSource};

const DEFAULT_CONFIG_FILE: &str = "wavemerge.toml";

/// WaveMerge - Survey wave metadata reconciliation and merge
#[derive(Parser)]
#[command(name = "wavemerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: wavemerge.toml)
    #[arg(short, long, global = true, env = "WAVEMERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every wave in a directory into one dataset
    Merge {
        /// Directory of wave files
        #[arg(short, long)]
        input: PathBuf,

        /// Parent wave identifier (overrides the config)
        #[arg(short, long)]
        parent: Option<String>,

        /// Override rule table (default: <input>/overrides.json)
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Output directory for the merged dataset
        #[arg(short, long, default_value = "merged")]
        output: PathBuf,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        report: PathBuf,

        /// Also output markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },

    /// Show the variable universe and decisions without writing output
    Inspect {
        /// Directory of wave files
        #[arg(short, long)]
        input: PathBuf,

        /// Parent wave identifier (overrides the config)
        #[arg(short, long)]
        parent: Option<String>,

        /// Override rule table (default: <input>/overrides.json)
        #[arg(long)]
        overrides: Option<PathBuf>,
    },

    /// Write a default wavemerge.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone();
    let config = load_config(config_path.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Merge { input, parent, overrides, output, report, markdown } => {
            let config = with_parent(config, parent);
            merge_command(config, &input, overrides, &output, &report, markdown.as_deref(), cli.verbose).await
        }
        Commands::Inspect { input, parent, overrides } => {
            let config = with_parent(config, parent);
            inspect_command(config, &input, overrides).await
        }
        Commands::InitConfig { force } => {
            init_config_command(config_path.as_deref().unwrap_or(Path::new(DEFAULT_CONFIG_FILE)), force)
        }
    }
}

/// Log to stderr; RUST_LOG wins over --verbose
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<MergeConfig> {
    if let Some(config_path) = path {
        MergeConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        Ok(MergeConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?)
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Ok(MergeConfig::default())
    }
}

fn with_parent(config: MergeConfig, parent: Option<String>) -> MergeConfig {
    match parent {
        Some(parent) => config.with_parent_wave(parent),
        None => config,
    }
}

/// Load waves and rules, then run the pipeline
async fn run_merge(config: MergeConfig, input: &Path, overrides: Option<PathBuf>) -> Result<MergeOutcome> {
    let mut source = JsonDirectorySource::new(input);
    if let Some(path) = overrides {
        source = source.with_overrides_path(path);
    }

    source
        .test_connection()
        .await
        .with_context(|| format!("Cannot read wave directory {}", input.display()))?;

    let waves = source.fetch_all().await?;
    let rules = source.fetch_rules().await?;
    tracing::info!(waves = waves.len(), rules = rules.len(), "loaded inputs");

    Ok(MergePipeline::new(config).run(waves, &rules)?)
}

/// Merge command - build the merged dataset and report
async fn merge_command(
    config: MergeConfig,
    input: &Path,
    overrides: Option<PathBuf>,
    output: &Path,
    report_path: &Path,
    markdown: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    if verbose {
        eprintln!("{} {}", "Merging waves from:".cyan(), input.display());
    }

    let outcome = run_merge(config, input, overrides).await?;

    JsonDirectorySink::new(output).write(&outcome.dataset).await?;

    let report = outcome.to_report()?;
    report.save_to_file(report_path)?;

    if verbose {
        eprintln!("{} {}", "Report written to:".green(), report_path.display());
    }

    if let Some(md_path) = markdown {
        std::fs::write(md_path, generate_markdown_report(&report))?;
        if verbose {
            eprintln!("{} {}", "Markdown report written to:".green(), md_path.display());
        }
    }

    print_report_summary(&report);
    println!(
        "{} {} → {}",
        "Merged dataset:".bold(),
        outcome.included().join(", "),
        output.display()
    );

    Ok(())
}

/// Inspect command - print decisions only
async fn inspect_command(config: MergeConfig, input: &Path, overrides: Option<PathBuf>) -> Result<()> {
    let outcome = run_merge(config, input, overrides).await?;

    println!("{}", "Waves:".bold());
    for wave in &outcome.waves {
        let marker = if wave.is_parent() { " (parent)".cyan().to_string() } else { String::new() };
        println!("  {:>3}  {}{}", wave.rank, wave.id, marker);
    }
    for wave in &outcome.dropped_waves {
        println!("  {:>3}  {} {}", wave.rank, wave.id, "(not selected)".dimmed());
    }
    println!();

    println!("{}", "Variables:".bold());
    for profile in &outcome.profiles {
        let status = match profile.decision {
            Some(d) if d.included => "include".green(),
            Some(_) => "exclude".red(),
            None => "undecided".yellow(),
        };
        let reason = profile.reason().map(|r| r.to_string()).unwrap_or_default();

        let conflicts: Vec<&str> = Facet::ALL
            .iter()
            .filter(|f| profile.is_inconsistent(**f))
            .map(|f| f.as_str())
            .collect();

        print!("  {:<24} {:>2} wave(s)  {:<9} {}", profile.name, profile.occurrences, status, reason);
        if !conflicts.is_empty() {
            print!("  [{}]", conflicts.join(", ").yellow());
        }
        println!();
    }
    println!();

    println!("{} {}", "Final columns:".bold(), outcome.dataset.table.columns.join(", "));

    let flagged = outcome.force_included_inconsistent();
    if !flagged.is_empty() {
        println!(
            "{} {}",
            "Force-included with inconsistent value labels:".yellow().bold(),
            flagged.join(", ")
        );
    }

    Ok(())
}

/// Init-config command - write the default configuration
fn init_config_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    MergeConfig::default().save_to_file(path)?;
    println!("{} {}", "Wrote".green(), path.display());
    Ok(())
}

fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Wave Merge Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Waves merged:       {}", report.summary.waves_merged);
    println!("  Variables:          {}", report.summary.variables_considered);
    println!("  Included:           {}", format!("{}", report.summary.variables_included).green());
    println!("  Excluded:           {}", report.summary.variables_excluded);
    println!("  Rows:               {}", report.summary.rows);
    println!();
    println!("  Total diagnostics: {}", report.summary.total);

    if report.has_warnings() {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

            if !diag.waves.is_empty() {
                println!("    Waves: {}", diag.waves.join(", "));
            }
            if let Some(exp) = &diag.expected {
                println!("    Expected: {}", exp);
            }
            if let Some(act) = &diag.actual {
                println!("    Actual:   {}", act);
            }
        }
    }

    println!();
}

fn generate_markdown_report(report: &Report) -> String {
    let mut md = String::new();

    md.push_str("# Wave Merge Report\n\n");
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Waves merged: {}\n", report.summary.waves_merged));
    md.push_str(&format!(
        "- Variables: {} considered, {} included, {} excluded\n",
        report.summary.variables_considered, report.summary.variables_included, report.summary.variables_excluded
    ));
    md.push_str(&format!("- Rows: {}\n", report.summary.rows));
    md.push_str(&format!("- Warnings: {}\n", report.summary.warnings));
    md.push_str(&format!("- Info: {}\n", report.summary.info));
    md.push('\n');

    if report.diagnostics.is_empty() {
        md.push_str("✅ **No issues found!**\n");
    } else {
        md.push_str("## Diagnostics\n\n");

        for diag in &report.diagnostics {
            let severity_emoji = match diag.severity {
                Severity::Error => "❌",
                Severity::Warn => "⚠️",
                Severity::Info => "ℹ️",
            };

            md.push_str(&format!("### {} {} - {}\n\n", severity_emoji, diag.severity, diag.code));
            md.push_str(&format!("{}\n\n", diag.message));

            if let Some(variable) = &diag.variable {
                md.push_str(&format!("**Variable:** `{}`\n\n", variable));
            }
            if !diag.waves.is_empty() {
                md.push_str(&format!("**Waves:** {}\n\n", diag.waves.join(", ")));
            }
            if let Some(exp) = &diag.expected {
                md.push_str(&format!("**Expected:** `{}`\n\n", exp));
            }
            if let Some(act) = &diag.actual {
                md.push_str(&format!("**Actual:** `{}`\n\n", act));
            }
        }
    }

    md
}
