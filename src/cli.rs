use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use colored::Colorize;
use tabled::{settings::Style, Table};

use crate::api_models::{NicheRow, RunReport};
use crate::config::{NicheConfig, DEFAULT_SEED};
use crate::errors::ConfigError;

/// Find low-competition niches from search suggestions.
#[derive(Parser, Debug)]
#[command(name = "niche-finder", version, about)]
pub struct Args {
    /// Seed keyword to expand
    #[arg(long, default_value = DEFAULT_SEED)]
    pub seed: String,

    /// Maximum results to be considered low competition [default: 2000]
    #[arg(long)]
    pub threshold: Option<u64>,

    /// Retries per request after the first attempt [default: 3]
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Minimum pause before each request, in seconds [default: 2]
    #[arg(long)]
    pub delay_min: Option<f64>,

    /// Maximum pause before each request, in seconds [default: 7]
    #[arg(long)]
    pub delay_max: Option<f64>,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Per-request timeout, in seconds [default: 10]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// JSON file with configuration; flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Append the final report to this file
    #[arg(long)]
    pub append_report: Option<PathBuf>,

    /// How to print the final report
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Skip the startup DNS check
    #[arg(long)]
    pub skip_preflight: bool,

    /// Debug-level logging for this crate
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Table,
    Json,
}

impl Args {
    /// Defaults, then the config file, then individual flags.
    pub fn resolve_config(&self) -> Result<NicheConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => NicheConfig::load(path)?,
            None => NicheConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(delay_min) = self.delay_min {
            config.delay_min = delay_min;
        }
        if let Some(delay_max) = self.delay_max {
            config.delay_max = delay_max;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn report_header(threshold: u64) -> String {
    format!("💡 Low Competition Niches (under {} results):", threshold)
}

/// Plain report block, as printed and appended to the report file.
pub fn render_text(report: &RunReport) -> String {
    let mut lines = vec![report_header(report.threshold)];
    if report.niches.is_empty() {
        lines.push(
            "No low-competition niches found. Try a different seed keyword or increase the threshold."
                .to_string(),
        );
    } else {
        lines.extend(
            report
                .niches
                .iter()
                .map(|niche| format!("{} → {} results", niche.phrase, niche.count)),
        );
    }
    lines.join("\n")
}

pub fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", report_header(report.threshold).cyan().bold());
            if report.niches.is_empty() {
                println!(
                    "{} No low-competition niches found. Try a different seed keyword or increase the threshold.",
                    "⚠".yellow()
                );
            }
            for niche in &report.niches {
                println!("{} → {} results", niche.phrase.white().bold(), niche.count.to_string().green());
            }
        }
        OutputFormat::Table => {
            println!();
            println!("{}", report_header(report.threshold).cyan().bold());
            if report.niches.is_empty() {
                println!("{} No low-competition niches found.", "⚠".yellow());
            } else {
                let mut table = Table::new(NicheRow::from_niches(&report.niches));
                table.with(Style::modern());
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, report)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

/// Append the text report, under a timestamp line, to `path`.
pub fn append_report(path: &Path, report: &RunReport) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "\n[{}] seed: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.seed
    )?;
    writeln!(file, "{}", render_text(report))
}
