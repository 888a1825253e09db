use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Validate CSV files against W3C CSV-W metadata", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate the CSV files described by a CSV-W metadata document
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// CSV-W metadata document (path or URL)
    #[arg(short, long)]
    pub schema: String,
    /// Validate this CSV file (path or URL) against the first table schema
    #[arg(long)]
    pub csv: Option<String>,
    /// Log verbosity
    #[arg(long = "log-level", value_enum, default_value = "WARN")]
    pub log_level: LogLevel,
    /// Report rendering on stdout
    #[arg(long = "report", value_enum, default_value = "table")]
    pub report: ReportFormat,
    /// Rows per batch handed to a validation worker
    #[arg(long = "row-grouping", default_value_t = 1000)]
    pub row_grouping: usize,
    /// Number of validation workers (defaults to the available cores)
    #[arg(long)]
    pub parallelism: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    Table,
    Json,
}
