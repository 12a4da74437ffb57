//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for TEK Exporter using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// TEK Exporter - diagnosis key ingest and export
#[derive(Parser, Debug)]
#[command(name = "tek-exporter")]
#[command(version, about, long_about = None)]
#[command(author = "TEK Exporter Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tek-exporter.toml", env = "TEK_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TEK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish signed archives for partitions with unexported keys
    Export(commands::export::ExportArgs),

    /// Store the keys of one upload
    Ingest(commands::ingest::IngestArgs),

    /// Store an exposure metric document
    ExposureData(commands::exposure_data::ExposureDataArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show stored and pending keys per partition
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
