//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// DAQ Reader - single-channel analog input acquisition
#[derive(Parser, Debug)]
#[command(
    name = "daq-reader",
    author,
    version,
    about = "Analog input acquisition with a live strip chart",
    long_about = "Acquires voltage samples from one analog input channel in a dedicated reader \n\
                  context, streams them to a rolling display, and records every sample \n\
                  to the configured sink. Stop with Ctrl+C or --duration."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DAQ_READER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DAQ_READER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire until Ctrl+C or the requested duration, then print a summary
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the resolved configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when absent
    #[arg(short, long, env = "DAQ_READER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the sample rate (Hz)
    #[arg(long, env = "DAQ_READER_SAMPLE_RATE")]
    pub sample_rate: Option<f64>,

    /// Override the number of samples per read
    #[arg(long, env = "DAQ_READER_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Override the device name
    #[arg(long, env = "DAQ_READER_DEVICE")]
    pub device_name: Option<String>,

    /// Override the analog input channel index
    #[arg(long, env = "DAQ_READER_CHANNEL")]
    pub channel: Option<u32>,

    /// Override the output file (directory and file name)
    #[arg(short, long, env = "DAQ_READER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override the sink kind
    #[arg(long, value_enum, env = "DAQ_READER_SINK")]
    pub sink: Option<SinkChoice>,

    /// Override the read timeout in milliseconds
    #[arg(long, env = "DAQ_READER_READ_TIMEOUT_MS")]
    pub read_timeout_ms: Option<u64>,

    /// Stop after this many seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "DAQ_READER_DURATION")]
    pub duration: f64,

    /// Run the simulated device without pacing to the sample rate
    #[arg(long)]
    pub unthrottled: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DAQ_READER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Number of most recent samples kept by the strip chart
    #[arg(long, default_value = "50", env = "DAQ_READER_WINDOW")]
    pub window: usize,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "daq.toml", env = "DAQ_READER_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when absent
    #[arg(short, long, env = "DAQ_READER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, conflicts_with = "toml")]
    pub json: bool,

    /// Output as TOML, suitable as a starting configuration file
    #[arg(long)]
    pub toml: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Sink selection on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SinkChoice {
    /// CSV file, one sample per line
    File,
    /// Batch summaries through the log only
    Log,
}

impl From<SinkChoice> for contracts::SinkKind {
    fn from(choice: SinkChoice) -> Self {
        match choice {
            SinkChoice::File => Self::File,
            SinkChoice::Log => Self::Log,
        }
    }
}
