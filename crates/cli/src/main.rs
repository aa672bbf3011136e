//! # DAQ Reader CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 采集运行的启动、显示与停止
//! - 优雅关闭处理

mod cli;
mod commands;
mod display;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_acquisition, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Metrics exporter only matters for a live run
    let metrics_port = match &cli.command {
        Commands::Run(args) => args.metrics_port,
        _ => 0,
    };
    observability::init(ObservabilityConfig::from_verbosity(
        cli.verbose,
        cli.quiet,
        cli.log_format.into(),
        metrics_port,
    ))?;

    info!(version = env!("CARGO_PKG_VERSION"), "DAQ Reader starting");

    let result = match &cli.command {
        Commands::Run(args) => run_acquisition(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
