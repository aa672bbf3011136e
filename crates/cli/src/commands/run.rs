//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use acquisition::{Controller, RunOutcome, RunSummary, TickOutcome};
use config_loader::ConfigLoader;
use contracts::{SampleDisplay, Settings, SinkKind};
use device::ConfiguredDevice;
use sinks::ConfiguredSinks;

use super::load_settings;
use crate::cli::RunArgs;
use crate::display::StripChartDisplay;

/// Execute the `run` command
pub async fn run_acquisition(args: &RunArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    apply_overrides(&mut settings, args);
    ConfigLoader::validate(&settings).context("Invalid configuration")?;

    info!(
        channel = %settings.acquisition.physical_channel(),
        sample_rate = settings.acquisition.sample_rate,
        samples_per_read = settings.acquisition.samples_per_read,
        device = ?settings.device.kind,
        sink = ?settings.sink.kind,
        "Configuration loaded"
    );

    let device =
        ConfiguredDevice::from_settings(&settings.device).context("Failed to create device")?;
    let opener = ConfiguredSinks::new(settings.sink.clone());
    let mut controller = Controller::new(
        device,
        opener,
        settings.controller.clone(),
        settings.sink.file_name.clone(),
    );

    let mut display = StripChartDisplay::new(args.window);
    display.reset();

    let started = Instant::now();
    controller
        .start(settings.acquisition.clone())
        .context("Failed to start acquisition")?;

    let deadline = (args.duration > 0.0)
        .then(|| Duration::try_from_secs_f64(args.duration).ok())
        .flatten()
        .map(|duration| started + duration);
    let period = settings
        .controller
        .display_period()
        .context("display_rate_hz is too small")?;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let TickOutcome::Faulted(fault) = controller.tick(&mut display) {
                    warn!(kind = %fault.kind, "Reader faulted, stopping acquisition");
                    break;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    info!(duration_secs = args.duration, "Requested duration reached");
                    break;
                }
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping acquisition...");
                break;
            }
        }
    }

    let summary = controller
        .stop()
        .await
        .context("Failed to stop acquisition")?;

    let Some(summary) = summary else {
        return Ok(());
    };
    print_summary(&summary, started.elapsed(), &display, &settings);

    match summary.outcome {
        RunOutcome::Acknowledged => {
            info!(run_id = summary.run_id, "DAQ Reader finished");
            Ok(())
        }
        RunOutcome::Faulted(fault) => {
            anyhow::bail!("Acquisition faulted: {}", fault.describe())
        }
    }
}

/// Apply command-line overrides on top of the loaded settings
fn apply_overrides(settings: &mut Settings, args: &RunArgs) {
    let acquisition = &mut settings.acquisition;
    if let Some(rate) = args.sample_rate {
        info!(sample_rate = rate, "Overriding sample rate from CLI");
        acquisition.sample_rate = rate;
    }
    if let Some(count) = args.batch_size {
        info!(samples_per_read = count, "Overriding batch size from CLI");
        acquisition.samples_per_read = count;
    }
    if let Some(ref name) = args.device_name {
        acquisition.device_name = name.clone();
    }
    if let Some(channel) = args.channel {
        acquisition.channel = channel;
    }

    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output file from CLI");
        if let Some(name) = output.file_name() {
            settings.sink.file_name = name.to_string_lossy().into_owned();
        }
        settings.sink.directory = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => ".".into(),
        };
    }
    if let Some(sink) = args.sink {
        settings.sink.kind = sink.into();
    }

    if let Some(timeout) = args.read_timeout_ms {
        settings.controller.read_timeout_ms = timeout;
    }
    if args.unthrottled {
        settings.device.realtime = false;
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print the run summary
fn print_summary(
    summary: &RunSummary,
    elapsed: Duration,
    display: &StripChartDisplay,
    settings: &Settings,
) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                        Run Summary                           ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📊 Run {}", summary.run_id);
    println!("   ├─ Channel: {}", settings.acquisition.physical_channel());
    println!("   ├─ Duration: {:.2}s", elapsed.as_secs_f64());
    println!("   ├─ Samples displayed: {}", summary.samples_displayed);
    if let Some((min, max)) = display.range() {
        println!("   ├─ Last window: {min:.4} .. {max:.4} V");
    }
    println!("   └─ Outcome: {}", summary.outcome.as_str());

    if let Some(fault) = summary.outcome.fault() {
        println!("\n⚠️  Fault");
        println!("   ├─ Kind: {}", fault.kind);
        match fault.causes.split_last() {
            Some((last, rest)) => {
                println!("   ├─ Message: {}", fault.message);
                for cause in rest {
                    println!("   ├─ Caused by: {cause}");
                }
                println!("   └─ Caused by: {last}");
            }
            None => println!("   └─ Message: {}", fault.message),
        }
    }

    match &summary.report {
        Some(report) => {
            println!("\n📈 Reader");
            println!("   ├─ Iterations: {}", report.iterations);
            println!("   ├─ Samples acquired: {}", report.samples);
            println!("   ├─ Read latency (ms): {}", report.read_latency_ms);
            println!("   ├─ Values (V): {}", report.values);
            let path: Vec<_> = report.history.iter().map(|s| s.as_str()).collect();
            println!("   └─ States: {}", path.join(" -> "));
        }
        None => println!("\n📈 Reader: no report (reader panicked)"),
    }

    println!("\n🧹 Shutdown");
    println!("   ├─ Residual samples drained: {}", summary.drained.data);
    println!("   ├─ Residual commands drained: {}", summary.drained.command);
    println!("   ├─ Channels clean: {}", summary.channels_clean);
    match settings.sink.kind {
        SinkKind::File => {
            println!("   ├─ Reader context alive: {}", summary.context_alive);
            println!("   └─ Output: {}", settings.sink.output_path().display());
        }
        SinkKind::Log => println!("   └─ Reader context alive: {}", summary.context_alive),
    }

    println!();
}
