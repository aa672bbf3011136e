//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DeviceKind, Settings};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    channel: String,
    sample_rate: f64,
    samples_per_read: usize,
    device: String,
    sink: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    channel: settings.acquisition.physical_channel().to_string(),
                    sample_rate: settings.acquisition.sample_rate,
                    samples_per_read: settings.acquisition.samples_per_read,
                    device: format!("{:?}", settings.device.kind),
                    sink: format!("{:?}", settings.sink.kind),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(settings: &Settings) -> Vec<String> {
    let mut warnings = Vec::new();

    let batch_period = settings.acquisition.batch_period();
    if batch_period >= settings.controller.read_timeout() {
        warnings.push(format!(
            "a batch takes {:.0} ms at the nominal rate, which is not below read_timeout_ms ({}); \
             every read will time out",
            batch_period.as_secs_f64() * 1000.0,
            settings.controller.read_timeout_ms
        ));
    }

    if settings.device.kind == DeviceKind::Simulated && !settings.device.realtime {
        warnings.push("device.realtime = false: simulated device runs unthrottled".to_string());
    }

    if settings.device.kind == DeviceKind::Replay && !settings.device.replay_loop {
        warnings.push(
            "device.replay_loop = false: the run faults once the replay file is exhausted"
                .to_string(),
        );
    }

    if let Some(fault) = &settings.device.fault {
        warnings.push(format!(
            "fault injection enabled: {:?} after {} batches",
            fault.kind, fault.after_batches
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Channel: {}", summary.channel);
            println!("  Sample rate: {} Hz", summary.sample_rate);
            println!("  Samples per read: {}", summary.samples_per_read);
            println!("  Device: {}", summary.device);
            println!("  Sink: {}", summary.sink);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
