//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{DeviceKind, Settings, SinkKind, Waveform};
use tracing::info;

use super::load_settings;
use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!("Loading configuration info");

    let settings = load_settings(args.config.as_deref())?;

    if args.json {
        let json = ConfigLoader::to_json(&settings).context("Failed to serialize config info")?;
        println!("{json}");
    } else if args.toml {
        let toml = ConfigLoader::to_toml(&settings).context("Failed to serialize config info")?;
        println!("{toml}");
    } else {
        print_config_info(&settings);
    }

    Ok(())
}

fn describe_waveform(waveform: &Waveform) -> String {
    match waveform {
        Waveform::Sine {
            frequency_hz,
            amplitude,
            offset,
        } => format!("sine {frequency_hz} Hz, {amplitude} V amplitude, {offset} V offset"),
        Waveform::Constant { value } => format!("constant {value} V"),
        Waveform::Counter { start, step } => format!("counter from {start}, step {step}"),
    }
}

fn print_config_info(settings: &Settings) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  DAQ Reader Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let acquisition = &settings.acquisition;
    println!("📈 Acquisition");
    println!("   ├─ Channel: {}", acquisition.physical_channel());
    println!("   ├─ Clock: {}", acquisition.sample_clock_source);
    println!("   ├─ Sample rate: {} Hz", acquisition.sample_rate);
    println!(
        "   ├─ Samples per read: {} ({:.1} ms per batch)",
        acquisition.samples_per_read,
        acquisition.batch_period().as_secs_f64() * 1000.0
    );
    println!(
        "   ├─ Range: {} V .. {} V",
        acquisition.min_voltage, acquisition.max_voltage
    );
    println!("   └─ Terminal: {}", acquisition.terminal_configuration);

    let device = &settings.device;
    println!("\n🔌 Device");
    match device.kind {
        DeviceKind::Simulated => {
            println!("   ├─ Kind: simulated");
            println!("   ├─ Waveform: {}", describe_waveform(&device.waveform));
            match &device.fault {
                Some(fault) => {
                    println!("   ├─ Paced: {}", device.realtime);
                    println!(
                        "   └─ Fault injection: {:?} after {} batches",
                        fault.kind, fault.after_batches
                    );
                }
                None => println!("   └─ Paced: {}", device.realtime),
            }
        }
        DeviceKind::Replay => {
            println!("   ├─ Kind: replay");
            match &device.replay_path {
                Some(path) => println!("   ├─ File: {}", path.display()),
                None => println!("   ├─ File: (missing)"),
            }
            println!("   ├─ Loop: {}", device.replay_loop);
            println!("   └─ Paced: {}", device.realtime);
        }
    }

    let sink = &settings.sink;
    println!("\n📤 Sink");
    match sink.kind {
        SinkKind::File => {
            println!("   ├─ Kind: file");
            println!("   └─ Path: {}", sink.output_path().display());
        }
        SinkKind::Log => {
            println!("   ├─ Kind: log");
            println!("   └─ Name: {}", sink.file_name);
        }
    }

    let controller = &settings.controller;
    println!("\n⚙️  Controller");
    println!("   ├─ Read timeout: {} ms", controller.read_timeout_ms);
    println!(
        "   ├─ Ack timeout: {} ms",
        controller.ack_timeout().as_millis()
    );
    println!("   ├─ Join timeout: {} ms", controller.join_timeout_ms);
    println!("   ├─ Display rate: {} Hz", controller.display_rate_hz);
    match controller.max_samples_per_tick {
        0 => println!("   └─ Samples per tick: unlimited"),
        max => println!("   └─ Samples per tick: {max}"),
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_waveform() {
        assert_eq!(
            describe_waveform(&Waveform::Constant { value: 1.5 }),
            "constant 1.5 V"
        );
        assert_eq!(
            describe_waveform(&Waveform::Counter {
                start: 0.0,
                step: 2.0
            }),
            "counter from 0, step 2"
        );
    }

    #[test]
    fn test_info_with_defaults_succeeds() {
        let args = InfoArgs {
            config: None,
            json: true,
            toml: false,
        };
        assert!(run_info(&args).is_ok());
    }
}
