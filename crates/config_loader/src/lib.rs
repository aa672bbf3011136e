//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce `Settings`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("daq.toml")).unwrap();
//! println!("Channel: {}", settings.acquisition.physical_channel());
//! ```

mod parser;
mod validator;

pub use contracts::Settings;
pub use parser::ConfigFormat;

use contracts::AcquisitionError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<Settings, AcquisitionError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<Settings, AcquisitionError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate settings built or modified in code (e.g. after CLI overrides)
    pub fn validate(settings: &Settings) -> Result<(), AcquisitionError> {
        validator::validate(settings)
    }

    /// Serialize Settings to TOML string
    pub fn to_toml(settings: &Settings) -> Result<String, AcquisitionError> {
        toml::to_string_pretty(settings)
            .map_err(|e| AcquisitionError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize Settings to JSON string
    pub fn to_json(settings: &Settings) -> Result<String, AcquisitionError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| AcquisitionError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, AcquisitionError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            AcquisitionError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            AcquisitionError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, AcquisitionError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<Settings, AcquisitionError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Waveform;

    const BENCH_TOML: &str = r#"
[acquisition]
sample_clock_source = "OnboardClock"
sample_rate = 60.0
samples_per_read = 30
device_name = "PXI1Slot2"
channel = 0
min_voltage = -5.0
max_voltage = 5.0

[device]
waveform = { type = "sine", frequency_hz = 0.5, amplitude = 4.0 }

[sink]
directory = "captures"
file_name = "Output_Data.csv"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(BENCH_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let settings = result.unwrap();
        assert_eq!(
            settings.acquisition.physical_channel().to_string(),
            "PXI1Slot2/ai0"
        );
        assert_eq!(
            settings.sink.output_path(),
            Path::new("captures").join("Output_Data.csv")
        );
    }

    #[test]
    fn test_round_trip_toml() {
        let settings = ConfigLoader::load_from_str(BENCH_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&settings).unwrap();
        let reloaded = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(settings, reloaded);
    }

    #[test]
    fn test_round_trip_json() {
        let settings = ConfigLoader::load_from_str(BENCH_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&settings).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert!(matches!(
            reloaded.device.waveform,
            Waveform::Sine { amplitude, .. } if amplitude == 4.0
        ));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = "[acquisition]\nmin_voltage = 5.0\nmax_voltage = -5.0\n";
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, AcquisitionError::Config { .. }));
        assert!(err.to_string().contains("min_voltage"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daq.json");
        std::fs::write(&path, r#"{ "controller": { "display_rate_hz": 30.0 } }"#).unwrap();

        let settings = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(settings.controller.display_rate_hz, 30.0);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::load_from_path(Path::new("daq.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/daq.toml")).unwrap_err();
        assert!(matches!(err, AcquisitionError::Io(_)));
    }
}
