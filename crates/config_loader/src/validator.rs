//! 配置校验模块
//!
//! 校验规则：
//! - 采集参数合法 (采样率 > 0，每次读取样本数 > 0，电压范围有序)
//! - 回放设备必须给出 replay_path
//! - 文件输出必须有文件名
//! - 控制器超时与显示频率为正

use contracts::{AcquisitionError, DeviceKind, Settings, SinkKind};

/// 校验 Settings 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(settings: &Settings) -> Result<(), AcquisitionError> {
    settings.acquisition.validate()?;
    validate_device(settings)?;
    validate_sink(settings)?;
    validate_controller(settings)?;
    Ok(())
}

/// 校验设备配置
fn validate_device(settings: &Settings) -> Result<(), AcquisitionError> {
    let device = &settings.device;
    if device.kind == DeviceKind::Replay && device.replay_path.is_none() {
        return Err(AcquisitionError::config(
            "device.replay_path",
            "replay device requires a replay_path",
        ));
    }
    if let Some(fault) = &device.fault {
        if device.kind == DeviceKind::Replay {
            return Err(AcquisitionError::config(
                "device.fault",
                format!(
                    "fault injection ({:?}) is only supported by the simulated device",
                    fault.kind
                ),
            ));
        }
    }
    Ok(())
}

/// 校验输出配置
fn validate_sink(settings: &Settings) -> Result<(), AcquisitionError> {
    if settings.sink.kind == SinkKind::File && settings.sink.file_name.trim().is_empty() {
        return Err(AcquisitionError::config(
            "sink.file_name",
            "file sink requires a file name",
        ));
    }
    Ok(())
}

/// 校验控制器配置
fn validate_controller(settings: &Settings) -> Result<(), AcquisitionError> {
    let controller = &settings.controller;
    if controller.read_timeout_ms == 0 {
        return Err(AcquisitionError::config(
            "controller.read_timeout_ms",
            "read_timeout_ms must be > 0",
        ));
    }
    if let Some(ack_timeout_ms) = controller.ack_timeout_ms {
        if ack_timeout_ms <= controller.read_timeout_ms {
            return Err(AcquisitionError::config(
                "controller.ack_timeout_ms",
                format!(
                    "ack_timeout_ms ({ack_timeout_ms}) must be > read_timeout_ms ({})",
                    controller.read_timeout_ms
                ),
            ));
        }
    }
    if controller.join_timeout_ms == 0 {
        return Err(AcquisitionError::config(
            "controller.join_timeout_ms",
            "join_timeout_ms must be > 0",
        ));
    }
    if !controller.display_rate_hz.is_finite()
        || controller.display_rate_hz <= 0.0
        || controller.display_period().is_none()
    {
        return Err(AcquisitionError::config(
            "controller.display_rate_hz",
            format!(
                "display_rate_hz must be > 0, got {}",
                controller.display_rate_hz
            ),
        ));
    }
    Ok(())
}
