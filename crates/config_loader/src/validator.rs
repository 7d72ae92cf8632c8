//! 配置校验模块
//!
//! 校验规则：
//! - check_interval_ms > 0, stall_checks >= 1
//! - check_interval_ms * stall_checks <= 24h
//! - fast_grace_ms <= grace_ms
//! - 1 <= max_stages <= 64
//! - 512 <= buffer_size <= 1 MiB
//! - marker 非空，且不含 '|' 或空白字符

use contracts::{ContractError, RuntimeSettings};

/// 管道命令数上限
pub const MAX_STAGES_LIMIT: usize = 64;
/// 传输缓冲区下限
pub const MIN_BUFFER_SIZE: usize = 512;
/// 传输缓冲区上限
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;
/// 停滞窗口上限（毫秒）
pub const MAX_STALL_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// 校验 RuntimeSettings 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(settings: &RuntimeSettings) -> Result<(), ContractError> {
    validate_marker(settings)?;
    validate_watchdog(settings)?;
    validate_teardown(settings)?;
    validate_limits(settings)?;
    Ok(())
}

/// 校验替换标记
fn validate_marker(settings: &RuntimeSettings) -> Result<(), ContractError> {
    let marker = &settings.marker;
    if marker.is_empty() {
        return Err(ContractError::config_validation(
            "marker",
            "marker cannot be empty",
        ));
    }
    if marker.contains('|') || marker.chars().any(char::is_whitespace) {
        return Err(ContractError::config_validation(
            "marker",
            format!("marker '{marker}' must not contain '|' or whitespace"),
        ));
    }
    Ok(())
}

/// 校验看门狗参数
fn validate_watchdog(settings: &RuntimeSettings) -> Result<(), ContractError> {
    let watchdog = &settings.watchdog;
    if watchdog.check_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "watchdog.check_interval_ms",
            "check_interval_ms must be > 0",
        ));
    }
    if watchdog.stall_checks == 0 {
        return Err(ContractError::config_validation(
            "watchdog.stall_checks",
            "stall_checks must be >= 1",
        ));
    }
    let window = watchdog
        .check_interval_ms
        .checked_mul(u64::from(watchdog.stall_checks));
    if !window.is_some_and(|window| window <= MAX_STALL_WINDOW_MS) {
        return Err(ContractError::config_validation(
            "watchdog.check_interval_ms / watchdog.stall_checks",
            format!(
                "check_interval_ms ({}) x stall_checks ({}) must be <= {MAX_STALL_WINDOW_MS}ms",
                watchdog.check_interval_ms, watchdog.stall_checks
            ),
        ));
    }
    Ok(())
}

/// 校验关闭超时
fn validate_teardown(settings: &RuntimeSettings) -> Result<(), ContractError> {
    let teardown = &settings.teardown;
    if teardown.fast_grace_ms > teardown.grace_ms {
        return Err(ContractError::config_validation(
            "teardown.fast_grace_ms / teardown.grace_ms",
            format!(
                "fast_grace_ms ({}) must be <= grace_ms ({})",
                teardown.fast_grace_ms, teardown.grace_ms
            ),
        ));
    }
    Ok(())
}

/// 校验管道规模
fn validate_limits(settings: &RuntimeSettings) -> Result<(), ContractError> {
    let limits = &settings.limits;
    if limits.max_stages == 0 || limits.max_stages > MAX_STAGES_LIMIT {
        return Err(ContractError::config_validation(
            "limits.max_stages",
            format!(
                "max_stages must be in 1..={MAX_STAGES_LIMIT}, got {}",
                limits.max_stages
            ),
        ));
    }
    if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&limits.buffer_size) {
        return Err(ContractError::config_validation(
            "limits.buffer_size",
            format!(
                "buffer_size must be in {MIN_BUFFER_SIZE}..={MAX_BUFFER_SIZE}, got {}",
                limits.buffer_size
            ),
        ));
    }
    Ok(())
}
