//! 管道运行指标
//!
//! 通过 `metrics` facade 记录；未安装 recorder 时所有调用均为空操作。

use contracts::StageKind;
use metrics::{counter, gauge};

/// 记录一次 mover 转发
///
/// 每次成功写出非空数据块后调用。
pub fn record_mover_forward(stage: usize, bytes: usize) {
    let stage = stage.to_string();
    counter!("sockwrap_mover_bytes_total", "stage" => stage.clone()).increment(bytes as u64);
    counter!("sockwrap_mover_forwards_total", "stage" => stage).increment(1);
}

/// 记录阶段结束
pub fn record_stage_completion(stage: usize, kind: StageKind, clean: bool) {
    let kind = match kind {
        StageKind::Mover => "mover",
        StageKind::Process => "process",
    };
    let status = if clean { "clean" } else { "failure" };
    counter!(
        "sockwrap_stage_completions_total",
        "stage" => stage.to_string(),
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

/// 记录看门狗判定的停滞
pub fn record_stall(idle_ms: u64) {
    counter!("sockwrap_stalls_total").increment(1);
    gauge!("sockwrap_stall_idle_ms").set(idle_ms as f64);
}

/// 记录被强制终止的子进程
pub fn record_process_killed(stage: usize) {
    counter!("sockwrap_processes_killed_total", "stage" => stage.to_string()).increment(1);
}

/// 记录当前运行中的阶段数
pub fn record_active_stages(count: usize) {
    gauge!("sockwrap_active_stages").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_mover_forward(0, 8192);
        record_stage_completion(1, StageKind::Process, false);
        record_stall(10_000);
        record_process_killed(2);
        record_active_stages(3);
    }
}
