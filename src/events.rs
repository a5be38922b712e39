//! UI 事件
//!
//! 所有后端 → UI 的事件名集中定义，避免硬编码字符串散落各模块。

use serde::Serialize;

use crate::device::DeviceListResult;
use crate::pairing::PairingSnapshot;

// === 配对 ===
pub const PAIRING_STATE_CHANGED: &str = "pairing-state-changed";

// === 设备 ===
pub const DEVICES_CHANGED: &str = "devices-changed";

/// 推送给 UI 的事件及其 payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "payload")]
pub enum SyncUiEvent {
    PairingStateChanged(PairingSnapshot),
    DevicesChanged(DeviceListResult),
}

impl SyncUiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncUiEvent::PairingStateChanged(_) => PAIRING_STATE_CHANGED,
            SyncUiEvent::DevicesChanged(_) => DEVICES_CHANGED,
        }
    }
}
