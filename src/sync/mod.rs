//! 同步模块
//!
//! 管理同步链的运行时状态：设置存储、事件循环和对外的统一入口。
//! [`SyncManager`] 整合 [`PairingStateMachine`](crate::pairing::PairingStateMachine)、
//! [`DeviceRegistry`](crate::device::DeviceRegistry) 和
//! [`SettingsStore`](config::SettingsStore)，对外提供统一的同步管理接口。

pub mod config;
mod event_loop;
mod manager;

pub(crate) use event_loop::spawn_event_loop;
pub use manager::SyncManager;

use serde::Serialize;

use crate::pairing::PairingState;
use config::RecordCategory;

/// 同步设置页的状态快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: PairingState,
    pub enabled: bool,
    pub device_name: Option<String>,
    pub device_count: usize,
    /// 各记录类别是否同步，仅在已配对且开启同步时有意义
    pub categories: Vec<CategoryStatus>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatus {
    pub category: RecordCategory,
    pub enabled: bool,
}
