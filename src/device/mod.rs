//! 设备模块
//!
//! 管理本机 OS 信息和同步链中的设备列表。
//! [`DeviceRegistry`] 保存同步引擎最近一次推送的设备快照。

pub mod manager;
mod utils;

pub use manager::DeviceRegistry;
pub use utils::os_display_name;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 本机操作系统信息
///
/// 由调用方注入，状态机本身不读取全局平台信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// 平台标识，如 `linux`、`macos`、`windows`、`darwin`、`win32`
    pub platform: String,
}

impl Default for OsInfo {
    fn default() -> Self {
        Self::current()
    }
}

impl OsInfo {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    /// 当前编译目标的平台
    pub fn current() -> Self {
        Self::new(std::env::consts::OS)
    }

    /// 默认设备名，例如 `Linux Laptop`；平台未知时返回 `None`
    pub fn default_device_name(&self) -> Option<String> {
        if self.platform.trim().is_empty() {
            return None;
        }
        Some(format!("{} Laptop", os_display_name(&self.platform)))
    }
}

/// 链内唯一的设备标识
///
/// 排序规则：两者都是十进制整数时按数值比较，数字 id 排在非数字 id 之前，
/// 其余按字典序。数值相同但文本不同（如 `01` 与 `1`）时再按字典序区分。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for DeviceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for DeviceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// 同步链中的一台设备（只读，由同步引擎创建）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// 最近一条记录的时间（Unix 毫秒）
    pub last_record_timestamp: i64,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, last_record_timestamp: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            last_record_timestamp,
        }
    }

    /// 最近活跃时间，时间戳超出可表示范围时返回 `None`
    pub fn last_active(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_record_timestamp)
    }
}

/// 设备列表查询结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResult {
    pub devices: Vec<Device>,
    pub total: usize,
}
