//! 同步相关设置
//!
//! 键值对以 JSON 对象形式保存，可落盘到文件，也可只存在内存中（测试用）。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::AppResult;

// === 设置键 ===
pub const SYNC_ENABLED: &str = "sync.enabled";
pub const SYNC_DEVICE_NAME: &str = "sync.device-name";
pub const SYNC_TYPE_BOOKMARK: &str = "sync.type.bookmark";
pub const SYNC_TYPE_SITE_SETTING: &str = "sync.type.siteSetting";
pub const SYNC_TYPE_HISTORY: &str = "sync.type.history";

/// 可同步的记录类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordCategory {
    Bookmark,
    SiteSetting,
    History,
}

impl RecordCategory {
    pub const ALL: [RecordCategory; 3] = [
        RecordCategory::Bookmark,
        RecordCategory::SiteSetting,
        RecordCategory::History,
    ];

    pub fn setting_key(self) -> &'static str {
        match self {
            RecordCategory::Bookmark => SYNC_TYPE_BOOKMARK,
            RecordCategory::SiteSetting => SYNC_TYPE_SITE_SETTING,
            RecordCategory::History => SYNC_TYPE_HISTORY,
        }
    }
}

/// 设置存储
///
/// 有 `path` 时每次写入都会整体刷回文件。
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, Value>>,
}

impl SettingsStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    /// 打开设置文件，文件不存在时视为空
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Settings loaded from {}", path.display());

        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> AppResult<()> {
        let value = value.into();
        debug!("Setting {} = {}", key, value);

        // 写锁持有到落盘完成，文件内容始终对应某一次完整写入
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);

        if let Some(path) = &self.path {
            persist(path, &values)?;
        }
        Ok(())
    }

    // === 同步设置的便捷读取 ===

    pub fn sync_enabled(&self) -> bool {
        self.get_bool(SYNC_ENABLED).unwrap_or(false)
    }

    pub fn device_name(&self) -> Option<String> {
        self.get_string(SYNC_DEVICE_NAME)
    }

    /// 记录类别默认开启
    pub fn category_enabled(&self, category: RecordCategory) -> bool {
        self.get_bool(category.setting_key()).unwrap_or(true)
    }
}

/// 先写临时文件再 rename 覆盖，中途失败不会留下半截 JSON
fn persist(path: &Path, values: &BTreeMap<String, Value>) -> AppResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
