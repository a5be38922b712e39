use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use super::{Device, DeviceId};

/// 设备注册表
///
/// 同步链成员的本地只读视图，内容完全来自同步引擎推送的快照，
/// 本身没有增删接口。每次推送整体替换，读者不会看到半新半旧的列表。
///
/// 本身不含 Arc，需要共享时由使用方包裹 `Arc<DeviceRegistry>`。
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用同步引擎推送的快照替换当前列表
    ///
    /// 同一快照中 id 重复时保留最后一条。
    pub fn apply_snapshot(&self, devices: Vec<Device>) {
        let mut by_id: HashMap<DeviceId, Device> = HashMap::with_capacity(devices.len());
        for device in devices {
            by_id.insert(device.id.clone(), device);
        }

        let mut sorted: Vec<Device> = by_id.into_values().collect();
        sorted.sort_by(presentation_order);

        debug!("Device snapshot applied: {} devices", sorted.len());

        *self.devices.write().unwrap_or_else(PoisonError::into_inner) = sorted;
    }

    /// 按最近活跃时间倒序，时间相同按 id 升序
    pub fn list(&self) -> Vec<Device> {
        self.read().clone()
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.read().iter().any(|d| &d.id == id)
    }

    /// 锁中毒时沿用其中的数据，读写两侧看到同一份列表
    fn read(&self) -> RwLockReadGuard<'_, Vec<Device>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 默认展示顺序
fn presentation_order(a: &Device, b: &Device) -> std::cmp::Ordering {
    b.last_record_timestamp
        .cmp(&a.last_record_timestamp)
        .then_with(|| a.id.cmp(&b.id))
}
