use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{RecordCategory, SettingsStore, SYNC_DEVICE_NAME};
use super::{CategoryStatus, SyncStatus};
use crate::device::{DeviceListResult, DeviceRegistry, OsInfo};
use crate::events::SyncUiEvent;
use crate::pairing::{
    ChainStatus, PairingEvent, PairingSnapshot, PairingState, PairingStateMachine, Passphrase,
    Transition,
};
use crate::protocol::{NotificationReceiver, SyncEngine};
use crate::{AppError, AppResult};

/// UI 事件广播通道容量
const UI_EVENT_CAPACITY: usize = 64;

/// 同步管理器
///
/// 统一管理 [`PairingStateMachine`]、[`DeviceRegistry`] 和 [`SettingsStore`]。
/// 状态机放在异步 Mutex 中，事件逐个处理完毕后才接受下一个，
/// 不会出现交叠的状态转换。
pub struct SyncManager {
    machine: Arc<Mutex<PairingStateMachine>>,
    devices: Arc<DeviceRegistry>,
    settings: Arc<SettingsStore>,
    os_info: OsInfo,
    ui_events: broadcast::Sender<SyncUiEvent>,
}

impl SyncManager {
    pub fn new(
        engine: Arc<dyn SyncEngine>,
        settings: Arc<SettingsStore>,
        os_info: OsInfo,
        status: &ChainStatus,
    ) -> Self {
        let devices = Arc::new(DeviceRegistry::new());
        let machine = PairingStateMachine::new(
            engine,
            devices.clone(),
            settings.clone(),
            os_info.clone(),
            status,
        );
        let (ui_events, _) = broadcast::channel(UI_EVENT_CAPACITY);

        Self {
            machine: Arc::new(Mutex::new(machine)),
            devices,
            settings,
            os_info,
            ui_events,
        }
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// 订阅 UI 事件
    pub fn subscribe(&self) -> broadcast::Receiver<SyncUiEvent> {
        self.ui_events.subscribe()
    }

    /// 分发一个工作流事件，状态或错误信息变化时推送快照
    pub async fn dispatch(&self, event: PairingEvent) -> AppResult<Transition> {
        let mut machine = self.machine.lock().await;
        let result = machine.handle(event);

        let notify = match &result {
            Ok(transition) => transition.changed(),
            Err(AppError::Validation(_)) => true,
            Err(_) => false,
        };
        if notify {
            self.emit(SyncUiEvent::PairingStateChanged(machine.snapshot()));
        }

        result
    }

    fn emit(&self, event: SyncUiEvent) {
        debug!("Emit {}", event.name());
        let _ = self.ui_events.send(event);
    }

    /// 编辑恢复表单的某一格
    pub async fn update_restore_slot(&self, index: usize, text: &str) -> bool {
        self.machine.lock().await.update_restore_slot(index, text)
    }

    pub async fn state(&self) -> PairingState {
        self.machine.lock().await.state().clone()
    }

    pub async fn snapshot(&self) -> PairingSnapshot {
        self.machine.lock().await.snapshot()
    }

    /// 已配对时展示当前链的口令（“添加新设备”），未配对返回 [`AppError::NotPaired`]
    pub async fn chain_passphrase(&self) -> AppResult<Passphrase> {
        self.machine
            .lock()
            .await
            .chain_passphrase()
            .ok_or(AppError::NotPaired)
    }

    pub async fn is_enabled(&self, event: &PairingEvent) -> bool {
        self.machine.lock().await.is_enabled(event)
    }

    pub fn list_devices(&self) -> DeviceListResult {
        let devices = self.devices.list();
        let total = devices.len();
        DeviceListResult { devices, total }
    }

    /// 修改本机设备名，空白名称恢复为平台默认名
    pub fn set_device_name(&self, name: &str) -> AppResult<()> {
        let name = name.trim();
        let name = if name.is_empty() {
            self.os_info
                .default_device_name()
                .ok_or_else(|| AppError::InvariantViolation("设备名不能为空".to_string()))?
        } else {
            name.to_string()
        };
        info!("Sync device name set to {}", name);
        self.settings.set(SYNC_DEVICE_NAME, name)
    }

    /// 开关某类记录的同步，仅在已配对且开启同步时允许
    pub async fn set_category_enabled(
        &self,
        category: RecordCategory,
        enabled: bool,
    ) -> AppResult<()> {
        match self.state().await {
            PairingState::Paired { enabled: true } => {
                self.settings.set(category.setting_key(), enabled)
            }
            PairingState::SetupError { message } => Err(AppError::SetupError(message)),
            state => {
                warn!("Category toggle rejected in {:?}", state);
                Err(AppError::NotPaired)
            }
        }
    }

    /// 当前同步设置页的状态快照
    pub async fn status(&self) -> SyncStatus {
        let state = self.state().await;
        let enabled = matches!(state, PairingState::Paired { enabled: true });
        let categories = if enabled {
            RecordCategory::ALL
                .into_iter()
                .map(|category| CategoryStatus {
                    category,
                    enabled: self.settings.category_enabled(category),
                })
                .collect()
        } else {
            Vec::new()
        };

        SyncStatus {
            state,
            enabled,
            device_name: self.settings.device_name(),
            device_count: self.devices.count(),
            categories,
        }
    }

    /// 启动事件循环，消费同步引擎推送的通知
    pub fn spawn_event_loop(&self, receiver: NotificationReceiver) -> JoinHandle<()> {
        super::spawn_event_loop(receiver, self.shared_refs())
    }

    /// 获取事件循环需要的共享引用
    pub(crate) fn shared_refs(&self) -> SharedSyncRefs {
        SharedSyncRefs {
            machine: self.machine.clone(),
            devices: self.devices.clone(),
            ui_events: self.ui_events.clone(),
        }
    }
}

/// 事件循环使用的共享引用
///
/// 持有与 [`SyncManager`] 相同的 Arc 引用，
/// 供 [`spawn_event_loop`](super::spawn_event_loop) 在独立 tokio task 中更新状态。
pub(crate) struct SharedSyncRefs {
    pub machine: Arc<Mutex<PairingStateMachine>>,
    pub devices: Arc<DeviceRegistry>,
    pub ui_events: broadcast::Sender<SyncUiEvent>,
}

impl SharedSyncRefs {
    pub fn emit(&self, event: SyncUiEvent) {
        debug!("Emit {}", event.name());
        // 没有订阅者时发送失败，直接忽略
        let _ = self.ui_events.send(event);
    }

    pub fn device_list(&self) -> DeviceListResult {
        let devices = self.devices.list();
        let total = devices.len();
        DeviceListResult { devices, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::pairing::{encode, Secret};
    use crate::protocol::{notification_channel, ChannelSyncEngine, EngineCommand, EngineNotification};

    fn manager(status: ChainStatus) -> (SyncManager, crate::protocol::CommandReceiver) {
        let (engine, commands) = ChannelSyncEngine::new();
        let manager = SyncManager::new(
            Arc::new(engine),
            Arc::new(SettingsStore::in_memory()),
            OsInfo::new("linux"),
            &status,
        );
        (manager, commands)
    }

    #[tokio::test]
    async fn dispatch_broadcasts_changed_state() {
        let (manager, _commands) = manager(ChainStatus::fresh());
        let mut events = manager.subscribe();

        manager.dispatch(PairingEvent::StartNewChain).await.unwrap();

        match events.recv().await.unwrap() {
            SyncUiEvent::PairingStateChanged(snapshot) => {
                assert_eq!(snapshot.state, PairingState::ChoosingMethod);
                assert!(snapshot.session_id.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // 无效事件不推送
        manager.dispatch(PairingEvent::ConfirmYes).await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn restore_sends_start_command() {
        let (manager, mut commands) = manager(ChainStatus::fresh());
        let secret = Secret::from_bytes([0x11; 32]);

        manager.dispatch(PairingEvent::EnterExistingCode).await.unwrap();
        manager
            .dispatch(PairingEvent::SubmitRestoreInput {
                fragments: vec![encode(&secret).to_string()],
            })
            .await
            .unwrap();

        assert_eq!(commands.try_recv().unwrap(), EngineCommand::Start(secret));
        assert_eq!(
            manager.state().await,
            PairingState::Paired { enabled: false }
        );
        assert_eq!(
            manager.settings().device_name().as_deref(),
            Some("Linux Laptop")
        );
    }

    #[tokio::test]
    async fn validation_error_is_broadcast() {
        let (manager, _commands) = manager(ChainStatus::fresh());
        manager.dispatch(PairingEvent::EnterExistingCode).await.unwrap();
        let mut events = manager.subscribe();

        let result = manager
            .dispatch(PairingEvent::SubmitRestoreInput {
                fragments: vec!["babab".into()],
            })
            .await;
        assert!(result.is_err());

        match events.recv().await.unwrap() {
            SyncUiEvent::PairingStateChanged(snapshot) => {
                assert_eq!(snapshot.state, PairingState::EnteringChainCode);
                assert!(snapshot.last_error.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn event_loop_applies_devices_and_unlocks_finish() {
        let (manager, _commands) = manager(ChainStatus::fresh());
        let (notify, receiver) = notification_channel();
        let handle = manager.spawn_event_loop(receiver);

        manager.dispatch(PairingEvent::StartNewChain).await.unwrap();
        manager.dispatch(PairingEvent::ChoosePhoneOrTablet).await.unwrap();
        manager.dispatch(PairingEvent::CodeAcknowledged).await.unwrap();
        assert!(!manager.is_enabled(&PairingEvent::Finish).await);

        notify
            .send(EngineNotification::DeviceListUpdated(vec![
                Device::new("0", "Linux Laptop", 100),
                Device::new("1", "Phone", 200),
            ]))
            .unwrap();
        drop(notify);
        handle.await.unwrap();

        assert_eq!(manager.list_devices().total, 2);
        assert_eq!(manager.list_devices().devices[0].name, "Phone");
        assert!(manager.is_enabled(&PairingEvent::Finish).await);

        manager.dispatch(PairingEvent::Finish).await.unwrap();
        let status = manager.status().await;
        assert!(status.enabled);
        assert_eq!(status.device_count, 2);
        assert_eq!(status.categories.len(), 3);
    }

    #[tokio::test]
    async fn event_loop_moves_to_setup_error() {
        let (manager, mut commands) = manager(ChainStatus::fresh());
        let (notify, receiver) = notification_channel();
        let handle = manager.spawn_event_loop(receiver);
        let mut events = manager.subscribe();

        manager.dispatch(PairingEvent::EnterExistingCode).await.unwrap();
        let _ = events.recv().await.unwrap();

        notify
            .send(EngineNotification::SetupErrorReported("no storage".into()))
            .unwrap();
        drop(notify);
        handle.await.unwrap();

        match events.recv().await.unwrap() {
            SyncUiEvent::PairingStateChanged(snapshot) => assert_eq!(
                snapshot.state,
                PairingState::SetupError {
                    message: "no storage".into()
                }
            ),
            other => panic!("unexpected event: {other:?}"),
        }

        manager.dispatch(PairingEvent::Retry).await.unwrap();
        assert_eq!(commands.try_recv().unwrap(), EngineCommand::ReloadExtension);
        assert_eq!(manager.state().await, PairingState::NotSetup);
    }

    #[tokio::test]
    async fn categories_require_enabled_pairing() {
        let (manager, _commands) = manager(ChainStatus::paired());

        let err = manager
            .set_category_enabled(RecordCategory::History, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotPaired));
        assert!(manager.status().await.categories.is_empty());

        manager.dispatch(PairingEvent::ToggleSync).await.unwrap();
        manager
            .set_category_enabled(RecordCategory::History, false)
            .await
            .unwrap();
        assert!(!manager.settings().category_enabled(RecordCategory::History));
    }

    #[tokio::test]
    async fn categories_report_setup_error() {
        let (manager, _commands) = manager(ChainStatus {
            seed_len: 0,
            setup_error: Some("profile locked".into()),
        });

        let err = manager
            .set_category_enabled(RecordCategory::Bookmark, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SetupError(message) if message == "profile locked"));
    }

    #[tokio::test]
    async fn chain_passphrase_after_restore() {
        let (manager, _commands) = manager(ChainStatus::fresh());
        let err = manager.chain_passphrase().await.unwrap_err();
        assert!(matches!(err, AppError::NotPaired));

        let secret = Secret::from_bytes([0x2a; 32]);
        manager.dispatch(PairingEvent::EnterExistingCode).await.unwrap();
        manager
            .dispatch(PairingEvent::SubmitRestoreInput {
                fragments: vec![encode(&secret).to_string()],
            })
            .await
            .unwrap();

        let mut events = manager.subscribe();
        let passphrase = manager.chain_passphrase().await.unwrap();
        assert_eq!(passphrase, encode(&secret));
        assert_eq!(
            manager.state().await,
            PairingState::Paired { enabled: false }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn device_name_falls_back_to_default() {
        let (manager, _commands) = manager(ChainStatus::fresh());

        manager.set_device_name("  Desk  ").unwrap();
        assert_eq!(manager.settings().device_name().as_deref(), Some("Desk"));

        manager.set_device_name("   ").unwrap();
        assert_eq!(
            manager.settings().device_name().as_deref(),
            Some("Linux Laptop")
        );
    }
}
