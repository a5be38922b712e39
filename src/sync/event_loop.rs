use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::manager::SharedSyncRefs;
use crate::events::SyncUiEvent;
use crate::pairing::PairingEvent;
use crate::protocol::{EngineNotification, NotificationReceiver};

/// 启动事件循环：消费同步引擎的通知，更新设备列表和配对状态后推送 UI 事件
///
/// 通知发送端全部关闭后循环结束。
pub(crate) fn spawn_event_loop(
    mut receiver: NotificationReceiver,
    shared: SharedSyncRefs,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = receiver.recv().await {
            match notification {
                EngineNotification::DeviceListUpdated(devices) => {
                    shared.devices.apply_snapshot(devices);
                    let list = shared.device_list();
                    info!("Device list updated: {} device(s)", list.total);
                    shared.emit(SyncUiEvent::DevicesChanged(list));

                    // 设备数变化会影响“完成”按钮是否可用
                    let snapshot = shared.machine.lock().await.snapshot();
                    shared.emit(SyncUiEvent::PairingStateChanged(snapshot));
                }
                EngineNotification::SetupErrorReported(message) => {
                    let mut machine = shared.machine.lock().await;
                    match machine.handle(PairingEvent::SetupErrorReported { message }) {
                        Ok(transition) if transition.changed() => {
                            shared.emit(SyncUiEvent::PairingStateChanged(machine.snapshot()));
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Failed to apply setup error: {}", e),
                    }
                }
            }
        }
        info!("Sync engine notification channel closed, event loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::device::{Device, OsInfo};
    use crate::pairing::{ChainStatus, PairingState};
    use crate::protocol::{notification_channel, ChannelSyncEngine};
    use crate::sync::config::SettingsStore;
    use crate::sync::SyncManager;

    fn manager() -> SyncManager {
        let (engine, _commands) = ChannelSyncEngine::new();
        SyncManager::new(
            Arc::new(engine),
            Arc::new(SettingsStore::in_memory()),
            OsInfo::new("darwin"),
            &ChainStatus::paired(),
        )
    }

    #[tokio::test]
    async fn device_update_emits_both_events() {
        let manager = manager();
        let mut events = manager.subscribe();
        let (notify, receiver) = notification_channel();
        let handle = spawn_event_loop(receiver, manager.shared_refs());

        notify
            .send(EngineNotification::DeviceListUpdated(vec![Device::new(
                "3", "Mac Laptop", 10,
            )]))
            .unwrap();
        drop(notify);
        handle.await.unwrap();

        match events.recv().await.unwrap() {
            SyncUiEvent::DevicesChanged(list) => {
                assert_eq!(list.total, 1);
                assert_eq!(list.devices[0].name, "Mac Laptop");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match events.recv().await.unwrap() {
            SyncUiEvent::PairingStateChanged(snapshot) => {
                assert_eq!(snapshot.state, PairingState::Paired { enabled: false });
                assert!(!snapshot.can_finish);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn later_snapshot_replaces_earlier() {
        let manager = manager();
        let (notify, receiver) = notification_channel();
        let handle = spawn_event_loop(receiver, manager.shared_refs());

        notify
            .send(EngineNotification::DeviceListUpdated(vec![
                Device::new("0", "A", 1),
                Device::new("1", "B", 2),
            ]))
            .unwrap();
        notify
            .send(EngineNotification::DeviceListUpdated(vec![Device::new(
                "1", "B", 3,
            )]))
            .unwrap();
        drop(notify);
        handle.await.unwrap();

        let list = manager.list_devices();
        assert_eq!(list.total, 1);
        assert_eq!(list.devices[0].last_record_timestamp, 3);
    }

    #[tokio::test]
    async fn repeated_setup_error_emits_once() {
        let manager = manager();
        let mut events = manager.subscribe();
        let (notify, receiver) = notification_channel();
        let handle = spawn_event_loop(receiver, manager.shared_refs());

        for _ in 0..2 {
            notify
                .send(EngineNotification::SetupErrorReported("disk full".into()))
                .unwrap();
        }
        drop(notify);
        handle.await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            SyncUiEvent::PairingStateChanged(_)
        ));
        assert!(events.try_recv().is_err());
        assert_eq!(
            manager.state().await,
            PairingState::SetupError {
                message: "disk full".into()
            }
        );
    }
}
