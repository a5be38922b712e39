//! 与同步引擎之间的协议类型
//!
//! 同步引擎（真正负责记录同步的传输层）不在本 crate 内，
//! 这里只定义双方之间的命令、通知和 [`SyncEngine`] 边界。
//! 所有命令都是发出即返回，不等待引擎确认。

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::device::Device;
use crate::pairing::code::Secret;

/// 本 crate 调用的同步引擎能力
pub trait SyncEngine: Send + Sync {
    /// 为新链生成 32 字节密钥，引擎持有原件，返回副本用于展示
    fn generate_secret(&self) -> Secret;

    /// 以给定密钥开始同步
    fn start(&self, secret: Secret);

    /// 清除密钥和设备列表并停止同步
    fn reset(&self);

    /// 初始化出错后重启同步子系统
    fn reload_extension(&self);

    /// 当前链密钥的副本，未加入任何链时为 `None`
    fn current_secret(&self) -> Option<Secret>;
}

/// 发往同步引擎的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// 新链的密钥已生成，由引擎保管
    Seed(Secret),
    Start(Secret),
    Reset,
    ReloadExtension,
}

/// 同步引擎推送的通知
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum EngineNotification {
    DeviceListUpdated(Vec<Device>),
    SetupErrorReported(String),
}

/// 基于 mpsc 通道的 [`SyncEngine`] 实现
///
/// 密钥在本地随机生成后立即通过 [`EngineCommand::Seed`] 交给引擎。
/// 通道关闭时命令被丢弃并记录警告，状态机不因此阻塞。
/// 最近一次交给引擎的密钥保留一份副本，`reset` 时清除。
#[derive(Debug, Clone)]
pub struct ChannelSyncEngine {
    commands: mpsc::UnboundedSender<EngineCommand>,
    secret: Arc<Mutex<Option<Secret>>>,
}

/// 引擎侧接收命令的一端
pub type CommandReceiver = mpsc::UnboundedReceiver<EngineCommand>;

/// 引擎侧推送通知的一端
pub type NotificationSender = mpsc::UnboundedSender<EngineNotification>;

/// 本 crate 接收通知的一端
pub type NotificationReceiver = mpsc::UnboundedReceiver<EngineNotification>;

impl ChannelSyncEngine {
    pub fn new() -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            commands: tx,
            secret: Arc::new(Mutex::new(None)),
        };
        (engine, rx)
    }

    /// 宿主启动时已有链密钥（从引擎存储中读出）
    pub fn with_secret(secret: Secret) -> (Self, CommandReceiver) {
        let (engine, rx) = Self::new();
        engine.remember(Some(secret));
        (engine, rx)
    }

    fn remember(&self, secret: Option<Secret>) {
        *self.secret.lock().unwrap_or_else(PoisonError::into_inner) = secret;
    }

    fn send(&self, command: EngineCommand) {
        debug!("Engine command: {:?}", command);
        if self.commands.send(command).is_err() {
            warn!("Sync engine command channel closed, command dropped");
        }
    }
}

impl SyncEngine for ChannelSyncEngine {
    fn generate_secret(&self) -> Secret {
        let secret = Secret::generate();
        self.remember(Some(secret.clone()));
        self.send(EngineCommand::Seed(secret.clone()));
        secret
    }

    fn start(&self, secret: Secret) {
        self.remember(Some(secret.clone()));
        self.send(EngineCommand::Start(secret));
    }

    fn reset(&self) {
        self.remember(None);
        self.send(EngineCommand::Reset);
    }

    fn reload_extension(&self) {
        self.send(EngineCommand::ReloadExtension);
    }

    fn current_secret(&self) -> Option<Secret> {
        self.secret
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// 创建通知通道
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::unbounded_channel()
}
