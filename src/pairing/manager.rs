use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::code::{encode, Passphrase, SECRET_LEN};
use super::restore::{self, RestoreInput, ValidationError};
use crate::device::{DeviceRegistry, OsInfo};
use crate::protocol::SyncEngine;
use crate::sync::config::{SettingsStore, SYNC_DEVICE_NAME, SYNC_ENABLED};
use crate::{AppError, AppResult};

/// 完成配对所需的最少设备数
pub const MIN_DEVICES_TO_FINISH: usize = 2;

/// 配对工作流的步骤（封闭集合）
///
/// 任意时刻只处于一个步骤，不存在两个设置窗口同时打开的情况。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "step")]
pub enum PairingState {
    NotSetup,
    SetupError { message: String },
    ChoosingMethod,
    AwaitingScan,
    EnteringChainCode,
    ReviewingDeviceList,
    Paired { enabled: bool },
    /// 记住进入确认前的开关状态，取消时原样返回
    ConfirmingReset { enabled: bool },
}

impl PairingState {
    /// 是否处于尚未完成的设置步骤（存在配对会话）
    pub fn is_setup_in_progress(&self) -> bool {
        matches!(
            self,
            PairingState::ChoosingMethod
                | PairingState::AwaitingScan
                | PairingState::EnteringChainCode
                | PairingState::ReviewingDeviceList
        )
    }

    pub fn is_paired(&self) -> bool {
        matches!(
            self,
            PairingState::Paired { .. } | PairingState::ConfirmingReset { .. }
        )
    }
}

/// 工作流事件
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum PairingEvent {
    StartNewChain,
    EnterExistingCode,
    ChoosePhoneOrTablet,
    ChooseComputer,
    NoCameraAvailable,
    CodeAcknowledged,
    Cancel,
    SubmitRestoreInput { fragments: Vec<String> },
    AddAnotherDevice,
    Finish,
    ToggleSync,
    RequestReset,
    ConfirmYes,
    ConfirmNo,
    SetupErrorReported { message: String },
    Retry,
    /// 从任意未完成的设置步骤放弃设置
    AbandonSetup,
}

impl PairingEvent {
    /// 事件名，日志中只记录名字，避免输出用户输入的口令
    pub fn name(&self) -> &'static str {
        match self {
            PairingEvent::StartNewChain => "StartNewChain",
            PairingEvent::EnterExistingCode => "EnterExistingCode",
            PairingEvent::ChoosePhoneOrTablet => "ChoosePhoneOrTablet",
            PairingEvent::ChooseComputer => "ChooseComputer",
            PairingEvent::NoCameraAvailable => "NoCameraAvailable",
            PairingEvent::CodeAcknowledged => "CodeAcknowledged",
            PairingEvent::Cancel => "Cancel",
            PairingEvent::SubmitRestoreInput { .. } => "SubmitRestoreInput",
            PairingEvent::AddAnotherDevice => "AddAnotherDevice",
            PairingEvent::Finish => "Finish",
            PairingEvent::ToggleSync => "ToggleSync",
            PairingEvent::RequestReset => "RequestReset",
            PairingEvent::ConfirmYes => "ConfirmYes",
            PairingEvent::ConfirmNo => "ConfirmNo",
            PairingEvent::SetupErrorReported { .. } => "SetupErrorReported",
            PairingEvent::Retry => "Retry",
            PairingEvent::AbandonSetup => "AbandonSetup",
        }
    }
}

impl std::fmt::Debug for PairingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 启动时从同步引擎读取的链状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainStatus {
    /// 已保存密钥的长度，0 表示没有密钥
    pub seed_len: usize,
    /// 上一次初始化失败的错误信息
    pub setup_error: Option<String>,
}

impl ChainStatus {
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn paired() -> Self {
        Self {
            seed_len: SECRET_LEN,
            setup_error: None,
        }
    }

    /// 初始步骤：有错误 → SetupError；有合法密钥 → Paired；否则 NotSetup
    pub fn initial_state(&self, sync_enabled: bool) -> PairingState {
        match &self.setup_error {
            Some(message) => PairingState::SetupError {
                message: message.clone(),
            },
            None if self.seed_len == SECRET_LEN => PairingState::Paired {
                enabled: sync_enabled,
            },
            None => PairingState::NotSetup,
        }
    }
}

/// 配对会话，仅在设置向导打开期间存在
#[derive(Debug, Clone)]
pub struct PairingSession {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    restore_input: RestoreInput,
    last_error: Option<ValidationError>,
    /// 新链生成后用于展示的口令（只保存口令，不保存密钥）
    display: Option<Passphrase>,
}

impl PairingSession {
    fn open() -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            restore_input: RestoreInput::new(),
            last_error: None,
            display: None,
        }
    }

    pub fn restore_input(&self) -> &RestoreInput {
        &self.restore_input
    }

    pub fn last_error(&self) -> Option<&ValidationError> {
        self.last_error.as_ref()
    }

    pub fn display_passphrase(&self) -> Option<&Passphrase> {
        self.display.as_ref()
    }

    /// 会话已打开多久
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.opened_at
    }
}

/// 一次事件处理的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: PairingState,
    pub to: PairingState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// 供 UI 渲染的工作流快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingSnapshot {
    pub state: PairingState,
    pub session_id: Option<Uuid>,
    /// 4 行口令，仅在新链的展示步骤中存在
    pub passphrase_lines: Option<Vec<String>>,
    pub restore_input: Option<RestoreInput>,
    pub last_error: Option<String>,
    pub can_finish: bool,
}

/// 配对状态机
///
/// 按转换表处理事件，未列出的 (步骤, 事件) 组合不做任何事。
/// 对同步引擎的调用都是发出即返回，状态先行切换，
/// 真实情况由后续的设备列表推送或错误通知校正。
pub struct PairingStateMachine {
    state: PairingState,
    session: Option<PairingSession>,
    engine: Arc<dyn SyncEngine>,
    devices: Arc<DeviceRegistry>,
    settings: Arc<SettingsStore>,
    os_info: OsInfo,
}

impl PairingStateMachine {
    pub fn new(
        engine: Arc<dyn SyncEngine>,
        devices: Arc<DeviceRegistry>,
        settings: Arc<SettingsStore>,
        os_info: OsInfo,
        status: &ChainStatus,
    ) -> Self {
        let state = status.initial_state(settings.sync_enabled());
        info!("Pairing state machine initialized in {:?}", state);
        Self {
            state,
            session: None,
            engine,
            devices,
            settings,
            os_info,
        }
    }

    pub fn state(&self) -> &PairingState {
        &self.state
    }

    pub fn session(&self) -> Option<&PairingSession> {
        self.session.as_ref()
    }

    pub fn last_error(&self) -> Option<&ValidationError> {
        self.session.as_ref().and_then(PairingSession::last_error)
    }

    pub fn display_passphrase(&self) -> Option<&Passphrase> {
        self.session
            .as_ref()
            .and_then(PairingSession::display_passphrase)
    }

    /// 已配对时取当前链的口令，用于再添加一台设备，不改变步骤
    ///
    /// 未配对或引擎中没有密钥时返回 `None`。
    pub fn chain_passphrase(&self) -> Option<Passphrase> {
        if !self.state.is_paired() {
            return None;
        }
        let secret = self.engine.current_secret()?;
        info!("Chain passphrase shown, fingerprint {}", secret.fingerprint());
        Some(encode(&secret))
    }

    /// 设备数是否满足完成配对的条件
    pub fn can_finish(&self) -> bool {
        self.state == PairingState::ReviewingDeviceList
            && self.devices.count() >= MIN_DEVICES_TO_FINISH
    }

    /// 当前步骤是否处理该事件（含守卫），UI 据此禁用按钮
    pub fn is_enabled(&self, event: &PairingEvent) -> bool {
        use PairingEvent as E;
        use PairingState as S;

        match (&self.state, event) {
            (S::ReviewingDeviceList, E::Finish) => self.can_finish(),
            (S::NotSetup, E::StartNewChain | E::EnterExistingCode)
            | (S::ChoosingMethod, E::ChoosePhoneOrTablet | E::ChooseComputer)
            | (S::AwaitingScan, E::NoCameraAvailable | E::Cancel | E::CodeAcknowledged)
            | (S::EnteringChainCode, E::Cancel | E::SubmitRestoreInput { .. })
            | (S::ReviewingDeviceList, E::AddAnotherDevice | E::Cancel)
            | (S::Paired { .. }, E::ToggleSync | E::RequestReset)
            | (S::ConfirmingReset { .. }, E::ConfirmYes | E::ConfirmNo)
            | (S::SetupError { .. }, E::Retry)
            | (_, E::SetupErrorReported { .. }) => true,
            (state, E::AbandonSetup) => state.is_setup_in_progress(),
            _ => false,
        }
    }

    /// 处理一个事件
    ///
    /// - 口令校验失败：步骤不变，错误记录在会话中并返回 [`AppError::Validation`]
    /// - 设备不足时完成配对：步骤不变，返回 [`AppError::InvariantViolation`]
    pub fn handle(&mut self, event: PairingEvent) -> AppResult<Transition> {
        use PairingEvent as E;
        use PairingState as S;

        let from = self.state.clone();
        let name = event.name();

        match (from.clone(), event) {
            (S::NotSetup, E::StartNewChain) => {
                self.apply_default_device_name()?;
                let secret = self.engine.generate_secret();
                info!("New sync chain created, fingerprint {}", secret.fingerprint());

                let mut session = PairingSession::open();
                session.display = Some(encode(&secret));
                self.open_session(session);
                self.state = S::ChoosingMethod;
            }
            (S::NotSetup, E::EnterExistingCode) => {
                self.open_session(PairingSession::open());
                self.state = S::EnteringChainCode;
            }

            (S::ChoosingMethod, E::ChoosePhoneOrTablet) => {
                self.ensure_display_passphrase();
                self.state = S::AwaitingScan;
            }
            (S::ChoosingMethod, E::ChooseComputer) => self.state = S::EnteringChainCode,

            (S::AwaitingScan, E::NoCameraAvailable) => self.state = S::EnteringChainCode,
            (S::AwaitingScan, E::Cancel) => self.state = S::ChoosingMethod,
            (S::AwaitingScan, E::CodeAcknowledged) => self.state = S::ReviewingDeviceList,

            (S::EnteringChainCode, E::Cancel) => self.state = S::ChoosingMethod,
            (S::EnteringChainCode, E::SubmitRestoreInput { fragments }) => {
                self.submit_restore_input(&fragments)?;
            }

            (S::ReviewingDeviceList, E::AddAnotherDevice) => self.state = S::ChoosingMethod,
            // 设置未完成，无需确认直接重置
            (S::ReviewingDeviceList, E::Cancel) => self.abandon_setup(),
            (S::ReviewingDeviceList, E::Finish) => {
                let count = self.devices.count();
                if count < MIN_DEVICES_TO_FINISH {
                    warn!("Finish rejected: only {} device(s) in chain", count);
                    return Err(AppError::InvariantViolation(format!(
                        "至少需要 {MIN_DEVICES_TO_FINISH} 台设备才能完成配对，当前 {count} 台"
                    )));
                }
                self.settings.set(SYNC_ENABLED, true)?;
                self.engine.reload_extension();
                self.close_session();
                self.state = S::Paired { enabled: true };
            }

            (S::Paired { enabled }, E::ToggleSync) => {
                self.settings.set(SYNC_ENABLED, !enabled)?;
                self.engine.reload_extension();
                self.state = S::Paired { enabled: !enabled };
            }
            (S::Paired { enabled }, E::RequestReset) => {
                self.state = S::ConfirmingReset { enabled };
            }

            (S::ConfirmingReset { .. }, E::ConfirmYes) => {
                self.settings.set(SYNC_ENABLED, false)?;
                self.engine.reset();
                self.state = S::NotSetup;
            }
            (S::ConfirmingReset { enabled }, E::ConfirmNo) => {
                self.state = S::Paired { enabled };
            }

            (_, E::SetupErrorReported { message }) => {
                warn!("Sync setup error reported: {}", message);
                self.close_session();
                self.state = S::SetupError { message };
            }
            (S::SetupError { .. }, E::Retry) => {
                self.engine.reload_extension();
                self.state = S::NotSetup;
            }

            (state, E::AbandonSetup) if state.is_setup_in_progress() => self.abandon_setup(),

            (state, _) => {
                debug!("Event {} ignored in {:?}", name, state);
            }
        }

        let transition = Transition {
            from,
            to: self.state.clone(),
        };
        if transition.changed() {
            info!(
                "Pairing transition {:?} --{}--> {:?}",
                transition.from, name, transition.to
            );
        }
        Ok(transition)
    }

    /// 编辑恢复表单的某一格，仅在输入口令步骤中生效
    pub fn update_restore_slot(&mut self, index: usize, text: &str) -> bool {
        if self.state != PairingState::EnteringChainCode {
            return false;
        }
        match self.session.as_mut() {
            Some(session) => {
                session.restore_input.set_slot(index, text);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> PairingSnapshot {
        let session = self.session.as_ref();
        let showing_code = matches!(
            self.state,
            PairingState::AwaitingScan | PairingState::EnteringChainCode
        );

        PairingSnapshot {
            state: self.state.clone(),
            session_id: session.map(|s| s.id),
            passphrase_lines: session
                .and_then(|s| s.display.as_ref())
                .filter(|_| showing_code)
                .map(Passphrase::lines),
            restore_input: session
                .filter(|_| self.state == PairingState::EnteringChainCode)
                .map(|s| s.restore_input.clone()),
            last_error: self.last_error().map(ToString::to_string),
            can_finish: self.can_finish(),
        }
    }

    fn submit_restore_input(&mut self, fragments: &[String]) -> AppResult<()> {
        let result = restore::validate(fragments);

        if let Some(session) = self.session.as_mut() {
            session.restore_input.fill_from(fragments);
            session.last_error = result.as_ref().err().cloned();
        }

        match result {
            Ok(secret) => {
                info!("Restore code accepted, fingerprint {}", secret.fingerprint());
                self.apply_default_device_name()?;
                self.settings.set(SYNC_ENABLED, false)?;
                self.engine.start(secret);
                self.close_session();
                self.state = PairingState::Paired { enabled: false };
                Ok(())
            }
            Err(e) => {
                warn!("Restore code rejected: {}", e);
                Err(e.into())
            }
        }
    }

    /// 放弃设置：重置引擎并丢弃会话，避免半输入的密钥被当作有效
    fn abandon_setup(&mut self) {
        self.engine.reset();
        self.close_session();
        self.state = PairingState::NotSetup;
    }

    fn open_session(&mut self, session: PairingSession) {
        debug!("Pairing session {} opened", session.id);
        self.session = Some(session);
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(
                "Pairing session {} closed after {}s",
                session.id,
                session.age().num_seconds()
            );
        }
    }

    /// 扫码步骤需要展示口令，从“输入口令”返回后会话中可能还没有
    fn ensure_display_passphrase(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.display.is_none() {
            let secret = self.engine.generate_secret();
            info!("Sync chain secret generated for display, fingerprint {}", secret.fingerprint());
            session.display = Some(encode(&secret));
        }
    }

    /// 未设置设备名时写入平台默认名
    fn apply_default_device_name(&self) -> AppResult<()> {
        if self.settings.device_name().is_some() {
            return Ok(());
        }
        if let Some(name) = self.os_info.default_device_name() {
            self.settings.set(SYNC_DEVICE_NAME, name)?;
        }
        Ok(())
    }
}
