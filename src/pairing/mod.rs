//! 配对模块
//!
//! 同步链的建立与恢复：32 字节密钥 ↔ 16 个单词的口令编解码、
//! 恢复输入的归一化校验，以及设置/恢复/重置向导的状态机。
//! 核心逻辑在 [`PairingStateMachine`](manager::PairingStateMachine)。

pub mod code;
pub mod dictionary;
pub mod manager;
pub mod restore;

pub use code::{decode, encode, DecodeError, Passphrase, Secret};
pub use manager::{
    ChainStatus, PairingEvent, PairingSession, PairingSnapshot, PairingState,
    PairingStateMachine, Transition,
};
pub use restore::{normalize, validate, RestoreInput, ValidationError};
