//! 应用错误处理模块
//!
//! 错误需要实现 Serialize 才能传递给 UI 层（统一为 `{ kind, message }` 格式）

use serde::Serialize;
use thiserror::Error;

use crate::pairing::code::DecodeError;
use crate::pairing::restore::ValidationError;

/// 应用统一错误类型
///
/// 注意：使用 `#[from]` 的变体会存储原始错误类型，
/// 但由于 `std::io::Error` 等不实现 `Serialize`，
/// 通过自定义 Serialize 实现统一转为 `{ kind, message }` 格式。
#[derive(Debug, Error)]
pub enum AppError {
    /// 文件系统错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 恢复口令校验失败（用户可重试）
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 违反工作流不变量，例如设备不足两台时完成配对
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// 同步引擎上报的初始化错误
    #[error("Setup error: {0}")]
    SetupError(String),

    /// 当前未加入同步链
    #[error("Sync chain is not set up")]
    NotPaired,
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Validation(ValidationError::InvalidPassphrase(err))
    }
}

/// 传递给 UI 层的序列化错误格式
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("AppError", 2)?;

        let (kind, message) = match self {
            AppError::Io(e) => ("Io", e.to_string()),
            AppError::Serialization(e) => ("Serialization", e.to_string()),
            AppError::Validation(ValidationError::EmptyInput) => ("EmptyInput", self.to_string()),
            AppError::Validation(ValidationError::InvalidPassphrase(
                DecodeError::WrongWordCount { .. },
            )) => ("WrongWordCount", self.to_string()),
            AppError::Validation(ValidationError::InvalidPassphrase(
                DecodeError::UnknownWord { .. },
            )) => ("UnknownWord", self.to_string()),
            AppError::InvariantViolation(msg) => ("InvariantViolation", msg.clone()),
            AppError::SetupError(msg) => ("SetupError", msg.clone()),
            AppError::NotPaired => ("NotPaired", self.to_string()),
        };

        state.serialize_field("kind", kind)?;
        state.serialize_field("message", &message)?;
        state.end()
    }
}

// ============ 便捷类型别名 ============

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
