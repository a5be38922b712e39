//! 恢复口令校验
//!
//! 把用户输入的原始片段归一化后交给 [`decode`](super::code::decode)。
//! 支持整段粘贴：任意片段内的空白或逗号都会拆分成多个单词，
//! 拆分发生在单词数校验之前。

use serde::Serialize;
use thiserror::Error;

use super::code::{self, DecodeError, Secret, WORD_COUNT};

/// 恢复口令校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("请输入同步口令")]
    EmptyInput,

    #[error("无效的同步口令: {0}")]
    InvalidPassphrase(#[from] DecodeError),
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// 拆分、去空白、转小写，丢弃空片段
pub fn normalize<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|fragment| fragment.as_ref().split(is_separator))
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// 校验原始输入并解码为密钥，要么 16 个单词全部有效，要么整体失败
pub fn validate<S: AsRef<str>>(raw: &[S]) -> Result<Secret, ValidationError> {
    let words = normalize(raw);
    if words.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    Ok(code::decode(&words)?)
}

/// 恢复表单的 16 格输入缓冲
///
/// 只保存原始文本用于回显，不做逐词校验。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreInput {
    slots: [String; WORD_COUNT],
}

impl RestoreInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新第 `index` 格
    ///
    /// 文本包含空白时视为整段粘贴：按空格/逗号拆分后从第 0 格开始依次填入，
    /// 超出 16 个的部分丢弃。越界的 `index` 被忽略。
    pub fn set_slot(&mut self, index: usize, text: &str) {
        if text.chars().any(char::is_whitespace) {
            let pieces = text.split(is_separator).filter(|p| !p.is_empty());
            for (slot, piece) in self.slots.iter_mut().zip(pieces) {
                *slot = piece.to_string();
            }
        } else if let Some(slot) = self.slots.get_mut(index) {
            *slot = text.to_string();
        }
    }

    /// 任意一格非空即可提交
    pub fn is_submittable(&self) -> bool {
        self.slots.iter().any(|s| !s.trim().is_empty())
    }

    pub fn fragments(&self) -> &[String] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// 用提交的原始片段覆盖缓冲，保留用户输入的大小写和分隔符
    ///
    /// 片段多于 16 个时，多出的部分以空格拼到最后一格，归一化结果不变。
    pub(crate) fn fill_from<S: AsRef<str>>(&mut self, raw: &[S]) {
        self.clear();
        let (head, tail) = raw.split_at(raw.len().min(WORD_COUNT - 1));
        for (slot, fragment) in self.slots.iter_mut().zip(head) {
            *slot = fragment.as_ref().to_string();
        }
        if !tail.is_empty() {
            let rest: Vec<&str> = tail.iter().map(AsRef::as_ref).collect();
            self.slots[head.len()] = rest.join(" ");
        }
    }
}
