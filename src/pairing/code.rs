//! 同步口令编解码
//!
//! 32 字节链密钥 ↔ 16 个词典单词。每 2 字节（大端）对应一个单词，
//! 按顺序排列，显示为 4 行、每行 4 个单词。

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::Digest;
use thiserror::Error;

use super::dictionary;

/// 密钥长度（字节）
pub const SECRET_LEN: usize = 32;
/// 口令单词数
pub const WORD_COUNT: usize = SECRET_LEN / 2;
/// 每行显示的单词数
pub const WORDS_PER_LINE: usize = 4;

/// 指纹命名空间前缀，与其他用途的哈希做域分离
const NS_FINGERPRINT: &[u8] = b"/chainsync/fingerprint/";

/// 口令解码错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("同步口令应为 {expected} 个单词，实际为 {actual} 个")]
    WrongWordCount { expected: usize, actual: usize },

    /// `position` 从 0 开始
    #[error("第 {} 个单词无法识别: {word}", .position + 1)]
    UnknownWord { word: String, position: usize },
}

/// 同步链的根密钥
///
/// 只在内存中以副本形式流转，`Debug` 不输出内容，日志中请使用 [`Secret::fingerprint`]。
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// 生成随机密钥
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// 短指纹：SHA256(namespace || secret) 的前 4 字节（hex）
    ///
    /// 可安全写入日志或展示给用户，用于在两台设备间核对是否加入了同一条链。
    pub fn fingerprint(&self) -> String {
        let input = [NS_FINGERPRINT, self.as_bytes().as_slice()].concat();
        let digest = sha2::Sha256::digest(input);
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl TryFrom<&[u8]> for Secret {
    type Error = usize;

    /// 长度不是 32 字节时返回实际长度
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; SECRET_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| bytes.len())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.fingerprint())
    }
}

/// 16 个单词组成的同步口令
///
/// 口令与密钥等价，`Debug` 只输出单词数。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passphrase(Vec<String>);

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase({} words)", self.0.len())
    }
}

impl Passphrase {
    pub fn words(&self) -> &[String] {
        &self.0
    }

    /// 按 4 行 × 4 个单词分组，单词之间以空格分隔
    pub fn lines(&self) -> Vec<String> {
        self.0
            .chunks(WORDS_PER_LINE)
            .map(|line| line.join(" "))
            .collect()
    }
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// 密钥 → 口令
pub fn encode(secret: &Secret) -> Passphrase {
    let words = secret
        .0
        .chunks_exact(2)
        .map(|pair| dictionary::word(u16::from_be_bytes([pair[0], pair[1]])))
        .collect();
    Passphrase(words)
}

/// 口令 → 密钥
///
/// 单词必须已是小写且无首尾空白，归一化见 [`normalize`](super::restore::normalize)。
pub fn decode<S: AsRef<str>>(words: &[S]) -> Result<Secret, DecodeError> {
    if words.len() != WORD_COUNT {
        return Err(DecodeError::WrongWordCount {
            expected: WORD_COUNT,
            actual: words.len(),
        });
    }

    let mut bytes = [0u8; SECRET_LEN];
    for (position, (word, out)) in words.iter().zip(bytes.chunks_exact_mut(2)).enumerate() {
        let word = word.as_ref();
        let value = dictionary::index(word).ok_or_else(|| DecodeError::UnknownWord {
            word: word.to_string(),
            position,
        })?;
        out.copy_from_slice(&value.to_be_bytes());
    }

    Ok(Secret(bytes))
}
