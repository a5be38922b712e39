//! 口令词典
//!
//! 65536 个可读的五字母单词，每个单词对应一个 16 位数值。
//! 单词结构为 `辅音 元音 辅音 元音 辅音`：辅音 16 个（4 bit），元音 4 个（2 bit），
//! 高位在前，共 4 + 2 + 4 + 2 + 4 = 16 bit。
//!
//! 词典是隐式的：单词与序号之间直接计算，不需要随程序分发词表文件，
//! 因而在各个版本之间逐字稳定。

const CONSONANTS: &[u8; 16] = b"bdfghjklmnprstvz";
const VOWELS: &[u8; 4] = b"aiou";

/// 词典大小
pub const DICTIONARY_SIZE: usize = 1 << 16;

/// 单词长度（字节）
pub const WORD_LEN: usize = 5;

/// 序号 → 单词
pub fn word(index: u16) -> String {
    let c0 = CONSONANTS[usize::from(index >> 12)];
    let v0 = VOWELS[usize::from((index >> 10) & 0x3)];
    let c1 = CONSONANTS[usize::from((index >> 6) & 0xf)];
    let v1 = VOWELS[usize::from((index >> 4) & 0x3)];
    let c2 = CONSONANTS[usize::from(index & 0xf)];

    [c0, v0, c1, v1, c2].iter().map(|&b| b as char).collect()
}

/// 单词 → 序号，不在词典中返回 `None`
///
/// 只接受小写形式，大小写归一化由调用方负责。
pub fn index(word: &str) -> Option<u16> {
    let bytes: &[u8; WORD_LEN] = word.as_bytes().try_into().ok()?;

    let c0 = consonant(bytes[0])?;
    let v0 = vowel(bytes[1])?;
    let c1 = consonant(bytes[2])?;
    let v1 = vowel(bytes[3])?;
    let c2 = consonant(bytes[4])?;

    Some(c0 << 12 | v0 << 10 | c1 << 6 | v1 << 4 | c2)
}

/// 单词是否在词典中
pub fn contains(word: &str) -> bool {
    index(word).is_some()
}

fn consonant(b: u8) -> Option<u16> {
    CONSONANTS.iter().position(|&c| c == b).map(|i| i as u16)
}

fn vowel(b: u8) -> Option<u16> {
    VOWELS.iter().position(|&v| v == b).map(|i| i as u16)
}
