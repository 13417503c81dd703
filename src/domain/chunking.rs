//! Document Chunking - 文档文本分块
//!
//! 将抽取出的原始文档文本切分为带结构角色的分块，
//! 供编排服务拼接后提交给语音合成

use serde::{Deserialize, Serialize};

/// 默认最小分块字符数
/// 未达到此限制时，同段落内的短句会被合并
pub const DEFAULT_MIN_CHUNK_CHARS: usize = 20;

/// 默认最大分块字符数
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 500;

/// 分块的结构角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// 标题（朗读时补句末标点以保留停顿）
    Heading,
    /// 正文段落
    Paragraph,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Heading => "heading",
            ElementKind::Paragraph => "paragraph",
        }
    }
}

/// 分块配置
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 最小分块字符数（用于合并段内短句）
    pub min_chunk_chars: usize,
    /// 最大分块字符数（超长段落按句末标点截断）
    pub max_chunk_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: DEFAULT_MIN_CHUNK_CHARS,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

/// 句末标点（总是允许截断）
#[inline]
fn is_strong_delimiter(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！' | '.' | '?' | '!')
}

/// 行是否为标题
///
/// 判定规则:
/// - Markdown 风格 `#` 前缀
/// - 短行（字符数 <= 40）且不以句末标点结尾
fn is_heading_line(line: &str) -> bool {
    if line.starts_with('#') {
        return true;
    }
    let char_count = line.chars().count();
    char_count <= 40
        && !line
            .chars()
            .last()
            .map(is_strong_delimiter)
            .unwrap_or(false)
        && !line.ends_with(',')
        && !line.ends_with('，')
}

/// 去除标题前缀标记
fn strip_heading_marker(line: &str) -> &str {
    line.trim_start_matches('#').trim()
}

/// 将超长段落按句末标点截断为不超过 max_chars 的片段
fn split_long_paragraph(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut char_count = 0;

    for ch in text.chars() {
        current.push(ch);
        char_count += 1;

        if is_strong_delimiter(ch) && char_count >= max_chars {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                pieces.push(trimmed);
            }
            current.clear();
            char_count = 0;
        }
    }

    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        pieces.push(trimmed);
    }

    pieces
}

/// 合并短片段直到满足 min_chars
fn merge_until_min_chars(pieces: Vec<String>, min_chars: usize) -> Vec<String> {
    if pieces.is_empty() {
        return pieces;
    }

    let mut result: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for piece in pieces {
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&piece);

        if buffer.chars().count() >= min_chars {
            result.push(std::mem::take(&mut buffer));
        }
    }

    if !buffer.is_empty() {
        if let Some(last) = result.last_mut() {
            last.push(' ');
            last.push_str(&buffer);
        } else {
            result.push(buffer);
        }
    }

    result
}

/// 将文档文本分块
///
/// 分块策略:
/// 1. 按行分割，过滤空行
/// 2. 标题行单独成块（Heading）
/// 3. 正文行按 max_chars 截断、按 min_chars 合并（Paragraph）
///
/// 标题不参与正文合并，跨行短段落也不合并（保留原文停顿结构）。
pub fn split_into_chunks(text: &str, config: &ChunkConfig) -> Vec<(ElementKind, String)> {
    let mut chunks: Vec<(ElementKind, String)> = Vec::new();

    let lines: Vec<&str> = text
        .lines()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    for line in lines {
        if is_heading_line(line) {
            let content = strip_heading_marker(line);
            if !content.is_empty() {
                chunks.push((ElementKind::Heading, content.to_string()));
            }
            continue;
        }

        let pieces = split_long_paragraph(line, config.max_chunk_chars);
        let merged = merge_until_min_chars(pieces, config.min_chunk_chars);
        for piece in merged {
            chunks.push((ElementKind::Paragraph, piece));
        }
    }

    chunks
}
