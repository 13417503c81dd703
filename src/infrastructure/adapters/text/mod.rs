//! Text Adapters - 文本源与格式化实现
//!
//! FileTextSource 从本地文件抽取文本并按领域分块规则切分；
//! DefaultTextFormatter 做合成前的空白归一化与长度校验。

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{
    FormatError, TextChunk, TextFormatterPort, TextSourcePort, TextSourceError,
};
use crate::domain::{split_into_chunks, ChunkConfig};

/// 基于本地文件的文本源
pub struct FileTextSource {
    path: PathBuf,
    chunking: ChunkConfig,
}

impl FileTextSource {
    pub fn new(path: impl Into<PathBuf>, chunking: ChunkConfig) -> Self {
        Self {
            path: path.into(),
            chunking,
        }
    }
}

#[async_trait]
impl TextSourcePort for FileTextSource {
    async fn extract_chunks(&self) -> Result<Vec<TextChunk>, TextSourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TextSourceError::Io(format!("{}: {}", self.path.display(), e)))?;

        let chunks = split_into_chunks(&raw, &self.chunking)
            .into_iter()
            .map(|(kind, text)| TextChunk::new(text, kind))
            .collect::<Vec<_>>();

        tracing::debug!(
            path = %self.path.display(),
            chunks = chunks.len(),
            "text source extracted"
        );
        Ok(chunks)
    }
}

/// 默认文本格式化器
///
/// 折叠连续空白、裁剪首尾，并校验归一化后的长度上限
pub struct DefaultTextFormatter {
    max_chars: usize,
}

impl DefaultTextFormatter {
    pub const DEFAULT_MAX_CHARS: usize = 4096;

    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn shared(max_chars: usize) -> Arc<dyn TextFormatterPort> {
        Arc::new(Self::new(max_chars))
    }
}

impl Default for DefaultTextFormatter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CHARS)
    }
}

impl TextFormatterPort for DefaultTextFormatter {
    fn format(&self, raw: &str) -> Result<String, FormatError> {
        let mut normalized = String::with_capacity(raw.len());
        let mut last_was_space = false;
        for ch in raw.trim().chars() {
            if ch.is_whitespace() {
                // 换行保留为分句边界，其余空白折叠为单个空格
                if !last_was_space {
                    normalized.push(if ch == '\n' { '\n' } else { ' ' });
                    last_was_space = true;
                }
            } else {
                normalized.push(ch);
                last_was_space = false;
            }
        }

        if normalized.is_empty() {
            return Err(FormatError::Empty);
        }
        let actual = normalized.chars().count();
        if actual > self.max_chars {
            return Err(FormatError::TooLong {
                actual,
                max: self.max_chars,
            });
        }
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::domain::ElementKind;

    #[tokio::test]
    async fn test_file_source_extracts_chunks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "第一章 风雪夜").unwrap();
        writeln!(file, "他推开门，外面是漫天的风雪。屋檐下的灯笼早就熄了。").unwrap();
        file.flush().unwrap();

        let source = FileTextSource::new(file.path(), ChunkConfig::default());
        let chunks = source.extract_chunks().await.unwrap();

        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].kind, ElementKind::Heading);
        assert!(chunks[0].text.contains("第一章"));
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_io_error() {
        let source = FileTextSource::new("/nonexistent/novel.txt", ChunkConfig::default());
        let result = source.extract_chunks().await;
        assert!(matches!(result, Err(TextSourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_file_source_empty_file_yields_no_chunks() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = FileTextSource::new(file.path(), ChunkConfig::default());
        let chunks = source.extract_chunks().await.unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_formatter_collapses_whitespace() {
        let formatter = DefaultTextFormatter::default();
        let out = formatter.format("  hello   world\t\tagain  ").unwrap();
        assert_eq!(out, "hello world again");
    }

    #[test]
    fn test_formatter_rejects_blank_input() {
        let formatter = DefaultTextFormatter::default();
        assert!(matches!(formatter.format("   \n\t "), Err(FormatError::Empty)));
    }

    #[test]
    fn test_formatter_enforces_length_limit() {
        let formatter = DefaultTextFormatter::new(10);
        let result = formatter.format("0123456789A");
        assert!(matches!(
            result,
            Err(FormatError::TooLong { actual: 11, max: 10 })
        ));
    }
}
