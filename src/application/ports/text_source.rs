//! Text Source Port - 文档文本源抽象
//!
//! 由外部协作者（页面渲染 / DOM 抽取层）实现，编排服务只消费
//! 分块结果。空分块列表表示"没有可朗读内容"，不是错误。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ElementKind;

/// 文本源错误
#[derive(Debug, Error)]
pub enum TextSourceError {
    #[error("Text source unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read text source: {0}")]
    Io(String),
}

/// 一个可朗读的文本分块
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// 分块内容
    pub text: String,
    /// 结构角色（标题 / 段落）
    pub kind: ElementKind,
}

impl TextChunk {
    pub fn new(text: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Text Source Port
#[async_trait]
pub trait TextSourcePort: Send + Sync {
    /// 抽取当前文档的全部文本分块
    ///
    /// 允许返回空列表（无可朗读内容）
    async fn extract_chunks(&self) -> Result<Vec<TextChunk>, TextSourceError>;
}
