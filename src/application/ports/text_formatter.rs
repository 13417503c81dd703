//! Text Formatter Port - 合成前文本归一化
//!
//! 注入到播放适配器中，`play` 在发起合成请求前先经此协作者
//! 校验与归一化输入文本

use thiserror::Error;

/// 格式化错误
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("No speakable text after normalization")]
    Empty,

    #[error("Text too long: {actual} chars (max {max})")]
    TooLong { actual: usize, max: usize },
}

/// Text Formatter Port
pub trait TextFormatterPort: Send + Sync {
    /// 归一化原始文本
    ///
    /// 返回可直接提交合成的文本；空文本与超长文本报校验错误
    fn format(&self, raw: &str) -> Result<String, FormatError>;
}
