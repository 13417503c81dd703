//! 应用层错误定义
//!
//! 统一的朗读编排错误分类。跨组件边界不抛错——适配器 / 音色 / 快捷键
//! 层的错误在源头捕获，转为字符串消息通过状态流 / 音色流对外暴露，
//! 只有显式校验调用会同步返回给直接调用方。

use thiserror::Error;

use crate::application::ports::{AdapterError, TextSourceError};

/// 朗读编排错误
#[derive(Debug, Error)]
pub enum SpeechError {
    /// 校验错误（未选择音色、无可朗读文本等）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 当前后端缺少所需能力
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// 供应商不可达 / HTTP 失败
    #[error("Network error: {0}")]
    Network(String),

    /// 音频播放失败
    #[error("Playback error: {0}")]
    Playback(String),

    /// 非预期错误
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SpeechError {
    /// 创建校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建能力缺失错误
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// 创建网络错误
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// 创建播放错误
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// 创建未知错误
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }
}

impl From<AdapterError> for SpeechError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Validation(m) => Self::Validation(m),
            AdapterError::NoVoiceSelected => Self::Validation(err.to_string()),
            AdapterError::VoiceSelectionNotSupported => Self::NotSupported(err.to_string()),
            AdapterError::Network(m) => Self::Network(m),
            AdapterError::Service(m) => Self::Network(m),
            AdapterError::Playback(m) => Self::Playback(m),
        }
    }
}

impl From<TextSourceError> for SpeechError {
    fn from(err: TextSourceError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// 将 panic payload 转为可读消息
///
/// 用于监听器 / 快捷键动作的防护调用，吞掉 panic 并记录日志
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_classification() {
        let e: SpeechError = AdapterError::Network("connection refused".into()).into();
        assert!(matches!(e, SpeechError::Network(_)));

        let e: SpeechError = AdapterError::NoVoiceSelected.into();
        assert!(matches!(e, SpeechError::Validation(_)));

        let e: SpeechError = AdapterError::VoiceSelectionNotSupported.into();
        assert!(matches!(e, SpeechError::NotSupported(_)));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaput"));
        assert_eq!(panic_message(payload.as_ref()), "kaput");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
