//! Playback Adapter Port - 播放适配器能力契约
//!
//! 定义一个语音合成后端需要实现的完整能力集，具体实现在
//! infrastructure/adapters/tts 层。事件分发采用固定的事件种类枚举
//! 与按种类的类型化监听器列表，而非字符串事件名。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AdapterType, VoiceDescriptor, VoiceGender};

/// 适配器错误
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No voice selected")]
    NoVoiceSelected,

    #[error("Voice selection not supported by this adapter")]
    VoiceSelectionNotSupported,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Synthesis service error: {0}")]
    Service(String),

    #[error("Playback error: {0}")]
    Playback(String),
}

/// 合成请求标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 监听器标识（用于取消订阅）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// 播放事件种类（订阅 key）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackEventKind {
    Play,
    Pause,
    Resume,
    Stop,
    End,
    Error,
}

impl PlaybackEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEventKind::Play => "play",
            PlaybackEventKind::Pause => "pause",
            PlaybackEventKind::Resume => "resume",
            PlaybackEventKind::Stop => "stop",
            PlaybackEventKind::End => "end",
            PlaybackEventKind::Error => "error",
        }
    }

    /// 全部事件种类（编排服务批量订阅用）
    pub fn all() -> &'static [PlaybackEventKind] {
        &[
            PlaybackEventKind::Play,
            PlaybackEventKind::Pause,
            PlaybackEventKind::Resume,
            PlaybackEventKind::Stop,
            PlaybackEventKind::End,
            PlaybackEventKind::Error,
        ]
    }
}

/// 播放事件
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// 新的合成请求开始播放
    Play { request_id: RequestId },
    /// 已暂停
    Pause,
    /// 已恢复
    Resume,
    /// 已停止
    Stop,
    /// 自然播放完毕
    End,
    /// 播放出错
    Error { message: String },
}

impl PlaybackEvent {
    pub fn kind(&self) -> PlaybackEventKind {
        match self {
            PlaybackEvent::Play { .. } => PlaybackEventKind::Play,
            PlaybackEvent::Pause => PlaybackEventKind::Pause,
            PlaybackEvent::Resume => PlaybackEventKind::Resume,
            PlaybackEvent::Stop => PlaybackEventKind::Stop,
            PlaybackEvent::End => PlaybackEventKind::End,
            PlaybackEvent::Error { .. } => PlaybackEventKind::Error,
        }
    }
}

/// 事件监听器
///
/// 在适配器触发事件的同一调用内按注册顺序同步执行；
/// 监听器 panic 会被捕获并记录，不影响其余监听器
pub type EventListener = Arc<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Playback Adapter Port
///
/// 单个合成后端的能力契约。不变量:
/// - 任意时刻至多一个活动音频句柄；`play` 必须先销毁旧句柄
/// - `pause` / `resume` 在状态不适用时为 no-op，不报错
/// - `destroy` 停止音频、释放已占用的音频资源、清空监听器表
#[async_trait]
pub trait PlaybackAdapterPort: Send + Sync {
    /// 后端类型
    fn adapter_type(&self) -> AdapterType;

    /// 合成并播放一段文本，返回合成请求标识
    ///
    /// 文本先经注入的格式化协作者归一化；随后通过后端专属通道
    /// 发起合成请求，成功后构建唯一的活动音频句柄
    async fn play(&self, text: &str) -> Result<RequestId, AdapterError>;

    /// 暂停播放（未在播放时 no-op）
    fn pause(&self);

    /// 恢复播放（未在暂停时 no-op）
    fn resume(&self);

    /// 停止播放并释放音频句柄（无句柄时 no-op）
    fn stop(&self);

    /// 订阅某种播放事件
    fn subscribe(&self, kind: PlaybackEventKind, listener: EventListener) -> ListenerId;

    /// 取消订阅
    fn unsubscribe(&self, kind: PlaybackEventKind, id: ListenerId);

    /// 获取后端音色目录
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>, AdapterError>;

    /// 是否支持音色选择
    fn supports_voice_selection(&self) -> bool {
        true
    }

    /// 选择音色
    fn set_voice(&self, voice_id: &str) -> Result<(), AdapterError>;

    /// 当前已选音色 ID
    fn selected_voice(&self) -> Option<String>;

    /// 后端原生的按性别过滤（不支持时返回 None，由调用方回退本地过滤）
    fn native_voices_by_gender(&self, _gender: VoiceGender) -> Option<Vec<VoiceDescriptor>> {
        None
    }

    /// 后端原生的当前音色性别查询（不支持或未解析时返回 None）
    fn native_current_voice_gender(&self) -> Option<VoiceGender> {
        None
    }

    /// 外部播放器报告音频自然播放完毕
    fn notify_playback_ended(&self);

    /// 销毁适配器: 停止音频、释放资源、清空监听器
    ///
    /// 资源释放失败按泄漏记录日志，不视为致命错误
    fn destroy(&self);
}
