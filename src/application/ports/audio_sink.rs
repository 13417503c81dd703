//! Audio Sink Port - 音频输出槽抽象
//!
//! 抽象"可播放音频句柄"背后的输出设备。适配器持有唯一的活动
//! 句柄并独占输出槽；真实设备由 UI 协作者提供，本仓库内的实现
//! 只做资源记账与日志。

use thiserror::Error;

use crate::application::ports::RequestId;

/// 输出槽错误
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Release error: {0}")]
    Release(String),
}

/// 一段待播放的合成音频
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// 关联的合成请求
    pub request_id: RequestId,
    /// 音频字节（格式对编排核心不透明）
    pub bytes: Vec<u8>,
}

impl AudioClip {
    pub fn new(request_id: RequestId, bytes: Vec<u8>) -> Self {
        Self { request_id, bytes }
    }
}

/// Audio Sink Port
///
/// 不变量: 同一时刻至多一个 clip 在播放；`start` 会占用与 clip
/// 关联的资源，必须通过 `release` 归还
pub trait AudioSinkPort: Send + Sync {
    /// 开始播放一段音频并占用其资源
    fn start(&self, clip: AudioClip) -> Result<(), SinkError>;

    /// 暂停当前播放
    fn pause(&self);

    /// 恢复当前播放
    fn resume(&self);

    /// 停止当前播放
    fn stop(&self);

    /// 释放某次请求占用的音频资源
    ///
    /// 释放失败是资源泄漏而非致命错误，调用方记录日志后继续
    fn release(&self, request_id: RequestId) -> Result<(), SinkError>;
}
