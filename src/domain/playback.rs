//! Playback State Machine - 播放状态机
//!
//! 状态流转: Idle → Generating → Playing ⇄ Paused → Stopped → Idle
//! Error 可从任意活动状态进入

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// 空闲，可开始朗读
    Idle,
    /// 正在请求语音合成
    Generating,
    /// 正在播放
    Playing,
    /// 已暂停
    Paused,
    /// 已停止（可重新开始）
    Stopped,
    /// 出错（错误信息记录在快照中）
    Error,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Generating => "generating",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(PlaybackState::Idle),
            "generating" => Some(PlaybackState::Generating),
            "playing" => Some(PlaybackState::Playing),
            "paused" => Some(PlaybackState::Paused),
            "stopped" => Some(PlaybackState::Stopped),
            "error" => Some(PlaybackState::Error),
            _ => None,
        }
    }

    /// 是否为活动状态（合成中 / 播放中 / 暂停中）
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Generating | PlaybackState::Playing | PlaybackState::Paused
        )
    }

    /// 是否允许开始新的朗读
    ///
    /// Generating / Playing 期间拒绝重入，其余状态（含 Stopped / Error）
    /// 均可重新开始
    pub fn can_start(&self) -> bool {
        !matches!(self, PlaybackState::Generating | PlaybackState::Playing)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 朗读状态快照
///
/// 编排服务对外发布的合成视图，订阅者无需自行推导状态机。
/// Stopped 与 Idle 在快照中的布尔投影一致（全 false）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    pub state: PlaybackState,
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_generating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 快照生成时间
    pub changed_at: DateTime<Utc>,
}

impl ReadingSnapshot {
    pub fn new(state: PlaybackState, error: Option<String>) -> Self {
        Self {
            state,
            is_playing: state == PlaybackState::Playing,
            is_paused: state == PlaybackState::Paused,
            is_generating: state == PlaybackState::Generating,
            error,
            changed_at: Utc::now(),
        }
    }

    pub fn idle() -> Self {
        Self::new(PlaybackState::Idle, None)
    }
}

impl Default for ReadingSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        for state in [
            PlaybackState::Idle,
            PlaybackState::Generating,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Stopped,
            PlaybackState::Error,
        ] {
            assert_eq!(PlaybackState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PlaybackState::parse("unknown"), None);
    }

    #[test]
    fn test_can_start_blocks_generating_and_playing() {
        assert!(!PlaybackState::Generating.can_start());
        assert!(!PlaybackState::Playing.can_start());
        assert!(PlaybackState::Idle.can_start());
        assert!(PlaybackState::Paused.can_start());
        assert!(PlaybackState::Stopped.can_start());
        assert!(PlaybackState::Error.can_start());
    }

    #[test]
    fn test_snapshot_projection() {
        let snap = ReadingSnapshot::new(PlaybackState::Playing, None);
        assert!(snap.is_playing);
        assert!(!snap.is_paused);
        assert!(!snap.is_generating);

        let stopped = ReadingSnapshot::new(PlaybackState::Stopped, None);
        let idle = ReadingSnapshot::idle();
        assert_eq!(stopped.is_playing, idle.is_playing);
        assert_eq!(stopped.is_paused, idle.is_paused);
        assert_eq!(stopped.is_generating, idle.is_generating);
    }
}
