//! Null Audio Sink - 空音频输出实现
//!
//! 不连接真实输出设备，只做资源记账: 记录每次 start 占用的请求
//! 资源，release 归还。用于无声部署和测试环境；真实设备实现由
//! UI 协作者按同一端口接入。

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::application::ports::{AudioClip, AudioSinkPort, RequestId, SinkError};

/// 空音频输出槽
///
/// `claimed` 记录已占用未释放的请求资源，`ops` 统计播放控制调用次数
pub struct NullAudioSink {
    claimed: DashMap<RequestId, usize>,
    ops: AtomicU64,
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self {
            claimed: DashMap::new(),
            ops: AtomicU64::new(0),
        }
    }

    /// start/pause/resume/stop 的累计调用次数
    pub fn op_count(&self) -> u64 {
        self.ops.load(Ordering::SeqCst)
    }

    /// 已占用未释放的资源数
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}

impl Default for NullAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSinkPort for NullAudioSink {
    fn start(&self, clip: AudioClip) -> Result<(), SinkError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        self.claimed.insert(clip.request_id, clip.bytes.len());
        tracing::debug!(
            request_id = %clip.request_id,
            bytes = clip.bytes.len(),
            "null sink start"
        );
        Ok(())
    }

    fn pause(&self) {
        self.ops.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("null sink pause");
    }

    fn resume(&self) {
        self.ops.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("null sink resume");
    }

    fn stop(&self) {
        self.ops.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("null sink stop");
    }

    fn release(&self, request_id: RequestId) -> Result<(), SinkError> {
        match self.claimed.remove(&request_id) {
            Some(_) => {
                tracing::debug!(request_id = %request_id, "null sink release");
                Ok(())
            }
            None => Err(SinkError::Release(format!(
                "no claimed resource for request {}",
                request_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_claims_and_release_returns() {
        let sink = NullAudioSink::new();
        let id = RequestId::new();

        sink.start(AudioClip::new(id, vec![0u8; 16])).unwrap();
        assert_eq!(sink.claimed_count(), 1);

        sink.release(id).unwrap();
        assert_eq!(sink.claimed_count(), 0);
    }

    #[test]
    fn test_release_unknown_request_fails() {
        let sink = NullAudioSink::new();
        let result = sink.release(RequestId::new());
        assert!(matches!(result, Err(SinkError::Release(_))));
    }

    #[test]
    fn test_op_count_tracks_playback_controls() {
        let sink = NullAudioSink::new();
        assert_eq!(sink.op_count(), 0);

        sink.start(AudioClip::new(RequestId::new(), Vec::new()))
            .unwrap();
        sink.pause();
        sink.resume();
        sink.stop();
        assert_eq!(sink.op_count(), 4);
    }
}
