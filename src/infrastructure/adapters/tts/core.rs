//! Adapter Core - 适配器公共骨架
//!
//! 各合成后端共享的句柄管理与事件分发: 类型化监听器表（按事件
//! 种类、注册顺序同步分发）、唯一活动音频句柄、已选音色。后端
//! 实现只负责专属的合成通道与音色目录。

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::application::error::panic_message;
use crate::application::ports::{
    AdapterError, AudioClip, AudioSinkPort, EventListener, ListenerId, PlaybackEvent,
    PlaybackEventKind, RequestId, TextFormatterPort,
};
use crate::application::services::lock_unpoisoned;
use crate::domain::AdapterType;

/// 活动音频句柄
///
/// 不变量: 任意时刻至多一个；持有已占用的输出槽资源
struct ActiveHandle {
    request_id: RequestId,
    paused: bool,
}

/// 适配器公共骨架
pub(crate) struct AdapterCore {
    kind: AdapterType,
    sink: Arc<dyn AudioSinkPort>,
    formatter: Arc<dyn TextFormatterPort>,
    listeners: Mutex<HashMap<PlaybackEventKind, Vec<(ListenerId, EventListener)>>>,
    handle: Mutex<Option<ActiveHandle>>,
    selected: Mutex<Option<String>>,
}

impl AdapterCore {
    pub(crate) fn new(
        kind: AdapterType,
        sink: Arc<dyn AudioSinkPort>,
        formatter: Arc<dyn TextFormatterPort>,
    ) -> Self {
        Self {
            kind,
            sink,
            formatter,
            listeners: Mutex::new(HashMap::new()),
            handle: Mutex::new(None),
            selected: Mutex::new(None),
        }
    }

    /// 归一化待合成文本
    pub(crate) fn format(&self, text: &str) -> Result<String, AdapterError> {
        self.formatter
            .format(text)
            .map_err(|e| AdapterError::Validation(e.to_string()))
    }

    /// 用新合成的音频建立唯一活动句柄并开始播放
    ///
    /// 旧句柄（若有）静默销毁——不触发 Stop 事件，这是换句柄
    /// 而非用户停止
    pub(crate) fn begin_playback(&self, bytes: Vec<u8>) -> Result<RequestId, AdapterError> {
        let request_id = RequestId::new();
        {
            let mut handle = lock_unpoisoned(&self.handle);
            if let Some(previous) = handle.take() {
                self.sink.stop();
                self.release_quiet(previous.request_id);
            }
            self.sink
                .start(AudioClip::new(request_id, bytes))
                .map_err(|e| AdapterError::Playback(e.to_string()))?;
            *handle = Some(ActiveHandle {
                request_id,
                paused: false,
            });
        }
        self.emit(&PlaybackEvent::Play { request_id });
        Ok(request_id)
    }

    /// 暂停（无句柄或已暂停时 no-op）
    pub(crate) fn pause(&self) {
        let fired = {
            let mut handle = lock_unpoisoned(&self.handle);
            match handle.as_mut() {
                Some(h) if !h.paused => {
                    h.paused = true;
                    self.sink.pause();
                    true
                }
                _ => false,
            }
        };
        if fired {
            self.emit(&PlaybackEvent::Pause);
        }
    }

    /// 恢复（无句柄或未暂停时 no-op）
    pub(crate) fn resume(&self) {
        let fired = {
            let mut handle = lock_unpoisoned(&self.handle);
            match handle.as_mut() {
                Some(h) if h.paused => {
                    h.paused = false;
                    self.sink.resume();
                    true
                }
                _ => false,
            }
        };
        if fired {
            self.emit(&PlaybackEvent::Resume);
        }
    }

    /// 停止并销毁句柄（无句柄时 no-op，不触碰输出槽）
    pub(crate) fn stop(&self) {
        let stopped = {
            let mut handle = lock_unpoisoned(&self.handle);
            match handle.take() {
                Some(h) => {
                    self.sink.stop();
                    self.release_quiet(h.request_id);
                    true
                }
                None => false,
            }
        };
        if stopped {
            self.emit(&PlaybackEvent::Stop);
        }
    }

    /// 外部播放器报告自然播放完毕
    pub(crate) fn handle_ended(&self) {
        let ended = {
            let mut handle = lock_unpoisoned(&self.handle);
            match handle.take() {
                Some(h) => {
                    self.release_quiet(h.request_id);
                    true
                }
                None => false,
            }
        };
        if ended {
            self.emit(&PlaybackEvent::End);
        }
    }

    /// 向监听器广播一条错误事件
    pub(crate) fn emit_error(&self, message: impl Into<String>) {
        self.emit(&PlaybackEvent::Error {
            message: message.into(),
        });
    }

    pub(crate) fn subscribe(&self, kind: PlaybackEventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId::new();
        lock_unpoisoned(&self.listeners)
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, kind: PlaybackEventKind, id: ListenerId) {
        if let Some(list) = lock_unpoisoned(&self.listeners).get_mut(&kind) {
            list.retain(|(listener_id, _)| *listener_id != id);
        }
    }

    pub(crate) fn set_selected(&self, voice_id: &str) {
        *lock_unpoisoned(&self.selected) = Some(voice_id.to_string());
    }

    pub(crate) fn selected(&self) -> Option<String> {
        lock_unpoisoned(&self.selected).clone()
    }

    /// 销毁: 停止音频、释放资源、清空监听器表。不触发任何事件
    pub(crate) fn destroy(&self) {
        {
            let mut handle = lock_unpoisoned(&self.handle);
            if let Some(h) = handle.take() {
                self.sink.stop();
                self.release_quiet(h.request_id);
            }
        }
        lock_unpoisoned(&self.listeners).clear();
        *lock_unpoisoned(&self.selected) = None;
        tracing::debug!(backend = %self.kind, "adapter destroyed");
    }

    /// 按注册顺序同步分发；监听器 panic 被捕获记录，不影响其余监听器
    fn emit(&self, event: &PlaybackEvent) {
        let snapshot: Vec<EventListener> = lock_unpoisoned(&self.listeners)
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                tracing::error!(
                    backend = %self.kind,
                    event = event.kind().as_str(),
                    error = %panic_message(payload.as_ref()),
                    "playback event listener panicked"
                );
            }
        }
    }

    /// 释放失败按资源泄漏记录，不上抛
    fn release_quiet(&self, request_id: RequestId) {
        if let Err(e) = self.sink.release(request_id) {
            tracing::warn!(request_id = %request_id, error = %e, "audio resource leak");
        }
    }
}
