//! Fake Adapter - 测试用合成后端
//!
//! 不访问网络，把归一化后的文本字节当作"合成音频"交给输出槽。
//! 音色目录、选择能力、下一次合成失败都可以在测试里配置。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::application::ports::{
    AdapterError, EventListener, ListenerId, PlaybackAdapterPort, PlaybackEventKind, RequestId,
};
use crate::application::services::lock_unpoisoned;
use crate::domain::{AdapterType, VoiceDescriptor, VoiceGender};
use crate::infrastructure::adapters::text::DefaultTextFormatter;
use crate::infrastructure::adapters::tts::core::AdapterCore;
use crate::infrastructure::audio::NullAudioSink;

pub struct FakeAdapter {
    core: AdapterCore,
    catalog: Mutex<Vec<VoiceDescriptor>>,
    supports_selection: AtomicBool,
    plays: AtomicU64,
    fail_next: Mutex<Option<String>>,
}

impl FakeAdapter {
    pub fn new(sink: Arc<NullAudioSink>) -> Self {
        Self {
            core: AdapterCore::new(
                AdapterType::OpenAi,
                sink,
                Arc::new(DefaultTextFormatter::default()),
            ),
            catalog: Mutex::new(vec![
                VoiceDescriptor::new("fake-ming", "阿明", "zh", VoiceGender::Male),
                VoiceDescriptor::new("fake-mei", "小梅", "zh", VoiceGender::Female),
            ]),
            supports_selection: AtomicBool::new(true),
            plays: AtomicU64::new(0),
            fail_next: Mutex::new(None),
        }
    }

    /// 成功完成的 `play` 调用次数
    pub fn play_count(&self) -> u64 {
        self.plays.load(Ordering::SeqCst)
    }

    /// 让下一次 `play` 以服务错误失败
    pub fn fail_next_play(&self, message: &str) {
        *lock_unpoisoned(&self.fail_next) = Some(message.to_string());
    }

    /// 替换音色目录
    pub fn set_voice_catalog(&self, voices: Vec<VoiceDescriptor>) {
        *lock_unpoisoned(&self.catalog) = voices;
    }

    /// 配置是否支持音色选择
    pub fn set_supports_voice_selection(&self, supported: bool) {
        self.supports_selection.store(supported, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlaybackAdapterPort for FakeAdapter {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::OpenAi
    }

    async fn play(&self, text: &str) -> Result<RequestId, AdapterError> {
        if let Some(message) = lock_unpoisoned(&self.fail_next).take() {
            self.core.emit_error(&message);
            return Err(AdapterError::Service(message));
        }

        let normalized = self.core.format(text)?;
        let request_id = self.core.begin_playback(normalized.into_bytes())?;
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(request_id)
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn resume(&self) {
        self.core.resume();
    }

    fn stop(&self) {
        self.core.stop();
    }

    fn subscribe(&self, kind: PlaybackEventKind, listener: EventListener) -> ListenerId {
        self.core.subscribe(kind, listener)
    }

    fn unsubscribe(&self, kind: PlaybackEventKind, id: ListenerId) {
        self.core.unsubscribe(kind, id);
    }

    async fn voices(&self) -> Result<Vec<VoiceDescriptor>, AdapterError> {
        Ok(lock_unpoisoned(&self.catalog).clone())
    }

    fn supports_voice_selection(&self) -> bool {
        self.supports_selection.load(Ordering::SeqCst)
    }

    fn set_voice(&self, voice_id: &str) -> Result<(), AdapterError> {
        if !self.supports_voice_selection() {
            return Err(AdapterError::VoiceSelectionNotSupported);
        }
        self.core.set_selected(voice_id);
        Ok(())
    }

    fn selected_voice(&self) -> Option<String> {
        self.core.selected()
    }

    fn notify_playback_ended(&self) {
        self.core.handle_ended();
    }

    fn destroy(&self) {
        self.core.destroy();
    }
}
