//! Voice Manager - 音色目录与选择管理
//!
//! 为当前适配器加载并缓存音色目录，按属性过滤，跟踪当前选中音色。
//! 切换底层适配器时必须清空缓存，不得泄漏上一后端的音色数据。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;

use crate::application::error::panic_message;
use crate::application::ports::{AdapterError, PlaybackAdapterPort};
use crate::application::services::lock_unpoisoned;
use crate::domain::{VoiceDescriptor, VoiceGender};

/// 音色管理错误
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("No voices available from adapter")]
    NoVoicesAvailable,

    #[error("Voice selection not supported by current adapter")]
    VoiceSettingNotSupported,

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// 音色流状态
#[derive(Debug, Clone, Default)]
pub struct VoiceListState {
    pub voices: Vec<VoiceDescriptor>,
    /// 当前选中音色的描述符；选中 ID 不在目录中时为 None（不是错误）
    pub selected: Option<VoiceDescriptor>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// 音色变更回调
///
/// set_voice 成功后通知，参数为目录中解析到的描述符（可能缺席）
pub type VoiceChangeCallback = Box<dyn Fn(Option<&VoiceDescriptor>) + Send + Sync>;

/// 在途标记守卫，离开作用域时复位
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 音色管理器
pub struct VoiceManager {
    adapter: Mutex<Arc<dyn PlaybackAdapterPort>>,
    catalog: Mutex<Vec<VoiceDescriptor>>,
    current: Mutex<Option<String>>,
    /// load_voices 重入防护
    loading: AtomicBool,
    state_tx: watch::Sender<VoiceListState>,
    on_change: Mutex<Option<VoiceChangeCallback>>,
}

impl VoiceManager {
    pub fn new(adapter: Arc<dyn PlaybackAdapterPort>) -> Self {
        let (state_tx, _) = watch::channel(VoiceListState::default());
        Self {
            adapter: Mutex::new(adapter),
            catalog: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            loading: AtomicBool::new(false),
            state_tx,
            on_change: Mutex::new(None),
        }
    }

    /// 订阅音色流
    pub fn subscribe(&self) -> watch::Receiver<VoiceListState> {
        self.state_tx.subscribe()
    }

    /// 注册音色变更回调
    pub fn set_change_callback(&self, callback: VoiceChangeCallback) {
        *lock_unpoisoned(&self.on_change) = Some(callback);
    }

    /// 加载音色目录
    ///
    /// - 同一管理器上已有一次加载在途时，直接返回当前选择，
    ///   不发起重复请求
    /// - 仅在尚无选中音色时自动选择第一个，已有选择跨重载保留
    pub async fn load_voices(&self) -> Result<Option<VoiceDescriptor>, VoiceError> {
        if self.loading.swap(true, Ordering::SeqCst) {
            tracing::debug!("load_voices already in flight, skipping duplicate request");
            return Ok(self.current_descriptor());
        }
        // 加载中途 panic 也要复位在途标记，否则后续加载被永久跳过
        let _in_flight = LoadingGuard(&self.loading);

        self.publish(true, None);
        let result = self.load_voices_inner().await;

        match &result {
            Ok(selected) => {
                tracing::info!(
                    voices = self.catalog_len(),
                    selected = selected.as_ref().map(|v| v.id.as_str()),
                    "voice catalog loaded"
                );
                self.publish(false, None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "voice catalog load failed");
                self.publish(false, Some(e.to_string()));
            }
        }

        result
    }

    async fn load_voices_inner(&self) -> Result<Option<VoiceDescriptor>, VoiceError> {
        let adapter = self.current_adapter();
        let voices = adapter.voices().await.map_err(VoiceError::Adapter)?;
        if voices.is_empty() {
            return Err(VoiceError::NoVoicesAvailable);
        }

        let first = voices[0].clone();
        *lock_unpoisoned(&self.catalog) = voices;

        // 锁顺序: catalog 先于 current
        let selected = {
            let mut current = lock_unpoisoned(&self.current);
            if current.is_none() {
                if adapter.supports_voice_selection() {
                    if let Err(e) = adapter.set_voice(&first.id) {
                        tracing::warn!(voice_id = %first.id, error = %e, "auto-select voice failed");
                    }
                }
                *current = Some(first.id.clone());
            }
            current.clone()
        };

        Ok(selected.and_then(|id| self.lookup(&id)))
    }

    /// 选择音色
    ///
    /// 适配器不支持音色选择时同步报 VoiceSettingNotSupported；
    /// ID 不在缓存目录中不是错误，照常接受并以 None 通知回调
    pub fn set_voice(&self, voice_id: &str) -> Result<(), VoiceError> {
        let adapter = self.current_adapter();
        if !adapter.supports_voice_selection() {
            let err = VoiceError::VoiceSettingNotSupported;
            self.publish(false, Some(err.to_string()));
            return Err(err);
        }

        if let Err(e) = adapter.set_voice(voice_id) {
            self.publish(false, Some(e.to_string()));
            return Err(VoiceError::Adapter(e));
        }

        *lock_unpoisoned(&self.current) = Some(voice_id.to_string());
        let resolved = self.lookup(voice_id);

        if let Some(callback) = lock_unpoisoned(&self.on_change).as_ref() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(resolved.as_ref()))) {
                tracing::error!(
                    voice_id = %voice_id,
                    error = %panic_message(payload.as_ref()),
                    "voice change callback panicked"
                );
            }
        }

        tracing::debug!(
            voice_id = %voice_id,
            resolved = resolved.is_some(),
            "voice selected"
        );
        self.publish(false, None);
        Ok(())
    }

    /// 按性别过滤音色
    ///
    /// 优先使用适配器原生过滤，不可用时回退本地缓存目录
    pub fn voices_by_gender(&self, gender: VoiceGender) -> Vec<VoiceDescriptor> {
        let adapter = self.current_adapter();
        if let Some(native) = adapter.native_voices_by_gender(gender) {
            return native;
        }
        lock_unpoisoned(&self.catalog)
            .iter()
            .filter(|v| v.gender == gender)
            .cloned()
            .collect()
    }

    /// 当前选中音色的性别
    ///
    /// 优先适配器原生查询；原生查询未解析时记录警告并回退缓存目录；
    /// 无法解析时返回 None，从不报错
    pub fn current_voice_gender(&self) -> Option<VoiceGender> {
        let adapter = self.current_adapter();
        if let Some(gender) = adapter.native_current_voice_gender() {
            return Some(gender);
        }

        let current = lock_unpoisoned(&self.current).clone();
        let current_id = current?;
        if adapter.selected_voice().is_some() {
            tracing::warn!(
                voice_id = %current_id,
                "native current-voice gender lookup failed, falling back to cached catalog"
            );
        }
        self.lookup(&current_id).map(|v| v.gender)
    }

    /// 当前选中音色 ID
    pub fn current_voice_id(&self) -> Option<String> {
        lock_unpoisoned(&self.current).clone()
    }

    /// 当前选中音色描述符（目录中解析不到时为 None）
    pub fn current_descriptor(&self) -> Option<VoiceDescriptor> {
        let id = lock_unpoisoned(&self.current).clone()?;
        self.lookup(&id)
    }

    /// 切换底层适配器，清空上一后端的缓存目录与选择
    pub fn update_adapter(&self, adapter: Arc<dyn PlaybackAdapterPort>) {
        *lock_unpoisoned(&self.adapter) = adapter;
        self.reset();
    }

    /// 清理缓存目录与选择状态
    pub fn cleanup(&self) {
        self.reset();
    }

    fn reset(&self) {
        lock_unpoisoned(&self.catalog).clear();
        *lock_unpoisoned(&self.current) = None;
        self.publish(false, None);
    }

    fn current_adapter(&self) -> Arc<dyn PlaybackAdapterPort> {
        lock_unpoisoned(&self.adapter).clone()
    }

    fn lookup(&self, voice_id: &str) -> Option<VoiceDescriptor> {
        lock_unpoisoned(&self.catalog)
            .iter()
            .find(|v| v.id == voice_id)
            .cloned()
    }

    fn catalog_len(&self) -> usize {
        lock_unpoisoned(&self.catalog).len()
    }

    fn publish(&self, is_loading: bool, error: Option<String>) {
        let voices = lock_unpoisoned(&self.catalog).clone();
        let selected = self.current_descriptor();
        self.state_tx.send_replace(VoiceListState {
            voices,
            selected,
            is_loading,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{EventListener, ListenerId, PlaybackEventKind, RequestId};
    use crate::domain::AdapterType;
    use crate::infrastructure::adapters::tts::FakeAdapter;
    use crate::infrastructure::audio::NullAudioSink;
    use async_trait::async_trait;

    fn manager_with_fake() -> (VoiceManager, Arc<FakeAdapter>) {
        let sink = Arc::new(NullAudioSink::new());
        let adapter = Arc::new(FakeAdapter::new(sink));
        let manager = VoiceManager::new(adapter.clone());
        (manager, adapter)
    }

    #[tokio::test]
    async fn test_load_voices_auto_selects_first() {
        let (manager, _adapter) = manager_with_fake();

        let selected = manager.load_voices().await.unwrap();
        assert!(selected.is_some());
        assert_eq!(manager.current_voice_id(), Some("fake-ming".to_string()));
    }

    #[tokio::test]
    async fn test_reload_preserves_existing_selection() {
        let (manager, _adapter) = manager_with_fake();

        manager.load_voices().await.unwrap();
        manager.set_voice("fake-mei").unwrap();

        let selected = manager.load_voices().await.unwrap();
        assert_eq!(selected.map(|v| v.id), Some("fake-mei".to_string()));
        assert_eq!(manager.current_voice_id(), Some("fake-mei".to_string()));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_no_voices_available() {
        let (manager, adapter) = manager_with_fake();
        adapter.set_voice_catalog(Vec::new());

        let err = manager.load_voices().await.unwrap_err();
        assert!(matches!(err, VoiceError::NoVoicesAvailable));

        let state = manager.subscribe().borrow().clone();
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_set_voice_not_supported() {
        let (manager, adapter) = manager_with_fake();
        adapter.set_supports_voice_selection(false);

        let err = manager.set_voice("fake-ming").unwrap_err();
        assert!(matches!(err, VoiceError::VoiceSettingNotSupported));
    }

    #[tokio::test]
    async fn test_set_unknown_voice_accepted_with_none_callback() {
        let (manager, _adapter) = manager_with_fake();
        manager.load_voices().await.unwrap();

        let resolved_seen = Arc::new(Mutex::new(None::<bool>));
        let seen = resolved_seen.clone();
        manager.set_change_callback(Box::new(move |resolved| {
            *seen.lock().unwrap() = Some(resolved.is_some());
        }));

        manager.set_voice("no-such-voice").unwrap();
        assert_eq!(*resolved_seen.lock().unwrap(), Some(false));
        assert_eq!(manager.current_voice_id(), Some("no-such-voice".to_string()));
    }

    #[tokio::test]
    async fn test_gender_roundtrip_through_catalog() {
        let (manager, _adapter) = manager_with_fake();
        manager.load_voices().await.unwrap();

        manager.set_voice("fake-mei").unwrap();
        assert_eq!(manager.current_voice_gender(), Some(VoiceGender::Female));

        manager.set_voice("absent-id").unwrap();
        assert_eq!(manager.current_voice_gender(), None);
    }

    #[tokio::test]
    async fn test_gender_filter_falls_back_to_cache() {
        let (manager, _adapter) = manager_with_fake();
        manager.load_voices().await.unwrap();

        let females = manager.voices_by_gender(VoiceGender::Female);
        assert_eq!(females.len(), 1);
        assert_eq!(females[0].id, "fake-mei");
    }

    #[tokio::test]
    async fn test_update_adapter_resets_cache() {
        let (manager, _adapter) = manager_with_fake();
        manager.load_voices().await.unwrap();
        assert!(manager.current_voice_id().is_some());

        let sink = Arc::new(NullAudioSink::new());
        manager.update_adapter(Arc::new(FakeAdapter::new(sink)));

        assert!(manager.current_voice_id().is_none());
        assert!(manager.subscribe().borrow().voices.is_empty());
    }

    /// 目录查询必然 panic 的适配器
    struct PanickingAdapter;

    #[async_trait]
    impl PlaybackAdapterPort for PanickingAdapter {
        fn adapter_type(&self) -> AdapterType {
            AdapterType::OpenAi
        }

        async fn play(&self, _text: &str) -> Result<RequestId, AdapterError> {
            Ok(RequestId::new())
        }

        fn pause(&self) {}
        fn resume(&self) {}
        fn stop(&self) {}

        fn subscribe(&self, _kind: PlaybackEventKind, _listener: EventListener) -> ListenerId {
            ListenerId::new()
        }

        fn unsubscribe(&self, _kind: PlaybackEventKind, _id: ListenerId) {}

        async fn voices(&self) -> Result<Vec<VoiceDescriptor>, AdapterError> {
            panic!("catalog backend crashed");
        }

        fn set_voice(&self, _voice_id: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        fn selected_voice(&self) -> Option<String> {
            None
        }

        fn notify_playback_ended(&self) {}
        fn destroy(&self) {}
    }

    #[tokio::test]
    async fn test_load_recovers_after_panicked_load() {
        let manager = Arc::new(VoiceManager::new(Arc::new(PanickingAdapter)));

        let crashed = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.load_voices().await })
        };
        assert!(crashed.await.is_err());

        // 在途标记已复位，换掉适配器后加载照常进行
        let sink = Arc::new(NullAudioSink::new());
        manager.update_adapter(Arc::new(FakeAdapter::new(sink)));
        let selected = manager.load_voices().await.unwrap();
        assert!(selected.is_some());
        assert_eq!(manager.current_voice_id(), Some("fake-ming".to_string()));
    }

    #[tokio::test]
    async fn test_cleanup_resets_selection() {
        let (manager, _adapter) = manager_with_fake();
        manager.load_voices().await.unwrap();

        manager.cleanup();
        assert!(manager.current_voice_id().is_none());
        assert!(manager.current_descriptor().is_none());
    }
}
