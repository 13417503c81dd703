//! Reading Orchestrator - 朗读编排服务
//!
//! 持有播放状态机，串联"抽取文本 → 选音色 → 合成 → 播放"流程，
//! 并把适配器原始事件翻译为状态机迁移后重新发布给订阅者。
//!
//! 状态流转: Idle → Generating → Playing ⇄ Paused → Stopped → Idle，
//! Error 可从任意活动状态进入。startReading 期间无论哪条失败路径，
//! 状态机都会落在非 Generating 的终态，绝不卡在 Generating。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{broadcast, watch};

use crate::application::error::panic_message;
use crate::application::ports::{
    ListenerId, PlaybackAdapterPort, PlaybackEvent, PlaybackEventKind, TextChunk, TextSourcePort,
};
use crate::application::services::lock_unpoisoned;
use crate::domain::{AdapterType, ElementKind, PlaybackState, ReadingSnapshot};

/// 无可朗读内容时写入错误流的消息
pub(crate) const NO_TEXT_MESSAGE: &str = "No text found to convert";

/// 状态观察者（同步回调，panic 被捕获并记录）
type StateObserver = Box<dyn Fn(&ReadingSnapshot) + Send + Sync>;

/// 状态机内部存储
struct Machine {
    state: PlaybackState,
    error: Option<String>,
    /// 朗读世代计数；stop / destroy 递增，作废在途的合成请求
    run: u64,
}

struct OrchestratorInner {
    adapter: Arc<dyn PlaybackAdapterPort>,
    text_source: Arc<dyn TextSourcePort>,
    machine: Mutex<Machine>,
    state_tx: watch::Sender<ReadingSnapshot>,
    event_tx: broadcast::Sender<PlaybackEvent>,
    observers: Mutex<Vec<StateObserver>>,
    /// 已注册到适配器的监听器（destroy 时解绑）
    listener_ids: Mutex<Vec<(PlaybackEventKind, ListenerId)>>,
}

/// 朗读编排服务
///
/// 状态只由本服务迁移；适配器切换时整体重建（见 ServiceBundleFactory）
pub struct ReadingOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl ReadingOrchestrator {
    pub fn new(
        adapter: Arc<dyn PlaybackAdapterPort>,
        text_source: Arc<dyn TextSourcePort>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(ReadingSnapshot::idle());
        let (event_tx, _) = broadcast::channel(64);

        let inner = Arc::new(OrchestratorInner {
            adapter,
            text_source,
            machine: Mutex::new(Machine {
                state: PlaybackState::Idle,
                error: None,
                run: 0,
            }),
            state_tx,
            event_tx,
            observers: Mutex::new(Vec::new()),
            listener_ids: Mutex::new(Vec::new()),
        });

        // 订阅全部适配器事件，翻译为状态机迁移
        let weak: Weak<OrchestratorInner> = Arc::downgrade(&inner);
        for kind in PlaybackEventKind::all() {
            let weak = weak.clone();
            let id = inner.adapter.subscribe(
                *kind,
                Arc::new(move |event| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_adapter_event(event);
                    }
                }),
            );
            lock_unpoisoned(&inner.listener_ids).push((*kind, id));
        }

        Self { inner }
    }

    /// 订阅状态快照流
    pub fn subscribe_state(&self) -> watch::Receiver<ReadingSnapshot> {
        self.inner.state_tx.subscribe()
    }

    /// 订阅重新发布的适配器原始事件
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.event_tx.subscribe()
    }

    /// 注册同步状态观察者
    pub fn add_state_observer(&self, observer: StateObserver) {
        lock_unpoisoned(&self.inner.observers).push(observer);
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> ReadingSnapshot {
        let machine = lock_unpoisoned(&self.inner.machine);
        ReadingSnapshot::new(machine.state, machine.error.clone())
    }

    /// 当前后端类型（供工厂做 stop-then-switch 决策）
    pub fn adapter_type(&self) -> AdapterType {
        self.inner.adapter.adapter_type()
    }

    /// 开始朗读
    ///
    /// Generating / Playing 期间的重复调用被忽略。失败不跨边界抛出，
    /// 错误消息写入状态流。
    pub async fn start_reading(&self) {
        let run = match self.inner.try_begin_generating() {
            Some(run) => run,
            None => return,
        };

        let chunks = match self.inner.text_source.extract_chunks().await {
            Ok(chunks) => chunks,
            Err(e) => {
                if self.inner.is_superseded(run) {
                    return;
                }
                tracing::warn!(error = %e, "text extraction failed");
                self.inner.set_error(e.to_string());
                return;
            }
        };

        if self.inner.is_superseded(run) {
            tracing::debug!("reading superseded during text extraction");
            return;
        }

        if chunks.is_empty() {
            tracing::info!("nothing to read from text source");
            self.inner.set_error(NO_TEXT_MESSAGE.to_string());
            return;
        }

        let text = join_chunks(&chunks);
        match self.inner.adapter.play(&text).await {
            Ok(request_id) => {
                // stop 赢: 等待期间被停止的朗读不得复活，释放刚建立的句柄
                if self.inner.is_superseded(run) {
                    tracing::info!(
                        request_id = %request_id,
                        "synthesis resolved after stop, discarding"
                    );
                    self.inner.adapter.stop();
                    return;
                }
                tracing::info!(
                    request_id = %request_id,
                    chunks = chunks.len(),
                    text_chars = text.chars().count(),
                    "reading started"
                );
                self.inner.set_state(PlaybackState::Playing, None);
            }
            Err(e) => {
                if self.inner.is_superseded(run) {
                    return;
                }
                tracing::warn!(error = %e, "synthesis request failed");
                self.inner.set_error(e.to_string());
            }
        }
    }

    /// 暂停朗读（仅 Playing 状态下委派给适配器）
    pub fn pause_reading(&self) {
        if self.snapshot().state != PlaybackState::Playing {
            tracing::debug!("pause_reading ignored: not playing");
            return;
        }
        self.inner.adapter.pause();
    }

    /// 恢复朗读（仅 Paused 状态下委派给适配器）
    pub fn resume_reading(&self) {
        if self.snapshot().state != PlaybackState::Paused {
            tracing::debug!("resume_reading ignored: not paused");
            return;
        }
        self.inner.adapter.resume();
    }

    /// 停止朗读
    ///
    /// 无条件委派并强制迁移到 Stopped，可作为任意状态下的
    /// "紧急复位"，自身幂等。同时作废在途的合成请求——Generating
    /// 期间的 stop 之后，迟到的合成结果被丢弃，不得复活播放
    pub fn stop_reading(&self) {
        self.inner.supersede();
        self.inner.adapter.stop();
        self.inner.set_state(PlaybackState::Stopped, None);
    }

    /// 销毁: 停止播放、从适配器解绑监听器、复位状态机
    pub fn destroy(&self) {
        self.inner.supersede();
        self.inner.adapter.stop();
        let ids = std::mem::take(&mut *lock_unpoisoned(&self.inner.listener_ids));
        for (kind, id) in ids {
            self.inner.adapter.unsubscribe(kind, id);
        }
        lock_unpoisoned(&self.inner.observers).clear();
        self.inner.set_state(PlaybackState::Idle, None);
    }
}

impl OrchestratorInner {
    /// 尝试进入 Generating，返回本次朗读的世代号；
    /// 已在 Generating / Playing 时返回 None
    fn try_begin_generating(&self) -> Option<u64> {
        let (snapshot, run) = {
            let mut machine = lock_unpoisoned(&self.machine);
            if !machine.state.can_start() {
                tracing::debug!(state = %machine.state, "start_reading ignored");
                return None;
            }
            machine.state = PlaybackState::Generating;
            machine.error = None;
            (ReadingSnapshot::new(machine.state, None), machine.run)
        };
        self.publish(snapshot);
        Some(run)
    }

    /// 作废在途的合成请求
    fn supersede(&self) {
        lock_unpoisoned(&self.machine).run += 1;
    }

    fn is_superseded(&self, run: u64) -> bool {
        lock_unpoisoned(&self.machine).run != run
    }

    fn set_state(&self, state: PlaybackState, error: Option<String>) {
        let snapshot = {
            let mut machine = lock_unpoisoned(&self.machine);
            let from = machine.state;
            machine.state = state;
            machine.error = error;
            tracing::debug!(from = %from, to = %state, "playback state transition");
            ReadingSnapshot::new(machine.state, machine.error.clone())
        };
        self.publish(snapshot);
    }

    fn set_error(&self, message: String) {
        self.set_state(PlaybackState::Error, Some(message));
    }

    /// 适配器事件 → 状态机迁移 + 重新发布
    fn on_adapter_event(&self, event: &PlaybackEvent) {
        if let Err(e) = self.event_tx.send(event.clone()) {
            tracing::debug!(
                kind = event.kind().as_str(),
                error = %e,
                "failed to republish playback event (no receivers)"
            );
        }

        match event {
            PlaybackEvent::Play { .. } => {
                // 合成期间被 stop 后，迟到的 Play 不得把状态机拉回 Playing
                if self.current_state() == PlaybackState::Generating {
                    self.set_state(PlaybackState::Playing, None);
                } else {
                    tracing::debug!("play event ignored: not generating");
                }
            }
            PlaybackEvent::Pause => {
                if self.current_state() == PlaybackState::Playing {
                    self.set_state(PlaybackState::Paused, None);
                }
            }
            PlaybackEvent::Resume => {
                if self.current_state() == PlaybackState::Paused {
                    self.set_state(PlaybackState::Playing, None);
                }
            }
            PlaybackEvent::Stop => self.set_state(PlaybackState::Stopped, None),
            PlaybackEvent::End => self.set_state(PlaybackState::Idle, None),
            PlaybackEvent::Error { message } => self.set_error(message.clone()),
        }
    }

    fn current_state(&self) -> PlaybackState {
        lock_unpoisoned(&self.machine).state
    }

    fn publish(&self, snapshot: ReadingSnapshot) {
        self.state_tx.send_replace(snapshot.clone());

        let observers = lock_unpoisoned(&self.observers);
        for observer in observers.iter() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(&snapshot))) {
                tracing::error!(
                    error = %panic_message(payload.as_ref()),
                    "state observer panicked"
                );
            }
        }
    }
}

/// 拼接分块为单次合成文本
///
/// 标题补句末标点，让停顿在合成结果中保留
fn join_chunks(chunks: &[TextChunk]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let text = chunk.text.trim();
        if text.is_empty() {
            continue;
        }
        if chunk.kind == ElementKind::Heading && !text.ends_with(['。', '.', '！', '!', '？', '?'])
        {
            parts.push(format!("{}.", text));
        } else {
            parts.push(text.to_string());
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        AdapterError, EventListener, RequestId, TextSourceError,
    };
    use crate::domain::VoiceDescriptor;
    use crate::infrastructure::adapters::tts::FakeAdapter;
    use crate::infrastructure::audio::NullAudioSink;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticTextSource {
        chunks: Vec<TextChunk>,
    }

    #[async_trait]
    impl TextSourcePort for StaticTextSource {
        async fn extract_chunks(&self) -> Result<Vec<TextChunk>, TextSourceError> {
            Ok(self.chunks.clone())
        }
    }

    fn text_source(texts: &[&str]) -> Arc<StaticTextSource> {
        Arc::new(StaticTextSource {
            chunks: texts
                .iter()
                .map(|t| TextChunk::new(*t, ElementKind::Paragraph))
                .collect(),
        })
    }

    fn fake_adapter() -> (Arc<FakeAdapter>, Arc<NullAudioSink>) {
        let sink = Arc::new(NullAudioSink::new());
        let adapter = Arc::new(FakeAdapter::new(sink.clone()));
        (adapter, sink)
    }

    /// 合成前人为延迟的适配器，用于制造"合成在途"窗口
    struct SlowAdapter {
        inner: Arc<FakeAdapter>,
        delay: Duration,
    }

    #[async_trait]
    impl PlaybackAdapterPort for SlowAdapter {
        fn adapter_type(&self) -> AdapterType {
            self.inner.adapter_type()
        }

        async fn play(&self, text: &str) -> Result<RequestId, AdapterError> {
            tokio::time::sleep(self.delay).await;
            self.inner.play(text).await
        }

        fn pause(&self) {
            self.inner.pause();
        }

        fn resume(&self) {
            self.inner.resume();
        }

        fn stop(&self) {
            self.inner.stop();
        }

        fn subscribe(&self, kind: PlaybackEventKind, listener: EventListener) -> ListenerId {
            self.inner.subscribe(kind, listener)
        }

        fn unsubscribe(&self, kind: PlaybackEventKind, id: ListenerId) {
            self.inner.unsubscribe(kind, id);
        }

        async fn voices(&self) -> Result<Vec<VoiceDescriptor>, AdapterError> {
            self.inner.voices().await
        }

        fn set_voice(&self, voice_id: &str) -> Result<(), AdapterError> {
            self.inner.set_voice(voice_id)
        }

        fn selected_voice(&self) -> Option<String> {
            self.inner.selected_voice()
        }

        fn notify_playback_ended(&self) {
            self.inner.notify_playback_ended();
        }

        fn destroy(&self) {
            self.inner.destroy();
        }
    }

    #[tokio::test]
    async fn test_start_reading_reaches_playing() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["有内容。"]));

        orchestrator.start_reading().await;

        let snap = orchestrator.snapshot();
        assert_eq!(snap.state, PlaybackState::Playing);
        assert_eq!(adapter.play_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_chunks_is_error_without_play() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&[]));

        orchestrator.start_reading().await;

        let snap = orchestrator.snapshot();
        assert_eq!(snap.state, PlaybackState::Error);
        assert_eq!(snap.error.as_deref(), Some(NO_TEXT_MESSAGE));
        assert_eq!(adapter.play_count(), 0);
    }

    #[tokio::test]
    async fn test_play_failure_surfaces_error_state() {
        let (adapter, _sink) = fake_adapter();
        adapter.fail_next_play("synthesis backend down");
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        orchestrator.start_reading().await;

        let snap = orchestrator.snapshot();
        assert_eq!(snap.state, PlaybackState::Error);
        assert!(snap.error.unwrap().contains("synthesis backend down"));
    }

    #[tokio::test]
    async fn test_pause_resume_stop_noop_while_idle() {
        let (adapter, sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        orchestrator.pause_reading();
        orchestrator.resume_reading();
        orchestrator.stop_reading();

        // 底层音频调用从未发生
        assert_eq!(sink.op_count(), 0);
        // stop 仍然无条件迁移
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn test_pause_and_resume_follow_adapter_events() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        orchestrator.start_reading().await;
        orchestrator.pause_reading();
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Paused);

        orchestrator.resume_reading();
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Playing);

        orchestrator.stop_reading();
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn test_start_reading_reentrancy_guard() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        orchestrator.start_reading().await;
        // Playing 状态下的第二次调用被忽略
        orchestrator.start_reading().await;

        assert_eq!(adapter.play_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_during_generation_discards_resolved_synthesis() {
        let sink = Arc::new(NullAudioSink::new());
        let fake = Arc::new(FakeAdapter::new(sink.clone()));
        let adapter = Arc::new(SlowAdapter {
            inner: fake.clone(),
            delay: Duration::from_millis(100),
        });
        let orchestrator = Arc::new(ReadingOrchestrator::new(adapter, text_source(&["内容。"])));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        orchestrator.add_state_observer(Box::new(move |snap| {
            seen_clone.lock().unwrap().push(snap.state);
        }));

        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start_reading().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Generating);
        orchestrator.stop_reading();
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Stopped);

        // 合成在途时被停止：迟到的合成结果被丢弃，状态不复活
        task.await.unwrap();
        assert_eq!(orchestrator.snapshot().state, PlaybackState::Stopped);
        assert!(!seen.lock().unwrap().contains(&PlaybackState::Playing));
        // 刚建立的音频句柄已被释放
        assert_eq!(sink.claimed_count(), 0);
    }

    #[tokio::test]
    async fn test_natural_end_returns_to_idle() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        orchestrator.start_reading().await;
        adapter.notify_playback_ended();

        assert_eq!(orchestrator.snapshot().state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_state_observer_receives_transitions() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        orchestrator.add_state_observer(Box::new(move |snap| {
            seen_clone.lock().unwrap().push(snap.state);
        }));

        orchestrator.start_reading().await;

        let states = seen.lock().unwrap().clone();
        assert!(states.contains(&PlaybackState::Generating));
        assert!(states.contains(&PlaybackState::Playing));
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_break_others() {
        let (adapter, _sink) = fake_adapter();
        let orchestrator = ReadingOrchestrator::new(adapter.clone(), text_source(&["内容。"]));

        orchestrator.add_state_observer(Box::new(|_| panic!("faulty observer")));
        let seen = Arc::new(Mutex::new(0_usize));
        let seen_clone = seen.clone();
        orchestrator.add_state_observer(Box::new(move |_| {
            *seen_clone.lock().unwrap() += 1;
        }));

        orchestrator.start_reading().await;

        assert!(*seen.lock().unwrap() >= 2);
    }

    #[test]
    fn test_join_chunks_terminates_headings() {
        let chunks = vec![
            TextChunk::new("第一章", ElementKind::Heading),
            TextChunk::new("正文内容。", ElementKind::Paragraph),
        ];
        assert_eq!(join_chunks(&chunks), "第一章.\n正文内容。");
    }
}
