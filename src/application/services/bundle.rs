//! Service Bundle Factory - 服务束工厂与生命周期
//!
//! 为选定后端构建一致的服务集合（适配器 + 文本源 + 编排 + 快捷键 +
//! 音色管理），并保证切换后端时先有序销毁旧束再构建新束——同一音频
//! 输出上绝不同时挂两个适配器。
//!
//! 不变量: 每个编排消费者至多一个活动服务束。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::application::error::{panic_message, SpeechError};
use crate::application::ports::{PlaybackAdapterPort, TextSourcePort};
use crate::application::services::{
    lock_unpoisoned, Clock, KeyCombo, KeyboardDispatcher, ReadingOrchestrator, ShortcutBinding,
    SystemClock, VoiceManager,
};
use crate::domain::{AdapterType, PlaybackState, ReadingSnapshot};

/// 适配器构造器（type → 实例，注册表见 §后端目录）
pub type AdapterFactory =
    Box<dyn Fn(AdapterType) -> Result<Arc<dyn PlaybackAdapterPort>, SpeechError> + Send + Sync>;

/// 文本源构造器
pub type TextSourceFactory = Box<dyn Fn() -> Arc<dyn TextSourcePort> + Send + Sync>;

/// 状态变更回调
pub type StateCallback = Arc<dyn Fn(&ReadingSnapshot) + Send + Sync>;

/// 后端切换回调
pub type SwitchCallback = Arc<dyn Fn(AdapterType) + Send + Sync>;

/// 工厂回调集合
#[derive(Default)]
pub struct FactoryCallbacks {
    pub on_state_change: Option<StateCallback>,
    pub on_adapter_switch: Option<SwitchCallback>,
}

/// 一个后端的完整服务束
///
/// 所有成员通过 Arc 共享；克隆束只是克隆句柄，生命周期由工厂槽位管理
#[derive(Clone)]
pub struct ServiceBundle {
    pub adapter: Arc<dyn PlaybackAdapterPort>,
    pub text_source: Arc<dyn TextSourcePort>,
    pub orchestrator: Arc<ReadingOrchestrator>,
    pub voices: Arc<VoiceManager>,
    pub keyboard: Arc<KeyboardDispatcher>,
    adapter_type: AdapterType,
    created_at: DateTime<Utc>,
}

impl ServiceBundle {
    pub fn adapter_type(&self) -> AdapterType {
        self.adapter_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// 服务束工厂
pub struct ServiceBundleFactory {
    adapter_factory: AdapterFactory,
    text_source_factory: TextSourceFactory,
    clock: Arc<dyn Clock>,
    /// 开始朗读快捷键的节流窗口
    start_throttle: Duration,
    callbacks: FactoryCallbacks,
    slot: Mutex<Option<ServiceBundle>>,
}

impl ServiceBundleFactory {
    pub fn new(
        adapter_factory: AdapterFactory,
        text_source_factory: TextSourceFactory,
        start_throttle: Duration,
        callbacks: FactoryCallbacks,
    ) -> Arc<Self> {
        Self::with_clock(
            adapter_factory,
            text_source_factory,
            start_throttle,
            callbacks,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        adapter_factory: AdapterFactory,
        text_source_factory: TextSourceFactory,
        start_throttle: Duration,
        callbacks: FactoryCallbacks,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            adapter_factory,
            text_source_factory,
            clock,
            start_throttle,
            callbacks,
            slot: Mutex::new(None),
        })
    }

    /// 获取或创建服务束（重入安全的访问器）
    ///
    /// - 已有同类型束: 原样返回，无副作用
    /// - 已有异类型束: 先完整销毁旧束（停止播放、释放音频资源、
    ///   解绑监听器），再构建新束
    pub fn get_or_create(self: &Arc<Self>, kind: AdapterType) -> Result<ServiceBundle, SpeechError> {
        let mut slot = lock_unpoisoned(&self.slot);

        let mut switched = false;
        if let Some(existing) = slot.as_ref() {
            if existing.adapter_type == kind {
                return Ok(existing.clone());
            }
            tracing::info!(
                from = %existing.adapter_type,
                to = %kind,
                "switching playback backend"
            );
            Self::teardown(existing);
            *slot = None;
            switched = true;
        }

        let bundle = self.build(kind)?;
        *slot = Some(bundle.clone());
        drop(slot);

        if switched {
            if let Some(callback) = &self.callbacks.on_adapter_switch {
                let callback = callback.clone();
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(kind))) {
                    tracing::error!(
                        error = %panic_message(payload.as_ref()),
                        "adapter switch callback panicked"
                    );
                }
            }
        }

        Ok(bundle)
    }

    /// 当前束的后端类型
    pub fn current_adapter_type(&self) -> Option<AdapterType> {
        lock_unpoisoned(&self.slot).as_ref().map(|b| b.adapter_type)
    }

    /// 切换到目录中的下一个后端
    pub fn switch_to_next(self: &Arc<Self>) -> Result<ServiceBundle, SpeechError> {
        let current = self
            .current_adapter_type()
            .ok_or_else(|| SpeechError::validation("no active service bundle"))?;
        self.get_or_create(current.next())
    }

    /// 销毁当前束并清空槽位
    pub fn destroy_current(&self) {
        if let Some(bundle) = lock_unpoisoned(&self.slot).take() {
            Self::teardown(&bundle);
        }
    }

    /// 销毁一个服务束
    ///
    /// 每个成员的销毁独立防护，单个成员失败不阻断其余成员
    pub fn destroy(bundle: &ServiceBundle) {
        Self::teardown(bundle);
    }

    fn build(self: &Arc<Self>, kind: AdapterType) -> Result<ServiceBundle, SpeechError> {
        let adapter = (self.adapter_factory)(kind)?;
        let text_source = (self.text_source_factory)();

        let orchestrator = Arc::new(ReadingOrchestrator::new(
            adapter.clone(),
            text_source.clone(),
        ));
        if let Some(callback) = &self.callbacks.on_state_change {
            let callback = callback.clone();
            orchestrator.add_state_observer(Box::new(move |snapshot| callback(snapshot)));
        }

        let voices = Arc::new(VoiceManager::new(adapter.clone()));
        let keyboard = Arc::new(KeyboardDispatcher::new(self.clock.clone()));
        keyboard.register(self.default_shortcuts(&orchestrator, &keyboard));

        tracing::info!(backend = %kind, "service bundle created");

        Ok(ServiceBundle {
            adapter,
            text_source,
            orchestrator,
            voices,
            keyboard,
            adapter_type: kind,
            created_at: Utc::now(),
        })
    }

    /// 默认快捷键集合
    ///
    /// Shift+S 停止；Shift+P 开始/暂停/恢复（节流）；Escape 紧急停止
    /// （仅播放/暂停中）；Shift+T 切换后端；Shift+K 启用/停用切换
    fn default_shortcuts(
        self: &Arc<Self>,
        orchestrator: &Arc<ReadingOrchestrator>,
        keyboard: &Arc<KeyboardDispatcher>,
    ) -> Vec<ShortcutBinding> {
        let mut bindings = Vec::with_capacity(5);

        let orch = orchestrator.clone();
        bindings.push(
            ShortcutBinding::new(
                KeyCombo::shift("p"),
                "start / pause / resume reading",
                Arc::new(move || match orch.snapshot().state {
                    PlaybackState::Playing => orch.pause_reading(),
                    PlaybackState::Paused => orch.resume_reading(),
                    _ => {
                        let orch = orch.clone();
                        tokio::spawn(async move {
                            orch.start_reading().await;
                        });
                    }
                }),
            )
            .with_throttle(self.start_throttle),
        );

        let orch = orchestrator.clone();
        bindings.push(ShortcutBinding::new(
            KeyCombo::shift("s"),
            "stop reading",
            Arc::new(move || orch.stop_reading()),
        ));

        let orch = orchestrator.clone();
        bindings.push(ShortcutBinding::new(
            KeyCombo::bare("escape"),
            "emergency stop (while playing or paused)",
            Arc::new(move || {
                let state = orch.snapshot().state;
                if matches!(state, PlaybackState::Playing | PlaybackState::Paused) {
                    orch.stop_reading();
                }
            }),
        ));

        let factory = Arc::downgrade(self);
        bindings.push(ShortcutBinding::new(
            KeyCombo::shift("t"),
            "switch playback backend",
            Arc::new(move || {
                if let Some(factory) = factory.upgrade() {
                    if let Err(e) = factory.switch_to_next() {
                        tracing::error!(error = %e, "backend switch failed");
                    }
                }
            }),
        ));

        let dispatcher = Arc::downgrade(keyboard);
        bindings.push(
            ShortcutBinding::new(
                KeyCombo::shift("k"),
                "toggle shortcuts on/off",
                Arc::new(move || {
                    if let Some(dispatcher) = dispatcher.upgrade() {
                        let enabled = dispatcher.toggle_enabled();
                        tracing::info!(enabled, "shortcuts toggled");
                    }
                }),
            )
            .active_when_disabled(),
        );

        bindings
    }

    /// 有序销毁: 快捷键 → 编排（停止播放、解绑监听器）→ 音色缓存 →
    /// 适配器（释放音频资源）
    fn teardown(bundle: &ServiceBundle) {
        Self::guard("keyboard", || bundle.keyboard.cleanup());
        Self::guard("orchestrator", || {
            bundle.orchestrator.stop_reading();
            bundle.orchestrator.destroy();
        });
        Self::guard("voice_manager", || bundle.voices.cleanup());
        Self::guard("adapter", || bundle.adapter.destroy());
        tracing::info!(backend = %bundle.adapter_type, "service bundle destroyed");
    }

    fn guard(member: &'static str, f: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            tracing::error!(
                member,
                error = %panic_message(payload.as_ref()),
                "bundle member teardown failed"
            );
        }
    }
}
