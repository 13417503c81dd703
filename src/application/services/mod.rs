//! Application Services - 用例编排服务
//!
//! 包含:
//! - orchestrator: 朗读编排服务（播放状态机）
//! - voice_manager: 音色目录与选择管理
//! - shortcuts: 全局快捷键分发（带节流）
//! - bundle: 服务束工厂与生命周期管理

mod bundle;
mod orchestrator;
mod shortcuts;
mod voice_manager;

pub use bundle::{
    AdapterFactory, FactoryCallbacks, ServiceBundle, ServiceBundleFactory, StateCallback,
    SwitchCallback, TextSourceFactory,
};
pub use orchestrator::ReadingOrchestrator;
pub use shortcuts::{
    Clock, DispatchOutcome, EventTarget, KeyCombo, KeyInput, KeyboardDispatcher, ShortcutAction,
    ShortcutBinding, SystemClock,
};
pub use voice_manager::{VoiceChangeCallback, VoiceError, VoiceListState, VoiceManager};

use std::sync::{Mutex, MutexGuard};

/// 获取互斥锁，panic 毒化时回收内部值
///
/// 监听器 / 动作回调的 panic 已被防护捕获，毒化只可能来自
/// 持锁期间的内部缺陷，此时继续使用内部值比级联失败更合理
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
