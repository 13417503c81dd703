//! Keyboard Dispatcher - 全局快捷键分发
//!
//! 把全局按键组合绑定到编排动作。来自可编辑 UI 元素的按键一律
//! 不处理；"开始朗读"类动作带节流窗口，防止连击触发重复合成。
//!
//! 时钟通过 Clock trait 注入，节流行为可确定性测试。

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::application::error::panic_message;
use crate::application::services::lock_unpoisoned;

/// 可编辑目标标签（大小写不敏感匹配）
const EDITABLE_TAGS: &[&str] = &["input", "textarea", "select"];

/// 时钟源
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 系统单调时钟
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 按键组合（查找 key: 小写键值 + 显式修饰键标志）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyCombo {
    pub fn new(key: &str, ctrl: bool, alt: bool, shift: bool) -> Self {
        Self {
            key: key.to_lowercase(),
            ctrl,
            alt,
            shift,
        }
    }

    /// Shift + 键
    pub fn shift(key: &str) -> Self {
        Self::new(key, false, false, true)
    }

    /// 无修饰键
    pub fn bare(key: &str) -> Self {
        Self::new(key, false, false, false)
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        write!(f, "{}", self.key)
    }
}

/// 按键事件的目标元素信息（由 UI 协作者提供）
#[derive(Debug, Clone)]
pub struct EventTarget {
    /// 元素标签名
    pub tag: String,
    /// 是否 contenteditable
    pub content_editable: bool,
}

/// 一次按键输入
#[derive(Debug, Clone)]
pub struct KeyInput {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    /// 事件目标；None 表示目标不可编辑（如 body）
    pub target: Option<EventTarget>,
}

impl KeyInput {
    pub fn new(key: &str, ctrl: bool, alt: bool, shift: bool) -> Self {
        Self {
            key: key.to_string(),
            ctrl,
            alt,
            shift,
            target: None,
        }
    }

    pub fn with_target(mut self, target: EventTarget) -> Self {
        self.target = Some(target);
        self
    }

    fn combo(&self) -> KeyCombo {
        KeyCombo::new(&self.key, self.ctrl, self.alt, self.shift)
    }

    /// 目标是否可编辑（input / textarea / select / contenteditable）
    fn is_editable_target(&self) -> bool {
        match &self.target {
            Some(target) => {
                target.content_editable
                    || EDITABLE_TAGS
                        .iter()
                        .any(|tag| target.tag.eq_ignore_ascii_case(tag))
            }
            None => false,
        }
    }
}

/// 快捷键动作
pub type ShortcutAction = Arc<dyn Fn() + Send + Sync>;

/// 一条快捷键绑定
pub struct ShortcutBinding {
    pub combo: KeyCombo,
    pub description: String,
    pub action: ShortcutAction,
    /// 节流窗口；窗口内的重复触发被抑制，窗口过期后重新计时
    pub throttle: Option<Duration>,
    /// 分发器停用时仍然生效（仅用于启用/停用切换绑定本身）
    pub active_when_disabled: bool,
}

impl ShortcutBinding {
    pub fn new(combo: KeyCombo, description: impl Into<String>, action: ShortcutAction) -> Self {
        Self {
            combo,
            description: description.into(),
            action,
            throttle: None,
            active_when_disabled: false,
        }
    }

    pub fn with_throttle(mut self, window: Duration) -> Self {
        self.throttle = Some(window);
        self
    }

    pub fn active_when_disabled(mut self) -> Self {
        self.active_when_disabled = true;
        self
    }
}

/// 分发结果
///
/// Handled / Throttled 都要求调用方抑制浏览器默认行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 动作已执行（动作 panic 也计入，已捕获记录）
    Handled,
    /// 命中但处于节流窗口内，动作未执行
    Throttled,
    /// 未命中 / 已停用 / 可编辑目标
    Ignored,
}

impl DispatchOutcome {
    pub fn suppress_default(&self) -> bool {
        !matches!(self, DispatchOutcome::Ignored)
    }
}

struct Slot {
    binding: ShortcutBinding,
    last_fired: Option<Instant>,
}

/// 快捷键分发器
pub struct KeyboardDispatcher {
    slots: Mutex<HashMap<KeyCombo, Slot>>,
    enabled: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl KeyboardDispatcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// 注册快捷键集合，原子替换之前注册的全部绑定
    pub fn register(&self, bindings: Vec<ShortcutBinding>) {
        let mut map = HashMap::with_capacity(bindings.len());
        for binding in bindings {
            if let Some(previous) = map.insert(binding.combo.clone(), Slot {
                binding,
                last_fired: None,
            }) {
                tracing::warn!(combo = %previous.binding.combo, "duplicate shortcut binding replaced");
            }
        }
        tracing::debug!(count = map.len(), "shortcuts registered");
        *lock_unpoisoned(&self.slots) = map;
    }

    /// 处理一次按键输入
    pub fn handle_key(&self, input: &KeyInput) -> DispatchOutcome {
        if input.is_editable_target() {
            return DispatchOutcome::Ignored;
        }

        let combo = input.combo();
        let enabled = self.enabled.load(Ordering::SeqCst);

        let action = {
            let mut slots = lock_unpoisoned(&self.slots);
            let slot = match slots.get_mut(&combo) {
                Some(slot) => slot,
                None => return DispatchOutcome::Ignored,
            };

            if !enabled && !slot.binding.active_when_disabled {
                return DispatchOutcome::Ignored;
            }

            if let Some(window) = slot.binding.throttle {
                let now = self.clock.now();
                if let Some(last) = slot.last_fired {
                    if now.duration_since(last) < window {
                        tracing::debug!(combo = %combo, "shortcut throttled");
                        return DispatchOutcome::Throttled;
                    }
                }
                slot.last_fired = Some(now);
            }

            slot.binding.action.clone()
        };

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| action())) {
            tracing::error!(
                combo = %combo,
                error = %panic_message(payload.as_ref()),
                "shortcut action panicked"
            );
        }
        DispatchOutcome::Handled
    }

    /// 全局启用/停用（廉价开关，不卸载绑定）
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::debug!(enabled, "shortcut dispatch toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// 切换启用状态，返回新状态
    pub fn toggle_enabled(&self) -> bool {
        let was = self.enabled.fetch_xor(true, Ordering::SeqCst);
        !was
    }

    /// 卸载全部绑定
    pub fn cleanup(&self) {
        lock_unpoisoned(&self.slots).clear();
    }

    /// 已注册的绑定描述（供 UI 展示帮助）
    pub fn registered(&self) -> Vec<(KeyCombo, String)> {
        lock_unpoisoned(&self.slots)
            .values()
            .map(|slot| (slot.binding.combo.clone(), slot.binding.description.clone()))
            .collect()
    }
}
