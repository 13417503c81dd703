//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（PlaybackAdapter、TextSource、TextFormatter、AudioSink）
//! - services: 编排服务（朗读编排、音色管理、快捷键、服务束工厂）
//! - error: 应用层错误定义

pub mod error;
pub mod ports;
pub mod services;

// Re-exports
pub use error::SpeechError;

pub use ports::{
    // Audio sink
    AudioClip,
    AudioSinkPort,
    SinkError,
    // Playback adapter
    AdapterError,
    EventListener,
    ListenerId,
    PlaybackAdapterPort,
    PlaybackEvent,
    PlaybackEventKind,
    RequestId,
    // Text formatter
    FormatError,
    TextFormatterPort,
    // Text source
    TextChunk,
    TextSourceError,
    TextSourcePort,
};

pub use services::{
    // Service bundle
    AdapterFactory,
    FactoryCallbacks,
    ServiceBundle,
    ServiceBundleFactory,
    StateCallback,
    SwitchCallback,
    TextSourceFactory,
    // Shortcuts
    Clock,
    DispatchOutcome,
    EventTarget,
    KeyboardDispatcher,
    KeyCombo,
    KeyInput,
    ShortcutAction,
    ShortcutBinding,
    SystemClock,
    // Orchestrator
    ReadingOrchestrator,
    // Voice manager
    VoiceChangeCallback,
    VoiceError,
    VoiceListState,
    VoiceManager,
};
