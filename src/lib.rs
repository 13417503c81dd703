//! Lector - 文档朗读 TTS 编排系统
//!
//! 架构设计: Hexagonal Architecture（端口 + 适配器）
//!
//! 领域层 (domain/):
//! - playback: 播放状态机与状态快照
//! - voice: 音色与后端目录值对象
//! - chunking: 文档文本分块
//!
//! 应用层 (application/):
//! - ports: 端口定义（PlaybackAdapter, TextSource, TextFormatter, AudioSink）
//! - services: 编排服务、音色管理、快捷键分发、服务束工厂
//! - error: 应用层错误分类
//!
//! 基础设施层 (infrastructure/):
//! - adapters/tts: ElevenLabs / OpenAI / Fake 播放适配器
//! - adapters/text: 文件文本源与默认文本格式化器
//! - audio: 音频输出槽实现

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
