//! Domain Layer - 领域层
//!
//! 包含编排核心的纯领域模型:
//! - playback: 播放状态机
//! - voice: 音色与后端目录
//! - chunking: 文档文本分块

pub mod chunking;
pub mod playback;
pub mod voice;

pub use chunking::{split_into_chunks, ChunkConfig, ElementKind};
pub use playback::{PlaybackState, ReadingSnapshot};
pub use voice::{adapter_catalog, AdapterDescriptor, AdapterType, VoiceDescriptor, VoiceGender};
