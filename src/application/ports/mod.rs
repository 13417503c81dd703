//! Application Ports - 端口定义
//!
//! 定义应用层与基础设施层 / 外部协作者之间的抽象接口

mod audio_sink;
mod playback_adapter;
mod text_formatter;
mod text_source;

pub use audio_sink::{AudioClip, AudioSinkPort, SinkError};
pub use playback_adapter::{
    AdapterError, EventListener, ListenerId, PlaybackAdapterPort, PlaybackEvent,
    PlaybackEventKind, RequestId,
};
pub use text_formatter::{FormatError, TextFormatterPort};
pub use text_source::{TextChunk, TextSourceError, TextSourcePort};
