//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod text;
pub mod tts;

pub use text::*;
pub use tts::*;
