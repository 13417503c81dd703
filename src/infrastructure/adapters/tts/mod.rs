//! TTS Adapters - 合成后端实现

mod core;
mod elevenlabs;
mod fake;
mod openai;

pub use elevenlabs::{ElevenLabsAdapter, ElevenLabsConfig};
pub use fake::FakeAdapter;
pub use openai::{OpenAiAdapter, OpenAiConfig};
