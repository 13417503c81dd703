//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 朗读文本源配置
    #[serde(default)]
    pub reading: ReadingConfig,

    /// 播放编排配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// ElevenLabs 后端配置
    #[serde(default)]
    pub elevenlabs: ElevenLabsSection,

    /// OpenAI 后端配置
    #[serde(default)]
    pub openai: OpenAiSection,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reading: ReadingConfig::default(),
            playback: PlaybackConfig::default(),
            elevenlabs: ElevenLabsSection::default(),
            openai: OpenAiSection::default(),
            log: LogConfig::default(),
        }
    }
}

/// 朗读文本源配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReadingConfig {
    /// 文本文件路径
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// 最大分块字符数
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// 最小分块字符数
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("data/document.txt")
}

fn default_max_chunk_chars() -> usize {
    500
}

fn default_min_chunk_chars() -> usize {
    20
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            max_chunk_chars: default_max_chunk_chars(),
            min_chunk_chars: default_min_chunk_chars(),
        }
    }
}

/// 播放编排配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// 默认合成后端（elevenlabs / openai）
    #[serde(default = "default_adapter")]
    pub default_adapter: String,

    /// 开始朗读快捷键的节流窗口（毫秒）
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// 单次合成请求的文本长度上限（字符）
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_adapter() -> String {
    "elevenlabs".to_string()
}

fn default_throttle_ms() -> u64 {
    1000
}

fn default_max_text_chars() -> usize {
    4096
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_adapter: default_adapter(),
            throttle_ms: default_throttle_ms(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

/// ElevenLabs 后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct ElevenLabsSection {
    /// API 基础 URL
    #[serde(default = "default_elevenlabs_url")]
    pub base_url: String,

    /// API Key
    #[serde(default)]
    pub api_key: String,

    /// 合成模型
    #[serde(default = "default_elevenlabs_model")]
    pub model_id: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,
}

fn default_elevenlabs_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_elevenlabs_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_synthesis_timeout() -> u64 {
    30
}

impl Default for ElevenLabsSection {
    fn default() -> Self {
        Self {
            base_url: default_elevenlabs_url(),
            api_key: String::new(),
            model_id: default_elevenlabs_model(),
            timeout_secs: default_synthesis_timeout(),
        }
    }
}

/// OpenAI 后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSection {
    /// API 基础 URL
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// API Key
    #[serde(default)]
    pub api_key: String,

    /// 合成模型
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// 语速倍率
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// 请求超时时间（秒）
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "tts-1".to_string()
}

fn default_speed() -> f32 {
    1.0
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            api_key: String::new(),
            model: default_openai_model(),
            speed: default_speed(),
            timeout_secs: default_synthesis_timeout(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.playback.default_adapter, "elevenlabs");
        assert_eq!(config.playback.throttle_ms, 1000);
        assert_eq!(config.elevenlabs.base_url, "https://api.elevenlabs.io");
        assert_eq!(config.openai.model, "tts-1");
    }

    #[test]
    fn test_toml_section_parse() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [playback]
            default_adapter = "openai"
            throttle_ms = 500

            [openai]
            api_key = "sk-test"
            speed = 1.25
            "#,
        )
        .unwrap();

        assert_eq!(parsed.playback.default_adapter, "openai");
        assert_eq!(parsed.playback.throttle_ms, 500);
        assert_eq!(parsed.openai.api_key, "sk-test");
        assert_eq!(parsed.openai.speed, 1.25);
        // 未出现的 section 取默认值
        assert_eq!(parsed.reading.max_chunk_chars, 500);
    }
}
