//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::domain::AdapterType;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `LECTOR_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `LECTOR_PLAYBACK__DEFAULT_ADAPTER=openai`
/// - `LECTOR_ELEVENLABS__API_KEY=...`
/// - `LECTOR_READING__SOURCE_PATH=/data/book.txt`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("reading.source_path", "data/document.txt")?
        .set_default("reading.max_chunk_chars", 500)?
        .set_default("reading.min_chunk_chars", 20)?
        .set_default("playback.default_adapter", "elevenlabs")?
        .set_default("playback.throttle_ms", 1000)?
        .set_default("playback.max_text_chars", 4096)?
        .set_default("elevenlabs.base_url", "https://api.elevenlabs.io")?
        .set_default("elevenlabs.api_key", "")?
        .set_default("elevenlabs.model_id", "eleven_multilingual_v2")?
        .set_default("elevenlabs.timeout_secs", 30)?
        .set_default("openai.base_url", "https://api.openai.com")?
        .set_default("openai.api_key", "")?
        .set_default("openai.model", "tts-1")?
        .set_default("openai.speed", 1.0)?
        .set_default("openai.timeout_secs", 30)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: LECTOR_
    // 层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("LECTOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if AdapterType::parse(&config.playback.default_adapter).is_none() {
        return Err(ConfigError::ValidationError(format!(
            "Unknown default adapter: {}",
            config.playback.default_adapter
        )));
    }

    if config.playback.max_text_chars == 0 {
        return Err(ConfigError::ValidationError(
            "Max text chars cannot be 0".to_string(),
        ));
    }

    if config.reading.max_chunk_chars == 0 {
        return Err(ConfigError::ValidationError(
            "Max chunk chars cannot be 0".to_string(),
        ));
    }

    if config.reading.min_chunk_chars > config.reading.max_chunk_chars {
        return Err(ConfigError::ValidationError(
            "Min chunk chars cannot exceed max chunk chars".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Text Source: {:?}", config.reading.source_path);
    tracing::info!(
        "Chunking: {}-{} chars",
        config.reading.min_chunk_chars,
        config.reading.max_chunk_chars
    );
    tracing::info!("Default Adapter: {}", config.playback.default_adapter);
    tracing::info!("Start Throttle: {}ms", config.playback.throttle_ms);
    tracing::info!("Max Text Chars: {}", config.playback.max_text_chars);
    tracing::info!("ElevenLabs URL: {}", config.elevenlabs.base_url);
    tracing::info!("OpenAI URL: {}", config.openai.base_url);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_default_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_unknown_adapter() {
        let mut config = AppConfig::default();
        config.playback.default_adapter = "festival".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_text_limit() {
        let mut config = AppConfig::default();
        config.playback.max_text_chars = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_inverted_chunk_bounds() {
        let mut config = AppConfig::default();
        config.reading.min_chunk_chars = 1000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
            [playback]
            default_adapter = "openai"

            [reading]
            source_path = "/tmp/book.txt"
            "#
        )
        .unwrap();
        file.flush().unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.playback.default_adapter, "openai");
        assert_eq!(
            config.reading.source_path,
            std::path::PathBuf::from("/tmp/book.txt")
        );
        // 未覆盖的键保持默认
        assert_eq!(config.playback.throttle_ms, 1000);
    }
}
