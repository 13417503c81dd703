//! OpenAI Adapter - 调用 OpenAI 语音合成服务
//!
//! 实现 PlaybackAdapterPort trait，通过 HTTP 调用 OpenAI API
//!
//! 外部 API:
//! POST /v1/audio/speech   (header: Authorization: Bearer <key>)
//! Request: {"model": "...", "input": "...", "voice": "...", "speed": 1.0} (JSON)
//! Response: audio binary
//!
//! 音色目录是固定的内置列表，API 不提供查询端点。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::application::ports::{
    AdapterError, AudioSinkPort, EventListener, ListenerId, PlaybackAdapterPort,
    PlaybackEventKind, RequestId, TextFormatterPort,
};
use crate::domain::{AdapterType, VoiceDescriptor, VoiceGender};
use crate::infrastructure::adapters::tts::core::AdapterCore;

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeechRequest {
    /// 合成模型
    model: String,
    /// 要合成的文本
    input: String,
    /// 音色名
    voice: String,
    /// 语速倍率
    speed: f32,
}

/// OpenAI 客户端配置
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API 基础 URL
    pub base_url: String,
    /// API Key（Bearer token）
    pub api_key: String,
    /// 合成模型
    pub model: String,
    /// 语速倍率
    pub speed: f32,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "tts-1".to_string(),
            speed: 1.0,
            timeout_secs: 30,
        }
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// 内置音色目录
fn builtin_voices() -> Vec<VoiceDescriptor> {
    vec![
        VoiceDescriptor::new("alloy", "Alloy", "en", VoiceGender::Neutral),
        VoiceDescriptor::new("echo", "Echo", "en", VoiceGender::Male),
        VoiceDescriptor::new("fable", "Fable", "en", VoiceGender::Male),
        VoiceDescriptor::new("onyx", "Onyx", "en", VoiceGender::Male),
        VoiceDescriptor::new("nova", "Nova", "en", VoiceGender::Female),
        VoiceDescriptor::new("shimmer", "Shimmer", "en", VoiceGender::Female),
    ]
}

/// OpenAI 播放适配器
pub struct OpenAiAdapter {
    client: Client,
    config: OpenAiConfig,
    core: AdapterCore,
}

impl OpenAiAdapter {
    pub fn new(
        config: OpenAiConfig,
        sink: Arc<dyn AudioSinkPort>,
        formatter: Arc<dyn TextFormatterPort>,
    ) -> Result<Self, AdapterError> {
        if config.api_key.trim().is_empty() {
            return Err(AdapterError::Validation(
                "OpenAI API key is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            core: AdapterCore::new(AdapterType::OpenAi, sink, formatter),
        })
    }

    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url)
    }

    async fn synthesize(&self, voice: &str, input: String) -> Result<Vec<u8>, AdapterError> {
        let request = SpeechRequest {
            model: self.config.model.clone(),
            input,
            voice: voice.to_string(),
            speed: self.config.speed,
        };

        tracing::debug!(
            url = %self.speech_url(),
            voice = %request.voice,
            text_len = request.input.len(),
            "Sending OpenAI speech request"
        );

        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AdapterError::Network(e.to_string())
                } else {
                    AdapterError::Service(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str().map(str::to_string))
                })
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(AdapterError::Service(format!("HTTP {}: {}", status, message)));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AdapterError::Network(format!("Failed to read audio: {}", e)))?
            .to_vec();

        tracing::info!(audio_size = audio.len(), "OpenAI synthesis completed");
        Ok(audio)
    }
}

#[async_trait]
impl PlaybackAdapterPort for OpenAiAdapter {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::OpenAi
    }

    async fn play(&self, text: &str) -> Result<RequestId, AdapterError> {
        let voice = self.core.selected().ok_or(AdapterError::NoVoiceSelected)?;
        let normalized = self.core.format(text)?;

        let audio = match self.synthesize(&voice, normalized).await {
            Ok(audio) => audio,
            Err(e) => {
                self.core.emit_error(e.to_string());
                return Err(e);
            }
        };

        self.core.begin_playback(audio)
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn resume(&self) {
        self.core.resume();
    }

    fn stop(&self) {
        self.core.stop();
    }

    fn subscribe(&self, kind: PlaybackEventKind, listener: EventListener) -> ListenerId {
        self.core.subscribe(kind, listener)
    }

    fn unsubscribe(&self, kind: PlaybackEventKind, id: ListenerId) {
        self.core.unsubscribe(kind, id);
    }

    async fn voices(&self) -> Result<Vec<VoiceDescriptor>, AdapterError> {
        Ok(builtin_voices())
    }

    fn set_voice(&self, voice_id: &str) -> Result<(), AdapterError> {
        // 目录之外的 id 照常接受；是否可解析由上层的音色目录判断
        if !builtin_voices().iter().any(|v| v.id == voice_id) {
            tracing::warn!(voice_id = %voice_id, "voice not in builtin OpenAI catalog");
        }
        self.core.set_selected(voice_id);
        Ok(())
    }

    fn selected_voice(&self) -> Option<String> {
        self.core.selected()
    }

    fn notify_playback_ended(&self) {
        self.core.handle_ended();
    }

    fn destroy(&self) {
        self.core.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::text::DefaultTextFormatter;
    use crate::infrastructure::audio::NullAudioSink;

    fn adapter(config: OpenAiConfig) -> Result<OpenAiAdapter, AdapterError> {
        OpenAiAdapter::new(
            config,
            Arc::new(NullAudioSink::new()),
            Arc::new(DefaultTextFormatter::default()),
        )
    }

    #[test]
    fn test_config_default() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com");
        assert_eq!(config.model, "tts-1");
        assert_eq!(config.speed, 1.0);
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::new("key")
            .with_model("tts-1-hd")
            .with_speed(1.25)
            .with_timeout(60);
        assert_eq!(config.model, "tts-1-hd");
        assert_eq!(config.speed, 1.25);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = adapter(OpenAiConfig::default());
        assert!(matches!(result, Err(AdapterError::Validation(_))));
    }

    #[tokio::test]
    async fn test_builtin_catalog_is_stable() {
        let adapter = adapter(OpenAiConfig::new("key")).unwrap();
        let voices = adapter.voices().await.unwrap();
        assert_eq!(voices.len(), 6);
        assert!(voices.iter().any(|v| v.id == "nova" && v.gender == VoiceGender::Female));
    }

    #[test]
    fn test_set_voice_accepts_ids_outside_catalog() {
        let adapter = adapter(OpenAiConfig::new("key")).unwrap();
        adapter.set_voice("onyx").unwrap();
        assert_eq!(adapter.selected_voice(), Some("onyx".to_string()));

        // 目录外的 id 也被接受，缺席由音色目录的解析结果体现
        adapter.set_voice("no-such-voice").unwrap();
        assert_eq!(adapter.selected_voice(), Some("no-such-voice".to_string()));
    }

    #[tokio::test]
    async fn test_play_without_voice_is_no_voice_selected() {
        let adapter = adapter(OpenAiConfig::new("key")).unwrap();
        let result = adapter.play("一段文本。").await;
        assert!(matches!(result, Err(AdapterError::NoVoiceSelected)));
    }
}
