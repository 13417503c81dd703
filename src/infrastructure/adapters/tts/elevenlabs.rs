//! ElevenLabs Adapter - 调用 ElevenLabs 合成服务
//!
//! 实现 PlaybackAdapterPort trait，通过 HTTP 调用 ElevenLabs API
//!
//! 外部 API:
//! GET  /v1/voices                      (header: xi-api-key)
//! POST /v1/text-to-speech/{voice_id}   Request: {"text": "...", "model_id": "..."} (JSON)
//! Response: audio binary

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    AdapterError, AudioSinkPort, EventListener, ListenerId, PlaybackAdapterPort,
    PlaybackEventKind, RequestId, TextFormatterPort,
};
use crate::application::services::lock_unpoisoned;
use crate::domain::{AdapterType, VoiceDescriptor, VoiceGender};
use crate::infrastructure::adapters::tts::core::AdapterCore;

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SynthesisRequest {
    /// 要合成的文本
    text: String,
    /// 模型 ID
    model_id: String,
}

/// 音色列表响应
#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<RemoteVoice>,
}

#[derive(Debug, Deserialize)]
struct RemoteVoice {
    voice_id: String,
    name: String,
    #[serde(default)]
    labels: std::collections::HashMap<String, String>,
}

impl RemoteVoice {
    fn into_descriptor(self) -> VoiceDescriptor {
        let gender = self
            .labels
            .get("gender")
            .and_then(|g| VoiceGender::parse(g))
            .unwrap_or(VoiceGender::Neutral);
        let language = self
            .labels
            .get("language")
            .cloned()
            .unwrap_or_else(|| "en".to_string());
        VoiceDescriptor::new(self.voice_id, self.name, language, gender)
    }
}

/// ElevenLabs 客户端配置
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    /// API 基础 URL
    pub base_url: String,
    /// API Key（xi-api-key header）
    pub api_key: String,
    /// 合成模型
    pub model_id: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: String::new(),
            model_id: "eleven_multilingual_v2".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ElevenLabsConfig {
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

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// ElevenLabs 播放适配器
pub struct ElevenLabsAdapter {
    client: Client,
    config: ElevenLabsConfig,
    core: AdapterCore,
    /// 拉取过的音色目录缓存（原生按性别过滤用）
    voice_cache: Mutex<Vec<VoiceDescriptor>>,
}

impl ElevenLabsAdapter {
    pub fn new(
        config: ElevenLabsConfig,
        sink: Arc<dyn AudioSinkPort>,
        formatter: Arc<dyn TextFormatterPort>,
    ) -> Result<Self, AdapterError> {
        if config.api_key.trim().is_empty() {
            return Err(AdapterError::Validation(
                "ElevenLabs API key is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            core: AdapterCore::new(AdapterType::ElevenLabs, sink, formatter),
            voice_cache: Mutex::new(Vec::new()),
        })
    }

    fn voices_url(&self) -> String {
        format!("{}/v1/voices", self.config.base_url)
    }

    fn synthesis_url(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.config.base_url, voice_id)
    }

    /// 从错误响应体提取可读信息（JSON detail 字段优先）
    fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .and_then(|d| d.get("message").or(Some(d)))
                    .and_then(|m| m.as_str().map(str::to_string))
            })
            .unwrap_or_else(|| body.chars().take(200).collect());
        format!("HTTP {}: {}", status, detail)
    }

    async fn synthesize(&self, voice_id: &str, text: String) -> Result<Vec<u8>, AdapterError> {
        let request = SynthesisRequest {
            text,
            model_id: self.config.model_id.clone(),
        };

        tracing::debug!(
            url = %self.synthesis_url(voice_id),
            text_len = request.text.len(),
            "Sending ElevenLabs synthesis request"
        );

        let response = self
            .client
            .post(self.synthesis_url(voice_id))
            .header("xi-api-key", &self.config.api_key)
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
            return Err(AdapterError::Service(Self::error_detail(status, &body)));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AdapterError::Network(format!("Failed to read audio: {}", e)))?
            .to_vec();

        tracing::info!(audio_size = audio.len(), "ElevenLabs synthesis completed");
        Ok(audio)
    }
}

#[async_trait]
impl PlaybackAdapterPort for ElevenLabsAdapter {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::ElevenLabs
    }

    async fn play(&self, text: &str) -> Result<RequestId, AdapterError> {
        let voice_id = self.core.selected().ok_or(AdapterError::NoVoiceSelected)?;
        let normalized = self.core.format(text)?;

        let audio = match self.synthesize(&voice_id, normalized).await {
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
        let response = self
            .client
            .get(self.voices_url())
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Service(Self::error_detail(status, &body)));
        }

        let parsed: VoicesResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Service(format!("Invalid voices response: {}", e)))?;

        let voices: Vec<VoiceDescriptor> = parsed
            .voices
            .into_iter()
            .map(RemoteVoice::into_descriptor)
            .collect();

        *lock_unpoisoned(&self.voice_cache) = voices.clone();
        tracing::debug!(count = voices.len(), "ElevenLabs voice catalog fetched");
        Ok(voices)
    }

    fn set_voice(&self, voice_id: &str) -> Result<(), AdapterError> {
        self.core.set_selected(voice_id);
        Ok(())
    }

    fn selected_voice(&self) -> Option<String> {
        self.core.selected()
    }

    fn native_voices_by_gender(&self, gender: VoiceGender) -> Option<Vec<VoiceDescriptor>> {
        let cache = lock_unpoisoned(&self.voice_cache);
        if cache.is_empty() {
            return None;
        }
        Some(cache.iter().filter(|v| v.gender == gender).cloned().collect())
    }

    fn native_current_voice_gender(&self) -> Option<VoiceGender> {
        let selected = self.core.selected()?;
        lock_unpoisoned(&self.voice_cache)
            .iter()
            .find(|v| v.id == selected)
            .map(|v| v.gender)
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

    fn adapter(config: ElevenLabsConfig) -> Result<ElevenLabsAdapter, AdapterError> {
        ElevenLabsAdapter::new(
            config,
            Arc::new(NullAudioSink::new()),
            Arc::new(DefaultTextFormatter::default()),
        )
    }

    #[test]
    fn test_config_default() {
        let config = ElevenLabsConfig::default();
        assert_eq!(config.base_url, "https://api.elevenlabs.io");
        assert_eq!(config.model_id, "eleven_multilingual_v2");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_builder() {
        let config = ElevenLabsConfig::new("key")
            .with_base_url("http://localhost:9800")
            .with_model("eleven_turbo_v2")
            .with_timeout(10);
        assert_eq!(config.base_url, "http://localhost:9800");
        assert_eq!(config.model_id, "eleven_turbo_v2");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = adapter(ElevenLabsConfig::default());
        assert!(matches!(result, Err(AdapterError::Validation(_))));
    }

    #[tokio::test]
    async fn test_play_without_voice_is_no_voice_selected() {
        let adapter = adapter(ElevenLabsConfig::new("key")).unwrap();
        let result = adapter.play("一段文本。").await;
        assert!(matches!(result, Err(AdapterError::NoVoiceSelected)));
    }

    #[test]
    fn test_error_detail_prefers_json_message() {
        let body = r#"{"detail": {"status": "invalid_api_key", "message": "bad key"}}"#;
        let detail =
            ElevenLabsAdapter::error_detail(reqwest::StatusCode::UNAUTHORIZED, body);
        assert_eq!(detail, "HTTP 401 Unauthorized: bad key");
    }

    #[test]
    fn test_remote_voice_maps_labels() {
        let voice: RemoteVoice = serde_json::from_str(
            r#"{"voice_id": "v1", "name": "Rachel", "labels": {"gender": "female", "language": "en"}}"#,
        )
        .unwrap();
        let descriptor = voice.into_descriptor();
        assert_eq!(descriptor.id, "v1");
        assert_eq!(descriptor.gender, VoiceGender::Female);
        assert_eq!(descriptor.language, "en");
    }

    #[test]
    fn test_gender_filter_requires_fetched_catalog() {
        let adapter = adapter(ElevenLabsConfig::new("key")).unwrap();
        // 目录未拉取时返回 None，调用方回退本地过滤
        assert!(adapter.native_voices_by_gender(VoiceGender::Female).is_none());
    }
}
