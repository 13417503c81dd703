//! Lector - 文档朗读 TTS 编排系统
//!
//! 架构:
//! - Domain: playback / voice / chunking
//! - Application: ports, services (orchestrator, voice manager, shortcuts, bundle)
//! - Infrastructure: adapters (tts, text), audio

use std::sync::Arc;
use std::time::Duration;

use lector::application::services::{
    FactoryCallbacks, ServiceBundleFactory,
};
use lector::application::{PlaybackAdapterPort, SpeechError, TextSourcePort};
use lector::config::{load_config, print_config};
use lector::domain::{AdapterType, ChunkConfig};
use lector::infrastructure::{
    DefaultTextFormatter, ElevenLabsAdapter, ElevenLabsConfig, FileTextSource, NullAudioSink,
    OpenAiAdapter, OpenAiConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},lector={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Lector - 文档朗读 TTS 编排系统");
    print_config(&config);

    let default_adapter = AdapterType::parse(&config.playback.default_adapter)
        .ok_or_else(|| anyhow::anyhow!("Unknown adapter: {}", config.playback.default_adapter))?;

    // 共享协作者: 音频输出槽与文本格式化器
    let sink = Arc::new(NullAudioSink::new());
    let formatter = DefaultTextFormatter::shared(config.playback.max_text_chars);

    // 适配器构造器: 按后端类型实例化
    let elevenlabs_section = config.elevenlabs.clone();
    let openai_section = config.openai.clone();
    let adapter_sink = sink.clone();
    let adapter_formatter = formatter.clone();
    let adapter_factory = Box::new(move |kind: AdapterType| match kind {
        AdapterType::ElevenLabs => {
            let adapter_config = ElevenLabsConfig::new(elevenlabs_section.api_key.clone())
                .with_base_url(elevenlabs_section.base_url.clone())
                .with_model(elevenlabs_section.model_id.clone())
                .with_timeout(elevenlabs_section.timeout_secs);
            let adapter = ElevenLabsAdapter::new(
                adapter_config,
                adapter_sink.clone(),
                adapter_formatter.clone(),
            )
            .map_err(SpeechError::from)?;
            Ok(Arc::new(adapter) as Arc<dyn PlaybackAdapterPort>)
        }
        AdapterType::OpenAi => {
            let adapter_config = OpenAiConfig::new(openai_section.api_key.clone())
                .with_base_url(openai_section.base_url.clone())
                .with_model(openai_section.model.clone())
                .with_speed(openai_section.speed)
                .with_timeout(openai_section.timeout_secs);
            let adapter = OpenAiAdapter::new(
                adapter_config,
                adapter_sink.clone(),
                adapter_formatter.clone(),
            )
            .map_err(SpeechError::from)?;
            Ok(Arc::new(adapter) as Arc<dyn PlaybackAdapterPort>)
        }
    });

    // 文本源构造器
    let reading = config.reading.clone();
    let text_source_factory = Box::new(move || {
        let chunking = ChunkConfig {
            min_chunk_chars: reading.min_chunk_chars,
            max_chunk_chars: reading.max_chunk_chars,
        };
        Arc::new(FileTextSource::new(reading.source_path.clone(), chunking))
            as Arc<dyn TextSourcePort>
    });

    let callbacks = FactoryCallbacks {
        on_state_change: Some(Arc::new(|snapshot| {
            tracing::info!(state = %snapshot.state, "playback state");
        })),
        on_adapter_switch: Some(Arc::new(|kind| {
            tracing::info!(backend = %kind, "backend switched");
        })),
    };

    let factory = ServiceBundleFactory::new(
        adapter_factory,
        text_source_factory,
        Duration::from_millis(config.playback.throttle_ms),
        callbacks,
    );

    // 构建默认后端的服务束并开始朗读
    let bundle = factory
        .get_or_create(default_adapter)
        .map_err(|e| anyhow::anyhow!("Failed to build service bundle: {}", e))?;

    match bundle.voices.load_voices().await {
        Ok(Some(voice)) => tracing::info!(voice = %voice.id, "voice selected"),
        Ok(None) => tracing::warn!("no voice selected"),
        Err(e) => tracing::warn!(error = %e, "voice catalog unavailable"),
    }

    bundle.orchestrator.start_reading().await;

    // 等待退出信号后有序销毁
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    factory.destroy_current();

    Ok(())
}
