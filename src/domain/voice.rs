//! Voice & Adapter Catalog - 音色与后端目录值对象

use serde::{Deserialize, Serialize};

/// 音色性别标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Male,
    Female,
    Neutral,
}

impl VoiceGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Male => "male",
            VoiceGender::Female => "female",
            VoiceGender::Neutral => "neutral",
        }
    }

    /// 宽松解析供应商返回的性别标签
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Some(VoiceGender::Male),
            "female" | "f" => Some(VoiceGender::Female),
            "neutral" | "androgynous" => Some(VoiceGender::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 音色描述符
///
/// 由 VoiceManager.load_voices() 整体替换，归 VoiceManager 所有
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// 供应商侧稳定 ID
    pub id: String,
    /// 展示名称
    pub name: String,
    /// 语言标签 (BCP-47)
    pub language: String,
    /// 性别标签
    pub gender: VoiceGender,
}

impl VoiceDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
        gender: VoiceGender,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            gender,
        }
    }
}

/// 播放后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    ElevenLabs,
    OpenAi,
}

impl AdapterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterType::ElevenLabs => "elevenlabs",
            AdapterType::OpenAi => "openai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "elevenlabs" => Some(AdapterType::ElevenLabs),
            "openai" => Some(AdapterType::OpenAi),
            _ => None,
        }
    }

    /// 目录顺序中的下一个已实现后端（用于快捷键循环切换）
    pub fn next(&self) -> AdapterType {
        let catalog = adapter_catalog();
        let pos = catalog
            .iter()
            .position(|d| d.kind == *self)
            .unwrap_or(0);
        catalog
            .iter()
            .cycle()
            .skip(pos + 1)
            .take(catalog.len())
            .find(|d| d.implemented)
            .map(|d| d.kind)
            .unwrap_or(*self)
    }
}

impl std::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 后端描述符（静态目录项，只读）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdapterDescriptor {
    pub kind: AdapterType,
    pub display_name: &'static str,
    pub implemented: bool,
}

/// 可选后端静态目录
pub fn adapter_catalog() -> &'static [AdapterDescriptor] {
    &[
        AdapterDescriptor {
            kind: AdapterType::ElevenLabs,
            display_name: "ElevenLabs",
            implemented: true,
        },
        AdapterDescriptor {
            kind: AdapterType::OpenAi,
            display_name: "OpenAI TTS",
            implemented: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse_loose() {
        assert_eq!(VoiceGender::parse("Female"), Some(VoiceGender::Female));
        assert_eq!(VoiceGender::parse("m"), Some(VoiceGender::Male));
        assert_eq!(VoiceGender::parse("robot"), None);
    }

    #[test]
    fn test_adapter_type_roundtrip() {
        assert_eq!(AdapterType::parse("elevenlabs"), Some(AdapterType::ElevenLabs));
        assert_eq!(AdapterType::parse("OpenAI"), Some(AdapterType::OpenAi));
        assert_eq!(AdapterType::parse("azure"), None);
    }

    #[test]
    fn test_next_cycles_catalog() {
        assert_eq!(AdapterType::ElevenLabs.next(), AdapterType::OpenAi);
        assert_eq!(AdapterType::OpenAi.next(), AdapterType::ElevenLabs);
    }

    #[test]
    fn test_catalog_is_marked_implemented() {
        assert!(adapter_catalog().iter().all(|d| d.implemented));
    }
}
