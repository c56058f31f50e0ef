//! The model catalog. Keys are the stable identifiers clients send back;
//! ids are what the provider API expects.

use serde::Serialize;

/// Which upstream API serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    OpenAi,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelInfo {
    pub key: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub provider: ProviderKind,
}

/// Every model the API can route to. The first entry is the default.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        key: "llama-3.3-70b",
        id: "llama-3.3-70b-versatile",
        name: "Llama 3.3 70B",
        provider: ProviderKind::Groq,
    },
    ModelInfo {
        key: "llama-3.1-8b",
        id: "llama-3.1-8b-instant",
        name: "Llama 3.1 8B (Fast)",
        provider: ProviderKind::Groq,
    },
    ModelInfo {
        key: "mixtral-8x7b",
        id: "mixtral-8x7b-32768",
        name: "Mixtral 8x7B",
        provider: ProviderKind::Groq,
    },
    ModelInfo {
        key: "gemma2-9b",
        id: "gemma2-9b-it",
        name: "Gemma 2 9B",
        provider: ProviderKind::Groq,
    },
    ModelInfo {
        key: "gpt-4",
        id: "gpt-4",
        name: "GPT-4",
        provider: ProviderKind::OpenAi,
    },
    ModelInfo {
        key: "gpt-4-turbo",
        id: "gpt-4-turbo-preview",
        name: "GPT-4 Turbo",
        provider: ProviderKind::OpenAi,
    },
    ModelInfo {
        key: "gpt-3.5-turbo",
        id: "gpt-3.5-turbo",
        name: "GPT-3.5 Turbo",
        provider: ProviderKind::OpenAi,
    },
];

pub fn find_model(key: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.key == key)
}

/// Resolves a caller-supplied key, falling back to the default model when
/// the key is absent or unknown.
pub fn resolve_model(key: Option<&str>) -> &'static ModelInfo {
    key.and_then(find_model).unwrap_or(&MODELS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_model_by_key() {
        let model = find_model("gpt-4").unwrap();
        assert_eq!(model.id, "gpt-4");
        assert_eq!(model.provider, ProviderKind::OpenAi);
    }

    #[test]
    fn test_unknown_key_is_none() {
        assert!(find_model("claude-opus").is_none());
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        assert_eq!(resolve_model(None).key, MODELS[0].key);
        assert_eq!(resolve_model(Some("not-a-model")).key, MODELS[0].key);
        assert_eq!(resolve_model(Some("mixtral-8x7b")).key, "mixtral-8x7b");
    }

    #[test]
    fn test_catalog_keys_are_unique() {
        let mut keys: Vec<&str> = MODELS.iter().map(|m| m.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), MODELS.len());
    }
}
