use serde::{Deserialize, Serialize};

use crate::i18n::tr;
use crate::settings::BackendSettings;

pub mod api;
pub mod history;

/// Keyword explanations rendered as the tooltip's definitions block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TranslationDetails {
    pub definitions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Example {
    pub text: String,
    pub translation: String,
}

/// Normalized translation payload, the only shape the tooltip renderer
/// consumes. Produced by the backend client or a local fallback constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationResult {
    pub original: String,
    pub translation: String,
    pub pronunciation: String,
    pub source_language: String,
    pub target_language: String,
    pub details: TranslationDetails,
    pub examples: Vec<Example>,
    /// Set when the source language has no translation path; rendered as an
    /// ordinary result, never as an error.
    pub unsupported: bool,
}

/// Locally constructed stand-in shown when the backend is unreachable or its
/// reply is unusable. The user always gets visual feedback once extraction
/// began.
pub fn fallback_result(text: &str, source_language: &str) -> TranslationResult {
    let pronunciation = if source_language == "ja" {
        tr("fallback-no-pronunciation")
    } else {
        String::new()
    };
    TranslationResult {
        original: text.to_string(),
        translation: tr("fallback-unavailable"),
        pronunciation,
        source_language: source_language.to_string(),
        target_language: "zh".to_string(),
        ..Default::default()
    }
}

pub fn unsupported_result(text: &str, source_language: &str) -> TranslationResult {
    TranslationResult {
        original: text.to_string(),
        translation: tr("unsupported-language"),
        source_language: source_language.to_string(),
        target_language: "zh".to_string(),
        unsupported: true,
        ..Default::default()
    }
}

/// Sentinel content used when a frame's document cannot be reached.
pub fn cross_origin_sentinel() -> String {
    tr("cross-origin-frame")
}

/// Dispatches lookups by source language: Japanese goes to the
/// chat-completion backend, English to the local provider, everything else
/// becomes a flagged unsupported result.
pub struct Router {
    backend: BackendSettings,
}

impl Router {
    pub fn new(backend: BackendSettings) -> Self {
        Self { backend }
    }

    pub fn set_backend(&mut self, backend: BackendSettings) {
        self.backend = backend;
    }

    pub fn translate(&self, text: &str, source_language: &str) -> TranslationResult {
        match source_language {
            "ja" => match api::translate_japanese(&self.backend, text) {
                Ok(outcome) => {
                    if let Err(err) = history::record_entry(
                        text,
                        &outcome.result.translation,
                        source_language,
                        outcome.latency_ms,
                    ) {
                        tracing::warn!("failed to record lookup history: {}", err);
                    }
                    outcome.result
                }
                Err(err) => {
                    tracing::warn!(status = ?err.status, "japanese lookup failed: {}", err.message);
                    fallback_result(text, source_language)
                }
            },
            "en" => english_result(text),
            other => unsupported_result(text, other),
        }
    }
}

/// English lookups have no online path; a templated local result keeps the
/// tooltip populated.
fn english_result(text: &str) -> TranslationResult {
    TranslationResult {
        original: text.to_string(),
        translation: format!("\u{201c}{}\u{201d}的中文翻译", text),
        pronunciation: String::new(),
        source_language: "en".to_string(),
        target_language: "zh".to_string(),
        details: TranslationDetails::default(),
        examples: vec![Example {
            text: format!("The word \u{201c}{}\u{201d} is commonly used in this context.", text),
            translation: format!("\u{201c}{}\u{201d}这个词在这种情况下经常使用。", text),
        }],
        unsupported: false,
    }
}
