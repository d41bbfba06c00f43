use serde::{Deserialize, Serialize};

use crate::language;
use crate::settings::{Settings, SettingsStore};
use crate::translate::{Router, TranslationResult};

/// Envelopes exchanged between the page side and the service side.
/// The `action` discriminator matches on the wire; unknown actions fail to
/// deserialize instead of being silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RuntimeRequest {
    Translate {
        text: String,
        source_language: String,
        request_id: u64,
    },
    SettingsUpdated {
        settings: Settings,
    },
    TestSettings,
}

/// Untagged: variants are tried in order, so the specific shapes must come
/// before the translation result, whose fields are all defaultable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeReply {
    Error { error: String },
    Ack { status: String, settings: Settings },
    Translation(TranslationResult),
}

/// Envelopes crossing the frame boundary, discriminated by `type` with the
/// transport's name prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum FrameMessage {
    #[serde(rename = "hoverTranslate:ping")]
    Ping { frame_id: String },
    #[serde(rename = "hoverTranslate:iframe-ready")]
    IframeReady { frame_id: String },
    #[serde(rename = "hoverTranslate:extract-text")]
    ExtractText { x: f64, y: f64, frame_id: String },
    #[serde(rename = "hoverTranslate:text-extracted")]
    TextExtracted {
        frame_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "hoverTranslate:iframe-updated")]
    IframeUpdated { frame_id: String },
}

/// Service-side dispatcher (the background-script counterpart): translation
/// by source language, settings write-through, settings echo.
pub fn handle_runtime_request(
    store: &mut SettingsStore,
    router: &Router,
    request: RuntimeRequest,
) -> RuntimeReply {
    match request {
        RuntimeRequest::Translate {
            text,
            source_language,
            request_id,
        } => {
            tracing::debug!(request_id, %source_language, "translate request");
            // A second opinion before spending a backend call on text that
            // only looked Japanese because of shared ideographs.
            if source_language == "ja" && !language::is_japanese_text(&text) {
                tracing::debug!(request_id, "text failed the strict Japanese check");
            }
            RuntimeReply::Translation(router.translate(&text, &source_language))
        }
        RuntimeRequest::SettingsUpdated { settings } => match store.set(settings) {
            Ok(()) => RuntimeReply::Ack {
                status: "settings updated".to_string(),
                settings: store.get().clone(),
            },
            Err(err) => RuntimeReply::Error {
                error: format!("failed to persist settings: {}", err),
            },
        },
        RuntimeRequest::TestSettings => RuntimeReply::Ack {
            status: "settings tested".to_string(),
            settings: store.get().clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_round_trips_with_camel_case_tags() {
        let msg = RuntimeRequest::Translate {
            text: "こんにちは".to_string(),
            source_language: "ja".to_string(),
            request_id: 7,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"action\":\"translate\""));
        assert!(json.contains("\"sourceLanguage\":\"ja\""));
        assert!(json.contains("\"requestId\":7"));
        assert_eq!(serde_json::from_str::<RuntimeRequest>(&json).unwrap(), msg);
    }

    #[test]
    fn settings_updated_tag() {
        let msg = RuntimeRequest::SettingsUpdated {
            settings: Settings::default(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"action\":\"settingsUpdated\""));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let raw = r#"{"action": "mystery", "text": "x"}"#;
        assert!(serde_json::from_str::<RuntimeRequest>(raw).is_err());
    }

    #[test]
    fn frame_messages_carry_prefixed_type() {
        let msg = FrameMessage::ExtractText {
            x: 12.0,
            y: 30.0,
            frame_id: "frame_3".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"hoverTranslate:extract-text\""));
        assert!(json.contains("\"frameId\":\"frame_3\""));
        assert_eq!(serde_json::from_str::<FrameMessage>(&json).unwrap(), msg);
    }

    #[test]
    fn reply_variants_deserialize_unambiguously() {
        let err: RuntimeReply = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert!(matches!(err, RuntimeReply::Error { .. }));

        let raw = r#"{"original": "こんにちは", "translation": "你好"}"#;
        let reply: RuntimeReply = serde_json::from_str(raw).unwrap();
        assert!(matches!(reply, RuntimeReply::Translation(_)));
    }

    #[test]
    fn settings_updated_persists_and_echoes() {
        let path = std::env::temp_dir().join(format!(
            "hoverlens-bus-settings-{}.toml",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut store = crate::settings::SettingsStore::at_path(path.clone()).unwrap();
        let router = Router::new(store.get().backend.clone());

        let mut next = Settings::default();
        next.hover_delay_ms = 900;
        let reply = handle_runtime_request(
            &mut store,
            &router,
            RuntimeRequest::SettingsUpdated { settings: next },
        );
        match reply {
            RuntimeReply::Ack { settings, .. } => assert_eq!(settings.hover_delay_ms, 900),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(store.get().hover_delay_ms, 900);

        let echoed = handle_runtime_request(&mut store, &router, RuntimeRequest::TestSettings);
        match echoed {
            RuntimeReply::Ack { status, settings } => {
                assert_eq!(status, "settings tested");
                assert_eq!(settings.hover_delay_ms, 900);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unsupported_language_translates_to_flagged_result() {
        let path = std::env::temp_dir().join(format!(
            "hoverlens-bus-unsupported-{}.toml",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut store = crate::settings::SettingsStore::at_path(path.clone()).unwrap();
        let router = Router::new(store.get().backend.clone());

        let reply = handle_runtime_request(
            &mut store,
            &router,
            RuntimeRequest::Translate {
                text: "12345".to_string(),
                source_language: "unknown".to_string(),
                request_id: 1,
            },
        );
        match reply {
            RuntimeReply::Translation(result) => assert!(result.unsupported),
            other => panic!("unexpected reply: {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn text_extracted_omits_absent_fields() {
        let msg = FrameMessage::TextExtracted {
            frame_id: "frame_1".to_string(),
            success: true,
            text: Some("本文".to_string()),
            error: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"error\""));
    }
}
