use serde::{Deserialize, Serialize};

/// Which scripts the engine is allowed to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    #[default]
    Ja,
    En,
    All,
}

/// Outcome of classifying the text under the cursor.
///
/// `Skip` means the configured [`LanguageMode`] rules the text out; the
/// caller must abort the lookup rather than treat it as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedLanguage {
    Ja,
    En,
    Unknown,
    Skip,
}

impl DetectedLanguage {
    pub fn code(self) -> &'static str {
        match self {
            DetectedLanguage::Ja => "ja",
            DetectedLanguage::En => "en",
            DetectedLanguage::Unknown => "unknown",
            DetectedLanguage::Skip => "skip",
        }
    }
}

/// True for characters in the Hiragana, Katakana, CJK Unified Ideographs,
/// half/full-width forms, or CJK symbol ranges.
pub fn is_japanese_char(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303f}' // CJK symbols and punctuation
        | '\u{3040}'..='\u{309f}' // Hiragana
        | '\u{30a0}'..='\u{30ff}' // Katakana
        | '\u{ff00}'..='\u{ff9f}' // full-width forms, half-width katakana
        | '\u{4e00}'..='\u{9faf}' // CJK Unified Ideographs
    )
}

/// The narrower class used by the span expander to decide the local script:
/// kana and ideographs only, without punctuation ranges.
pub fn is_japanese_word_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309f}' | '\u{30a0}'..='\u{30ff}' | '\u{4e00}'..='\u{9faf}'
    )
}

fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9faf}')
}

/// Classify `text` under the given mode.
///
/// Any Japanese-range character wins over ASCII letters; a mode of `Ja` or
/// `En` forces `Skip` when the detected script does not match.
pub fn detect(text: &str, mode: LanguageMode) -> DetectedLanguage {
    let has_japanese = text.chars().any(is_japanese_char);
    let has_english = text.chars().any(|c| c.is_ascii_alphabetic());

    if mode == LanguageMode::Ja && !has_japanese {
        return DetectedLanguage::Skip;
    }
    if mode == LanguageMode::En && !has_english {
        return DetectedLanguage::Skip;
    }

    if has_japanese {
        DetectedLanguage::Ja
    } else if has_english {
        DetectedLanguage::En
    } else {
        DetectedLanguage::Unknown
    }
}

/// Stricter Japanese check used as a second opinion before routing to the
/// Japanese backend: kana is decisive; otherwise Japanese symbols plus a
/// minimum kanji density are required (bare kanji could be Chinese).
pub fn is_japanese_text(text: &str) -> bool {
    let has_kana = text
        .chars()
        .any(|c| matches!(c, '\u{3040}'..='\u{309f}' | '\u{30a0}'..='\u{30ff}'));
    if has_kana {
        return true;
    }

    let has_japanese_symbols = text
        .chars()
        .any(|c| matches!(c, '\u{3000}'..='\u{303f}' | '\u{30fb}' | '\u{301c}'));
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let kanji_count = text.chars().filter(|&c| is_kanji(c)).count();

    has_japanese_symbols && kanji_count as f64 / total as f64 > 0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kana_detected_as_japanese() {
        assert_eq!(detect("こんにちは", LanguageMode::All), DetectedLanguage::Ja);
        assert_eq!(detect("カタカナ", LanguageMode::Ja), DetectedLanguage::Ja);
    }

    #[test]
    fn ascii_detected_as_english() {
        assert_eq!(detect("hello", LanguageMode::All), DetectedLanguage::En);
        assert_eq!(detect("hello", LanguageMode::En), DetectedLanguage::En);
    }

    #[test]
    fn japanese_wins_over_mixed_ascii() {
        assert_eq!(
            detect("日本語とenglish", LanguageMode::All),
            DetectedLanguage::Ja
        );
    }

    #[test]
    fn digits_and_symbols_are_unknown() {
        assert_eq!(detect("12345 !?", LanguageMode::All), DetectedLanguage::Unknown);
    }

    #[test]
    fn ja_mode_skips_non_japanese() {
        assert_eq!(detect("hello", LanguageMode::Ja), DetectedLanguage::Skip);
    }

    #[test]
    fn en_mode_skips_japanese_only_text() {
        assert_eq!(detect("こんにちは", LanguageMode::En), DetectedLanguage::Skip);
    }

    #[test]
    fn strict_check_requires_kana_or_symbol_plus_kanji() {
        assert!(is_japanese_text("ひらがな"));
        assert!(is_japanese_text("東京、大阪"));
        // Bare kanji with no Japanese symbols is ambiguous with Chinese
        assert!(!is_japanese_text("中文文本"));
        assert!(!is_japanese_text(""));
    }
}
