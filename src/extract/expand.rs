use crate::language::is_japanese_word_char;
use crate::page::{Caret, Page, TextRange};

/// Practical ceiling on the translatable unit.
pub const MAX_SPAN_CHARS: usize = 100;

/// Window used when the caret sits on Latin punctuation and neither boundary
/// can move.
const PINNED_FALLBACK_WINDOW: usize = 5;

/// A bounded, language-aware substring with the range it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedSpan {
    pub text: String,
    pub range: TextRange,
}

fn is_japanese_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ','
                | '。' | '、' | '！' | '!' | '?' | '？' | '；' | ';' | '：' | ':'
                | '\'' | '"'
                | '）' | ')' | '」' | '】' | '］' | ']' | '』' | '〕' | '｝' | '》' | '〉'
        )
}

fn is_latin_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '\'' | '"'
                | '/' | '-'
        )
}

/// Grow a span around the caret using language-specific separator rules.
///
/// Returns `None` when no non-empty span can be established; the caller
/// treats that as "no span found" and proceeds to the next fallback tier.
pub fn expand(page: &Page, caret: Caret) -> Option<ExpandedSpan> {
    let text = page.text(caret.node)?;
    expand_in(text, caret.offset).map(|(start, end)| {
        let span: String = text.chars().skip(start).take(end - start).collect();
        ExpandedSpan {
            text: span,
            range: TextRange {
                node: caret.node,
                start,
                end,
            },
        }
    })
}

/// Character-index expansion within a single string.
pub fn expand_in(text: &str, offset: usize) -> Option<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let offset = offset.min(chars.len());

    let anchor = chars.get(offset).copied().unwrap_or(' ');
    let japanese = is_japanese_word_char(anchor);
    let separator: fn(char) -> bool = if japanese {
        is_japanese_separator
    } else {
        is_latin_separator
    };

    let mut start = offset;
    let mut end = offset;
    while start > 0 && !separator(chars[start - 1]) {
        start -= 1;
    }
    while end < chars.len() && !separator(chars[end]) {
        end += 1;
    }

    // Caret pinned on punctuation: neither boundary moved. Latin text gets a
    // fixed window around the caret; Japanese yields no span.
    if start == end {
        if japanese {
            return None;
        }
        start = offset.saturating_sub(PINNED_FALLBACK_WINDOW);
        end = (offset + PINNED_FALLBACK_WINDOW).min(chars.len());
    }

    // Clamp to the ceiling, keeping the side nearer the caret.
    if end - start > MAX_SPAN_CHARS {
        if offset - start > end - offset {
            start = end - MAX_SPAN_CHARS;
        } else {
            end = start + MAX_SPAN_CHARS;
        }
    }

    let has_content = chars[start..end].iter().any(|c| !c.is_whitespace());
    if has_content {
        Some((start, end))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_of(text: &str, offset: usize) -> Option<String> {
        expand_in(text, offset)
            .map(|(s, e)| text.chars().skip(s).take(e - s).collect::<String>())
    }

    #[test]
    fn latin_word_under_cursor() {
        assert_eq!(span_of("hello brave world", 8).as_deref(), Some("brave"));
    }

    #[test]
    fn latin_stops_at_slash_and_hyphen() {
        assert_eq!(span_of("path/to-file", 6).as_deref(), Some("to"));
    }

    #[test]
    fn japanese_run_expands_to_sentence_punctuation() {
        let text = "今日は晴れ。明日は雨。";
        assert_eq!(span_of(text, 7).as_deref(), Some("明日は雨"));
    }

    #[test]
    fn japanese_stops_at_full_width_space() {
        let text = "東京　大阪";
        assert_eq!(span_of(text, 0).as_deref(), Some("東京"));
    }

    #[test]
    fn pinned_latin_punctuation_uses_window() {
        // Caret on a ',' with separators on both sides: neither boundary
        // moves, so the fixed window around the caret applies.
        let text = "aaaa ,, bbbb";
        let (start, end) = expand_in(text, 5).unwrap();
        assert_eq!(start, 0);
        assert_eq!(end, 10);
    }

    #[test]
    fn pinned_japanese_punctuation_yields_none() {
        assert_eq!(span_of("。。。", 1), None);
    }

    #[test]
    fn clamps_to_ceiling_keeping_near_side() {
        let long: String = "あ".repeat(300);
        let (start, end) = expand_in(&long, 10).unwrap();
        assert_eq!(end - start, MAX_SPAN_CHARS);
        // Caret near the left edge keeps the left side
        assert_eq!(start, 0);
        assert_eq!(end, MAX_SPAN_CHARS);

        let (start, end) = expand_in(&long, 290).unwrap();
        assert_eq!(end - start, MAX_SPAN_CHARS);
        assert_eq!(end, 300);
    }

    #[test]
    fn empty_and_whitespace_yield_none() {
        assert_eq!(span_of("", 0), None);
        assert_eq!(span_of("     ", 2), None);
    }

    #[test]
    fn offset_past_end_is_clamped() {
        assert_eq!(span_of("word", 99).as_deref(), Some("word"));
    }
}
