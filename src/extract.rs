use unicode_segmentation::UnicodeSegmentation;

use crate::page::{NodeId, Page, Point, TextRange};

pub mod attr;
pub mod expand;
pub mod locate;

use expand::MAX_SPAN_CHARS;
use locate::Locator;

/// Repeat extractions within this radius reuse the previous result.
const CACHE_RADIUS_PX: f64 = 4.0;

/// Outcome of one extraction attempt. `range` is present only when the text
/// came from an actual text node (attribute and element fallbacks have no
/// highlightable range).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub range: Option<TextRange>,
}

struct CachedExtraction {
    point: Point,
    result: Extraction,
}

/// Point-to-span pipeline: locator strategies, then span expansion, then the
/// attribute fallback over the stacked elements.
pub struct Extractor {
    locator: Locator,
    cache: Option<CachedExtraction>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_locator(Locator::with_default_strategies())
    }

    pub fn with_locator(locator: Locator) -> Self {
        Self {
            locator,
            cache: None,
        }
    }

    pub fn invalidate_cache(&mut self) {
        self.cache = None;
    }

    /// Resolve the text under `point`. Returns `None` when every tier fails;
    /// the caller then falls back to the hovered element's own text.
    pub fn extract_at(&mut self, page: &Page, point: Point) -> Option<Extraction> {
        if let Some(cache) = &self.cache {
            if cache.point.distance_to(point) < CACHE_RADIUS_PX {
                tracing::debug!("reusing cached extraction");
                return Some(cache.result.clone());
            }
        }

        let stacked = stacked_elements(page, point);
        if stacked.is_empty() {
            self.cache = None;
            return None;
        }

        if let Some(caret) = self.locator.locate(page, point, &stacked) {
            if let Some(span) = expand::expand(page, caret) {
                let trimmed = span.text.trim();
                if !trimmed.is_empty() {
                    let result = Extraction {
                        text: trimmed.to_string(),
                        range: Some(span.range),
                    };
                    self.cache = Some(CachedExtraction {
                        point,
                        result: result.clone(),
                    });
                    return Some(result);
                }
            }
        }

        for &element in &stacked {
            if let Some(text) = attr::attribute_text(page, element) {
                let result = Extraction {
                    text,
                    range: None,
                };
                self.cache = Some(CachedExtraction {
                    point,
                    result: result.clone(),
                });
                return Some(result);
            }
        }

        self.cache = None;
        None
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Elements stacked at the point, overlay layer and its descendants removed.
pub fn stacked_elements(page: &Page, point: Point) -> Vec<NodeId> {
    page.elements_from_point(point)
        .into_iter()
        .filter(|&id| !in_overlay(page, id))
        .collect()
}

fn in_overlay(page: &Page, id: NodeId) -> bool {
    let mut cursor = Some(id);
    while let Some(current) = cursor {
        if page.is_overlay(current) {
            return true;
        }
        cursor = page.parent(current);
    }
    false
}

/// Final tier: the hovered element's trimmed text, capped at the span
/// ceiling on grapheme boundaries.
pub fn element_text_fallback(page: &Page, id: NodeId) -> Option<String> {
    let text = page.text_content(id);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(cap_graphemes(trimmed, MAX_SPAN_CHARS))
}

/// Truncate without splitting a composed character.
pub fn cap_graphemes(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}
