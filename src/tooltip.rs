use crate::i18n::tr;
use crate::page::{Point, Rect};
use crate::settings::Settings;
use crate::translate::{Example, TranslationResult};

/// Gap between the anchor's edge and the panel.
const ANCHOR_GAP_PX: f64 = 10.0;
/// Minimum distance kept from viewport edges when clamping.
const EDGE_MARGIN_PX: f64 = 10.0;

const PADDING_PX: f64 = 12.0;
const LINE_HEIGHT_PX: f64 = 20.0;
const CHAR_WIDTH_PX: f64 = 14.0;

/// Panel width bucketed by combined text length, purely for layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthTier {
    Short,
    Medium,
    Long,
}

impl WidthTier {
    pub fn for_text_length(len: usize) -> Self {
        if len < 30 {
            WidthTier::Short
        } else if len < 100 {
            WidthTier::Medium
        } else {
            WidthTier::Long
        }
    }

    pub fn max_width(self) -> f64 {
        match self {
            WidthTier::Short => 280.0,
            WidthTier::Medium => 340.0,
            WidthTier::Long => 400.0,
        }
    }
}

/// One rendered section of the panel, in display order.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelBlock {
    Original(String),
    Pronunciation(String),
    Translation(String),
    Definitions { header: String, items: Vec<String> },
    Examples { header: String, items: Vec<Example> },
}

/// A positioned floating panel in page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipPanel {
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub tier: WidthTier,
    pub blocks: Vec<PanelBlock>,
}

/// Format a translation result into a panel anchored below-left of the
/// target rect, clamped to the viewport (flipping above the anchor, or
/// pinning to the viewport edge, when it would overflow). Pure.
pub fn render(
    result: &TranslationResult,
    target_rect: Rect,
    viewport: (f64, f64),
    scroll: Point,
    settings: &Settings,
) -> TooltipPanel {
    let blocks = assemble_blocks(result, settings);

    let combined_len = result.original.chars().count() + result.translation.chars().count();
    let tier = WidthTier::for_text_length(combined_len);
    let width = tier.max_width();
    let height = estimate_height(&blocks, width);

    let (vw, vh) = viewport;

    let mut x = target_rect.left;
    if x + width > vw {
        x = vw - width - EDGE_MARGIN_PX;
    }
    if x < 0.0 {
        x = 0.0;
    }

    let mut y = target_rect.bottom() + ANCHOR_GAP_PX;
    if y + height > vh {
        let above = target_rect.top - height - ANCHOR_GAP_PX;
        if above < 0.0 {
            y = (vh - height - EDGE_MARGIN_PX).max(0.0);
        } else {
            y = above;
        }
    }

    TooltipPanel {
        position: Point::new(x + scroll.x, y + scroll.y),
        width,
        height,
        tier,
        blocks,
    }
}

/// Japanese leads with original + pronunciation as a header; other languages
/// put the pronunciation after the translation.
fn assemble_blocks(result: &TranslationResult, settings: &Settings) -> Vec<PanelBlock> {
    let mut blocks = Vec::new();
    let pronunciation = (settings.show_pronunciation && !result.pronunciation.is_empty())
        .then(|| PanelBlock::Pronunciation(result.pronunciation.clone()));

    blocks.push(PanelBlock::Original(result.original.clone()));
    if result.source_language == "ja" {
        if let Some(p) = pronunciation {
            blocks.push(p);
        }
        blocks.push(PanelBlock::Translation(result.translation.clone()));
    } else {
        blocks.push(PanelBlock::Translation(result.translation.clone()));
        if let Some(p) = pronunciation {
            blocks.push(p);
        }
    }

    if !result.details.definitions.is_empty() {
        blocks.push(PanelBlock::Definitions {
            header: tr("definitions-header"),
            items: result.details.definitions.clone(),
        });
    }
    if settings.show_examples && !result.examples.is_empty() {
        blocks.push(PanelBlock::Examples {
            header: tr("examples-header"),
            items: result.examples.clone(),
        });
    }
    blocks
}

/// Deterministic height estimate from wrapped line counts.
fn estimate_height(blocks: &[PanelBlock], width: f64) -> f64 {
    let usable = (width - 2.0 * PADDING_PX).max(CHAR_WIDTH_PX);
    let chars_per_line = (usable / CHAR_WIDTH_PX).floor().max(1.0) as usize;

    let mut lines = 0usize;
    for block in blocks {
        lines += match block {
            PanelBlock::Original(t) | PanelBlock::Pronunciation(t) | PanelBlock::Translation(t) => {
                wrapped_lines(t, chars_per_line)
            }
            PanelBlock::Definitions { items, .. } => {
                1 + items
                    .iter()
                    .map(|i| wrapped_lines(i, chars_per_line))
                    .sum::<usize>()
            }
            PanelBlock::Examples { items, .. } => {
                1 + items
                    .iter()
                    .map(|ex| {
                        wrapped_lines(&ex.text, chars_per_line)
                            + wrapped_lines(&ex.translation, chars_per_line)
                    })
                    .sum::<usize>()
            }
        };
    }
    lines as f64 * LINE_HEIGHT_PX + 2.0 * PADDING_PX
}

fn wrapped_lines(text: &str, chars_per_line: usize) -> usize {
    let count = text.chars().count();
    if count == 0 {
        1
    } else {
        count.div_ceil(chars_per_line)
    }
}
