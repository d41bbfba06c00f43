use crate::page::{Page, Point, Rect, TextRange};

/// Cap on painted rectangles per range.
pub const MAX_HIGHLIGHT_RECTS: usize = 5;

/// Rectangles thinner than this are layout noise.
const MIN_RECT_PX: f64 = 2.0;

/// One overlay box, stored in page coordinates so scrolling only moves the
/// viewport-relative projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightBox {
    pub page_rect: Rect,
    pub visible: bool,
}

/// Paints non-interactive overlay boxes over a text range and keeps them
/// aligned across scrolls. Lives in the dedicated overlay layer; the boxes
/// never participate in hit-testing.
#[derive(Debug, Default)]
pub struct Highlighter {
    boxes: Vec<HighlightBox>,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxes(&self) -> &[HighlightBox] {
        &self.boxes
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Highlight a single-node text range on the page.
    pub fn highlight_range(&mut self, page: &Page, range: &TextRange) {
        let rects = page.range_client_rects(range);
        self.highlight(&rects, page.scroll(), page.viewport());
    }

    /// Replace any existing boxes with boxes for the given client rects.
    pub fn highlight(&mut self, client_rects: &[Rect], scroll: Point, viewport: (f64, f64)) {
        self.clear();

        let (vw, vh) = viewport;
        for rect in client_rects.iter().take(MAX_HIGHLIGHT_RECTS) {
            if rect.width < MIN_RECT_PX || rect.height < MIN_RECT_PX {
                continue;
            }
            let in_viewport =
                rect.bottom() > 0.0 && rect.top < vh && rect.right() > 0.0 && rect.left < vw;
            if !in_viewport {
                continue;
            }
            self.boxes.push(HighlightBox {
                page_rect: Rect::new(
                    rect.left + scroll.x,
                    rect.top + scroll.y,
                    rect.width,
                    rect.height,
                ),
                visible: true,
            });
        }
        tracing::debug!(count = self.boxes.len(), "highlight boxes painted");
    }

    /// Re-project stored page coordinates after a scroll, hiding boxes that
    /// left the viewport.
    pub fn update_positions(&mut self, scroll: Point, viewport: (f64, f64)) {
        let (vw, vh) = viewport;
        for b in &mut self.boxes {
            let client_left = b.page_rect.left - scroll.x;
            let client_top = b.page_rect.top - scroll.y;
            b.visible = client_top + b.page_rect.height > 0.0
                && client_top < vh
                && client_left + b.page_rect.width > 0.0
                && client_left < vw;
        }
    }

    /// Remove all boxes. Safe to call repeatedly or when none exist.
    pub fn clear(&mut self) {
        self.boxes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: (f64, f64) = (800.0, 600.0);

    #[test]
    fn caps_rect_count() {
        let mut hl = Highlighter::new();
        let rects: Vec<Rect> = (0..9)
            .map(|i| Rect::new(10.0 * i as f64, 10.0, 8.0, 8.0))
            .collect();
        hl.highlight(&rects, Point::default(), VIEWPORT);
        assert_eq!(hl.boxes().len(), MAX_HIGHLIGHT_RECTS);
    }

    #[test]
    fn skips_tiny_and_offscreen_rects() {
        let mut hl = Highlighter::new();
        let rects = [
            Rect::new(10.0, 10.0, 1.0, 8.0),      // too thin
            Rect::new(900.0, 10.0, 20.0, 8.0),    // right of viewport
            Rect::new(10.0, 10.0, 20.0, 8.0),     // kept
        ];
        hl.highlight(&rects, Point::default(), VIEWPORT);
        assert_eq!(hl.boxes().len(), 1);
    }

    #[test]
    fn new_highlight_replaces_previous() {
        let mut hl = Highlighter::new();
        hl.highlight(&[Rect::new(10.0, 10.0, 20.0, 8.0)], Point::default(), VIEWPORT);
        hl.highlight(&[Rect::new(40.0, 10.0, 20.0, 8.0)], Point::default(), VIEWPORT);
        assert_eq!(hl.boxes().len(), 1);
        assert!((hl.boxes()[0].page_rect.left - 40.0).abs() < 1e-9);
    }

    #[test]
    fn stores_page_coordinates() {
        let mut hl = Highlighter::new();
        hl.highlight(
            &[Rect::new(10.0, 10.0, 20.0, 8.0)],
            Point::new(0.0, 100.0),
            VIEWPORT,
        );
        assert!((hl.boxes()[0].page_rect.top - 110.0).abs() < 1e-9);
    }

    #[test]
    fn scroll_reprojection_toggles_visibility() {
        let mut hl = Highlighter::new();
        hl.highlight(&[Rect::new(10.0, 10.0, 20.0, 8.0)], Point::default(), VIEWPORT);
        hl.update_positions(Point::new(0.0, 700.0), VIEWPORT);
        assert!(!hl.boxes()[0].visible);
        hl.update_positions(Point::new(0.0, 0.0), VIEWPORT);
        assert!(hl.boxes()[0].visible);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut hl = Highlighter::new();
        hl.highlight(&[Rect::new(10.0, 10.0, 20.0, 8.0)], Point::default(), VIEWPORT);
        hl.clear();
        let after_once = hl.boxes().len();
        hl.clear();
        assert_eq!(after_once, hl.boxes().len());
        assert!(hl.is_empty());
    }
}
