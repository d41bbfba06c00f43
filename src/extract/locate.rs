use crate::page::{Caret, NodeId, Page, Point};

/// One way of resolving a point to a caret. Strategies are tried in order;
/// the first hit wins. Tests inject fakes to pin the ordering.
pub trait LocateStrategy {
    fn name(&self) -> &'static str;

    /// `stacked` holds the elements under the point, topmost first, with the
    /// overlay layer already filtered out.
    fn locate(&self, page: &Page, point: Point, stacked: &[NodeId]) -> Option<Caret>;
}

/// The platform caret-from-point primitive. Accepts text nodes only.
pub struct CaretFromPoint;

impl LocateStrategy for CaretFromPoint {
    fn name(&self) -> &'static str {
        "caret-from-point"
    }

    fn locate(&self, page: &Page, point: Point, _stacked: &[NodeId]) -> Option<Caret> {
        page.caret_from_point(point)
            .filter(|caret| page.is_text(caret.node))
    }
}

/// The range-from-point fallback primitive. Accepts only ranges whose start
/// container is a text node.
pub struct RangeFromPoint;

impl LocateStrategy for RangeFromPoint {
    fn name(&self) -> &'static str {
        "range-from-point"
    }

    fn locate(&self, page: &Page, point: Point, _stacked: &[NodeId]) -> Option<Caret> {
        page.range_from_point(point)
            .filter(|caret| page.is_text(caret.node))
    }
}

/// Last-resort walk over the stacked elements: the first non-empty text node
/// in pre-order, frames skipped.
///
/// The offset is estimated from the node's geometry when it has a rectangle
/// (cursor x scaled by character count); nodes without layout fall back to
/// the text midpoint.
pub struct TreeWalk;

impl LocateStrategy for TreeWalk {
    fn name(&self) -> &'static str {
        "tree-walk"
    }

    fn locate(&self, page: &Page, point: Point, stacked: &[NodeId]) -> Option<Caret> {
        for &element in stacked {
            if page.is_frame(element) {
                continue;
            }
            if let Some(node) = page.first_text_node_in(element) {
                let total = page.char_count(node);
                if total == 0 {
                    continue;
                }
                let offset = match page.rect(node) {
                    Some(rect) if rect.width > 0.0 => {
                        let ratio = ((point.x - rect.left) / rect.width).clamp(0.0, 1.0);
                        ((ratio * total as f64).floor() as usize).min(total - 1)
                    }
                    _ => (total / 2).min(5),
                };
                return Some(Caret { node, offset });
            }
        }
        None
    }
}

/// Ordered strategy driver.
pub struct Locator {
    strategies: Vec<Box<dyn LocateStrategy>>,
}

impl Locator {
    pub fn new(strategies: Vec<Box<dyn LocateStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_default_strategies() -> Self {
        Self::new(vec![
            Box::new(CaretFromPoint),
            Box::new(RangeFromPoint),
            Box::new(TreeWalk),
        ])
    }

    pub fn locate(&self, page: &Page, point: Point, stacked: &[NodeId]) -> Option<Caret> {
        for strategy in &self.strategies {
            if let Some(caret) = strategy.locate(page, point, stacked) {
                tracing::debug!(strategy = strategy.name(), node = caret.node, offset = caret.offset, "caret resolved");
                return Some(caret);
            }
        }
        None
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Rect;

    fn page_with_text() -> (Page, NodeId, NodeId) {
        let mut page = Page::new(800.0, 600.0);
        let para = page.add_element(page.root(), "p", Some(Rect::new(0.0, 0.0, 100.0, 20.0)));
        let text = page.add_text(para, "0123456789", Some(Rect::new(0.0, 0.0, 100.0, 20.0)));
        (page, para, text)
    }

    struct Fixed(Option<Caret>);

    impl LocateStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn locate(&self, _page: &Page, _point: Point, _stacked: &[NodeId]) -> Option<Caret> {
            self.0
        }
    }

    #[test]
    fn first_successful_strategy_wins() {
        let (page, para, text) = page_with_text();
        let locator = Locator::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some(Caret { node: text, offset: 7 }))),
            Box::new(Fixed(Some(Caret { node: text, offset: 1 }))),
        ]);
        let caret = locator.locate(&page, Point::new(0.0, 0.0), &[para]).unwrap();
        assert_eq!(caret.offset, 7);
    }

    #[test]
    fn falls_through_to_tree_walk_when_apis_unsupported() {
        let (mut page, para, text) = page_with_text();
        page.set_point_api_support(false, false);
        let locator = Locator::with_default_strategies();
        let caret = locator
            .locate(&page, Point::new(35.0, 10.0), &[para])
            .unwrap();
        assert_eq!(caret.node, text);
        // Geometry-derived: 35px over 100px of 10 chars lands on char 3
        assert_eq!(caret.offset, 3);
    }

    #[test]
    fn tree_walk_skips_frames() {
        let mut page = Page::new(800.0, 600.0);
        let frame = page.add_element(page.root(), "iframe", Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
        page.add_text(frame, "inside", None);
        let locator = Locator::with_default_strategies();
        assert!(locator
            .locate(&page, Point::new(10.0, 10.0), &[frame])
            .is_none());
    }

    #[test]
    fn midpoint_rule_without_layout() {
        let mut page = Page::new(800.0, 600.0);
        let div = page.add_element(page.root(), "div", None);
        let text = page.add_text(div, "abcdefghijklmnop", None);
        let caret = TreeWalk
            .locate(&page, Point::new(0.0, 0.0), &[div])
            .unwrap();
        assert_eq!(caret.node, text);
        assert_eq!(caret.offset, 5);
    }
}
