use std::collections::BTreeMap;

/// Viewport-relative coordinates (the pointer's native space).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }
}

pub type NodeId = usize;

/// A caret between characters of a text node, as resolved from a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

/// A contiguous character range within a single text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub rect: Option<Rect>,
    /// Highlight/tooltip layer nodes are excluded from extraction hit-testing.
    pub overlay: bool,
    /// Frames whose content document cannot be reached.
    pub cross_origin: bool,
}

#[derive(Debug, Clone)]
pub struct TextData {
    pub content: String,
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(TextData),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// In-memory document with layout geometry.
///
/// Text nodes carry a client rectangle; caret resolution distributes the
/// node's characters uniformly across its rectangle width. Which of the two
/// point primitives are available is configurable so the locator's strategy
/// probing can be exercised the way it runs against real platforms.
pub struct Page {
    nodes: Vec<Node>,
    root: NodeId,
    viewport_width: f64,
    viewport_height: f64,
    scroll: Point,
    caret_api: bool,
    range_api: bool,
}

impl Page {
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(ElementData {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
                rect: Some(Rect::new(0.0, 0.0, viewport_width, viewport_height)),
                overlay: false,
                cross_origin: false,
            }),
        };
        Self {
            nodes: vec![root],
            root: 0,
            viewport_width,
            viewport_height,
            scroll: Point::default(),
            caret_api: true,
            range_api: true,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn viewport(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn scroll(&self) -> Point {
        self.scroll
    }

    pub fn set_scroll(&mut self, scroll: Point) {
        self.scroll = scroll;
    }

    /// Emulate platforms where one or both point primitives are missing.
    pub fn set_point_api_support(&mut self, caret: bool, range: bool) {
        self.caret_api = caret;
        self.range_api = range;
    }

    // --- construction ---

    pub fn add_element(&mut self, parent: NodeId, tag: &str, rect: Option<Rect>) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element(ElementData {
                tag: tag.to_string(),
                attrs: BTreeMap::new(),
                rect,
                overlay: false,
                cross_origin: false,
            }),
        )
    }

    pub fn add_text(&mut self, parent: NodeId, content: &str, rect: Option<Rect>) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Text(TextData {
                content: content.to_string(),
                rect,
            }),
        )
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn mark_overlay(&mut self, id: NodeId) {
        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            el.overlay = true;
        }
    }

    pub fn mark_cross_origin(&mut self, id: NodeId) {
        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            el.cross_origin = true;
        }
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent].children.push(id);
        id
    }

    // --- queries ---

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Text(_))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Text(t) => Some(&t.content),
            NodeKind::Element(_) => None,
        }
    }

    pub fn char_count(&self, id: NodeId) -> usize {
        self.text(id).map(|t| t.chars().count()).unwrap_or(0)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element(el) => Some(&el.tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element(el) => el.attrs.get(name).map(|s| s.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        match &self.nodes[id].kind {
            NodeKind::Element(el) => el.rect,
            NodeKind::Text(t) => t.rect,
        }
    }

    pub fn is_overlay(&self, id: NodeId) -> bool {
        matches!(&self.nodes[id].kind, NodeKind::Element(el) if el.overlay)
    }

    pub fn is_frame(&self, id: NodeId) -> bool {
        self.tag(id)
            .map(|t| t.eq_ignore_ascii_case("iframe"))
            .unwrap_or(false)
    }

    pub fn is_cross_origin(&self, id: NodeId) -> bool {
        matches!(&self.nodes[id].kind, NodeKind::Element(el) if el.cross_origin)
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Concatenated text of the node's subtree, pre-order, whitespace-joined.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = Vec::new();
        self.collect_text(id, &mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, id: NodeId, out: &mut Vec<&'a str>) {
        match &self.nodes[id].kind {
            NodeKind::Text(t) => {
                let trimmed = t.content.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed);
                }
            }
            NodeKind::Element(_) => {
                for &child in &self.nodes[id].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Elements stacked at the point, topmost first (later in document order
    /// paints above earlier).
    pub fn elements_from_point(&self, p: Point) -> Vec<NodeId> {
        let mut hits = Vec::new();
        self.hit_test(self.root, p, &mut hits);
        hits.reverse();
        hits
    }

    fn hit_test(&self, id: NodeId, p: Point, out: &mut Vec<NodeId>) {
        if let NodeKind::Element(el) = &self.nodes[id].kind {
            if el.rect.map(|r| r.contains(p)).unwrap_or(false) {
                out.push(id);
            }
            for &child in &self.nodes[id].children {
                self.hit_test(child, p, out);
            }
        }
    }

    /// Caret-from-point primitive. `None` when unsupported or no text node
    /// lies under the point.
    pub fn caret_from_point(&self, p: Point) -> Option<Caret> {
        if !self.caret_api {
            return None;
        }
        self.resolve_caret(p)
    }

    /// Range-from-point primitive; same resolution, separately gated.
    pub fn range_from_point(&self, p: Point) -> Option<Caret> {
        if !self.range_api {
            return None;
        }
        self.resolve_caret(p)
    }

    fn resolve_caret(&self, p: Point) -> Option<Caret> {
        // Topmost matching text node wins, like the painted order.
        let mut best: Option<Caret> = None;
        self.visit_text_nodes(self.root, &mut |id, t: &TextData| {
            if let Some(rect) = t.rect {
                if rect.contains(p) {
                    best = Some(Caret {
                        node: id,
                        offset: offset_for_x(&t.content, rect, p.x),
                    });
                }
            }
        });
        best
    }

    fn visit_text_nodes<F: FnMut(NodeId, &TextData)>(&self, id: NodeId, f: &mut F) {
        match &self.nodes[id].kind {
            NodeKind::Text(t) => f(id, t),
            NodeKind::Element(_) => {
                for &child in &self.nodes[id].children {
                    self.visit_text_nodes(child, f);
                }
            }
        }
    }

    /// First non-empty text node in pre-order below `id`, skipping frames.
    pub fn first_text_node_in(&self, id: NodeId) -> Option<NodeId> {
        match &self.nodes[id].kind {
            NodeKind::Text(t) => {
                if t.content.trim().is_empty() {
                    None
                } else {
                    Some(id)
                }
            }
            NodeKind::Element(el) => {
                if el.tag.eq_ignore_ascii_case("iframe") {
                    return None;
                }
                for &child in &self.nodes[id].children {
                    if let Some(found) = self.first_text_node_in(child) {
                        return Some(found);
                    }
                }
                None
            }
        }
    }

    /// Client rectangle of a sub-range of a text node, derived from uniform
    /// character advances across the node's rect.
    pub fn range_client_rects(&self, range: &TextRange) -> Vec<Rect> {
        let text = match self.text(range.node) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let rect = match self.rect(range.node) {
            Some(r) => r,
            None => return Vec::new(),
        };
        let total = text.chars().count();
        if total == 0 || range.start >= range.end {
            return Vec::new();
        }
        let advance = rect.width / total as f64;
        let start = range.start.min(total);
        let end = range.end.min(total);
        vec![Rect::new(
            rect.left + advance * start as f64,
            rect.top,
            advance * (end - start) as f64,
            rect.height,
        )]
    }
}

/// Character offset nearest to `x` under a uniform-advance layout.
fn offset_for_x(text: &str, rect: Rect, x: f64) -> usize {
    let total = text.chars().count();
    if total == 0 || rect.width <= 0.0 {
        return 0;
    }
    let ratio = ((x - rect.left) / rect.width).clamp(0.0, 1.0);
    ((ratio * total as f64).floor() as usize).min(total.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> (Page, NodeId, NodeId) {
        let mut page = Page::new(800.0, 600.0);
        let para = page.add_element(
            page.root(),
            "p",
            Some(Rect::new(10.0, 10.0, 200.0, 20.0)),
        );
        let text = page.add_text(para, "hello world", Some(Rect::new(10.0, 10.0, 110.0, 20.0)));
        (page, para, text)
    }

    #[test]
    fn caret_from_point_resolves_char_offset() {
        let (page, _, text) = sample_page();
        // 11 chars over 110px: 10px per char; x=65 lands in char 5 (space)
        let caret = page.caret_from_point(Point::new(65.0, 15.0)).unwrap();
        assert_eq!(caret.node, text);
        assert_eq!(caret.offset, 5);
    }

    #[test]
    fn caret_api_gating() {
        let (mut page, _, _) = sample_page();
        page.set_point_api_support(false, true);
        assert!(page.caret_from_point(Point::new(65.0, 15.0)).is_none());
        assert!(page.range_from_point(Point::new(65.0, 15.0)).is_some());
    }

    #[test]
    fn elements_from_point_topmost_first() {
        let (mut page, para, _) = sample_page();
        let badge = page.add_element(
            page.root(),
            "span",
            Some(Rect::new(0.0, 0.0, 400.0, 300.0)),
        );
        let hits = page.elements_from_point(Point::new(15.0, 15.0));
        assert_eq!(hits.first(), Some(&badge));
        assert!(hits.contains(&para));
        assert_eq!(*hits.last().unwrap(), page.root());
    }

    #[test]
    fn text_content_joins_subtree() {
        let (mut page, para, _) = sample_page();
        let em = page.add_element(para, "em", None);
        page.add_text(em, "  again ", None);
        assert_eq!(page.text_content(para), "hello world again");
    }

    #[test]
    fn first_text_node_skips_frames_and_whitespace() {
        let mut page = Page::new(800.0, 600.0);
        let div = page.add_element(page.root(), "div", None);
        page.add_text(div, "   ", None);
        let frame = page.add_element(div, "iframe", None);
        page.add_text(frame, "framed", None);
        let span = page.add_element(div, "span", None);
        let inner = page.add_text(span, "visible", None);
        assert_eq!(page.first_text_node_in(div), Some(inner));
    }

    #[test]
    fn range_rects_slice_by_char_proportion() {
        let (page, _, text) = sample_page();
        let rects = page.range_client_rects(&TextRange {
            node: text,
            start: 6,
            end: 11,
        });
        assert_eq!(rects.len(), 1);
        let r = rects[0];
        assert!((r.left - 70.0).abs() < 1e-6);
        assert!((r.width - 50.0).abs() < 1e-6);
    }
}
