use std::time::{Duration, Instant};

use crate::bus::FrameMessage;
use crate::extract;
use crate::page::{NodeId, Page, Point};

/// How long the coordinator waits for a frame to answer an extract request.
pub const FRAME_EXTRACT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Result of feeding a frame reply or a timeout back to the hover flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Text arrived from the frame and should be translated.
    Text(String),
    /// The frame answered but produced nothing usable.
    Failed(String),
}

/// The frame's document is unreachable; the caller substitutes the
/// cross-origin sentinel and translates it as ordinary content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossOriginDenied;

#[derive(Debug)]
struct PendingExtract {
    frame: NodeId,
    frame_id: String,
    issued_at: Instant,
}

/// Host-side half of the frame transport: converts the cursor into
/// frame-relative coordinates, tags the request with a frame id, and drops
/// replies that arrive late or under a stale id.
#[derive(Debug, Default)]
pub struct FrameCoordinator {
    next_seq: u64,
    pending: Option<PendingExtract>,
}

impl FrameCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_frame(&self) -> Option<NodeId> {
        self.pending.as_ref().map(|p| p.frame)
    }

    /// Start an extract request against a hovered frame element. Returns the
    /// envelope to post into the frame.
    pub fn begin_extract(
        &mut self,
        page: &Page,
        frame: NodeId,
        cursor: Point,
        now: Instant,
    ) -> Result<FrameMessage, CrossOriginDenied> {
        if page.is_cross_origin(frame) {
            tracing::debug!("cross-origin frame, substituting sentinel text");
            return Err(CrossOriginDenied);
        }
        let rect = page.rect(frame).unwrap_or_default();
        self.next_seq += 1;
        let frame_id = format!("frame_{}", self.next_seq);
        self.pending = Some(PendingExtract {
            frame,
            frame_id: frame_id.clone(),
            issued_at: now,
        });
        Ok(FrameMessage::ExtractText {
            x: cursor.x - rect.left,
            y: cursor.y - rect.top,
            frame_id,
        })
    }

    /// Feed a message coming back from a frame. Replies for ids other than
    /// the pending one are ignored.
    pub fn on_message(&mut self, message: &FrameMessage) -> Option<FrameOutcome> {
        let FrameMessage::TextExtracted {
            frame_id,
            success,
            text,
            error,
        } = message
        else {
            return None;
        };
        let pending = self.pending.as_ref()?;
        if pending.frame_id != *frame_id {
            tracing::debug!(%frame_id, "ignoring reply for a stale frame request");
            return None;
        }
        self.pending = None;
        match (success, text) {
            (true, Some(text)) if !text.trim().is_empty() => {
                Some(FrameOutcome::Text(text.trim().to_string()))
            }
            _ => Some(FrameOutcome::Failed(
                error.clone().unwrap_or_else(|| "no text extracted".to_string()),
            )),
        }
    }

    /// True when the pending request has expired; the pending state is
    /// cleared so a late reply is dropped.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        if let Some(pending) = &self.pending {
            if now.duration_since(pending.issued_at) >= FRAME_EXTRACT_TIMEOUT {
                tracing::warn!("frame did not answer in time, abandoning extract");
                self.pending = None;
                return true;
            }
        }
        false
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Frame-side half: answers pings, serves extract requests against the
/// frame's own document, and reports significant document changes.
pub struct FrameAdapter {
    frame_id: String,
}

impl FrameAdapter {
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
        }
    }

    /// Announcement posted when the adapter comes up.
    pub fn ready(&self) -> FrameMessage {
        FrameMessage::IframeReady {
            frame_id: self.frame_id.clone(),
        }
    }

    /// Notification for a significant change to the frame's document.
    pub fn document_changed(&self) -> FrameMessage {
        FrameMessage::IframeUpdated {
            frame_id: self.frame_id.clone(),
        }
    }

    /// Handle a message from the host document. Returns the reply to post
    /// back, if the message warrants one.
    pub fn handle(&self, page: &Page, message: &FrameMessage) -> Option<FrameMessage> {
        match message {
            FrameMessage::Ping { frame_id } => Some(FrameMessage::IframeReady {
                frame_id: if frame_id.is_empty() {
                    self.frame_id.clone()
                } else {
                    frame_id.clone()
                },
            }),
            FrameMessage::ExtractText { x, y, frame_id } => {
                Some(self.extract_reply(page, Point::new(*x, *y), frame_id.clone()))
            }
            _ => None,
        }
    }

    /// Attribute text first, then the first text node under the point, then
    /// the element's own content.
    fn extract_reply(&self, page: &Page, point: Point, frame_id: String) -> FrameMessage {
        let Some(&element) = extract::stacked_elements(page, point).first() else {
            return FrameMessage::TextExtracted {
                frame_id,
                success: false,
                text: None,
                error: Some("no element at point".to_string()),
            };
        };

        let text = extract::attr::attribute_text(page, element)
            .or_else(|| {
                page.first_text_node_in(element)
                    .and_then(|node| page.text(node))
                    .map(|t| t.trim().to_string())
            })
            .filter(|t| !t.is_empty())
            .or_else(|| extract::element_text_fallback(page, element));

        match text {
            Some(text) => FrameMessage::TextExtracted {
                frame_id,
                success: true,
                text: Some(text),
                error: None,
            },
            None => FrameMessage::TextExtracted {
                frame_id,
                success: false,
                text: None,
                error: Some("no extractable text".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Rect;

    fn frame_page() -> (Page, NodeId) {
        let mut page = Page::new(800.0, 600.0);
        let frame = page.add_element(
            page.root(),
            "iframe",
            Some(Rect::new(100.0, 100.0, 300.0, 200.0)),
        );
        (page, frame)
    }

    #[test]
    fn extract_request_uses_frame_relative_coordinates() {
        let (page, frame) = frame_page();
        let mut coord = FrameCoordinator::new();
        let msg = coord
            .begin_extract(&page, frame, Point::new(150.0, 160.0), Instant::now())
            .unwrap();
        match msg {
            FrameMessage::ExtractText { x, y, .. } => {
                assert!((x - 50.0).abs() < 1e-9);
                assert!((y - 60.0).abs() < 1e-9);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(coord.is_pending());
    }

    #[test]
    fn cross_origin_frames_are_denied() {
        let (mut page, frame) = frame_page();
        page.mark_cross_origin(frame);
        let mut coord = FrameCoordinator::new();
        assert_eq!(
            coord.begin_extract(&page, frame, Point::new(150.0, 160.0), Instant::now()),
            Err(CrossOriginDenied)
        );
        assert!(!coord.is_pending());
    }

    #[test]
    fn stale_frame_ids_are_ignored() {
        let (page, frame) = frame_page();
        let mut coord = FrameCoordinator::new();
        let now = Instant::now();
        coord
            .begin_extract(&page, frame, Point::new(150.0, 160.0), now)
            .unwrap();
        let stale = FrameMessage::TextExtracted {
            frame_id: "frame_999".to_string(),
            success: true,
            text: Some("old".to_string()),
            error: None,
        };
        assert_eq!(coord.on_message(&stale), None);
        assert!(coord.is_pending());
    }

    #[test]
    fn matching_reply_resolves_and_clears() {
        let (page, frame) = frame_page();
        let mut coord = FrameCoordinator::new();
        let now = Instant::now();
        coord
            .begin_extract(&page, frame, Point::new(150.0, 160.0), now)
            .unwrap();
        let reply = FrameMessage::TextExtracted {
            frame_id: "frame_1".to_string(),
            success: true,
            text: Some(" 本文 ".to_string()),
            error: None,
        };
        assert_eq!(
            coord.on_message(&reply),
            Some(FrameOutcome::Text("本文".to_string()))
        );
        assert!(!coord.is_pending());
    }

    #[test]
    fn timeout_clears_pending_state() {
        let (page, frame) = frame_page();
        let mut coord = FrameCoordinator::new();
        let issued = Instant::now();
        coord
            .begin_extract(&page, frame, Point::new(150.0, 160.0), issued)
            .unwrap();
        assert!(!coord.poll_timeout(issued + Duration::from_millis(500)));
        assert!(coord.poll_timeout(issued + Duration::from_millis(1100)));
        assert!(!coord.is_pending());
    }

    #[test]
    fn adapter_answers_ping_and_extracts_text() {
        let adapter = FrameAdapter::new("frame_a");
        let mut page = Page::new(300.0, 200.0);
        let para = page.add_element(page.root(), "p", Some(Rect::new(0.0, 0.0, 100.0, 20.0)));
        page.add_text(para, "frame text", Some(Rect::new(0.0, 0.0, 100.0, 20.0)));

        let pong = adapter
            .handle(
                &page,
                &FrameMessage::Ping {
                    frame_id: "frame_a".to_string(),
                },
            )
            .unwrap();
        assert!(matches!(pong, FrameMessage::IframeReady { .. }));

        let reply = adapter
            .handle(
                &page,
                &FrameMessage::ExtractText {
                    x: 10.0,
                    y: 10.0,
                    frame_id: "frame_a".to_string(),
                },
            )
            .unwrap();
        match reply {
            FrameMessage::TextExtracted { success, text, .. } => {
                assert!(success);
                assert_eq!(text.as_deref(), Some("frame text"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn adapter_reports_missing_element() {
        let adapter = FrameAdapter::new("frame_a");
        let page = Page::new(300.0, 200.0);
        let reply = adapter
            .handle(
                &page,
                &FrameMessage::ExtractText {
                    x: 1000.0,
                    y: 1000.0,
                    frame_id: "frame_a".to_string(),
                },
            )
            .unwrap();
        match reply {
            FrameMessage::TextExtracted { success, error, .. } => {
                assert!(!success);
                assert!(error.is_some());
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}
