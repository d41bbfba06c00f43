use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bus::FrameMessage;
use crate::extract::{self, Extractor};
use crate::frame::{CrossOriginDenied, FrameCoordinator, FrameOutcome};
use crate::highlight::Highlighter;
use crate::language::{self, DetectedLanguage};
use crate::page::{NodeId, Page, Point, Rect, TextRange};
use crate::settings::Settings;
use crate::tooltip::{self, TooltipPanel};
use crate::translate::{self, TranslationResult};

/// Movement beyond this on the same element starts a fresh session.
const SAME_ELEMENT_RESET_PX: f64 = 8.0;
/// Steps smaller than this are not counted as movement.
const MOVE_STEP_MIN_PX: f64 = 3.0;
/// Counted moves beyond this invalidate the pending hover.
const MOVE_COUNT_CEILING: u32 = 15;
/// The cursor must still be this close to where the timer was armed.
const TIMER_FIRE_TOLERANCE_PX: f64 = 10.0;
/// Responses are dropped when the cursor drifted farther than this since issue.
const RESPONSE_TOLERANCE_PX: f64 = 15.0;
/// A single jump this large cancels outright, whatever the counter says.
const FORCE_CANCEL_JUMP_PX: f64 = 30.0;
/// Confirmation delay before hiding after mouse-out.
const MOUSE_OUT_GRACE: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverPhase {
    Idle,
    PendingHover,
    Extracting,
    Displaying,
}

/// Outbound translation request handed to the dispatch callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateJob {
    pub request_id: u64,
    pub text: String,
    pub source_language: String,
}

pub type RequestDispatch = Arc<dyn Fn(TranslateJob) + Send + Sync>;

/// One sustained mouse-over interaction.
#[derive(Debug)]
struct HoverSession {
    target: NodeId,
    started_at: Instant,
    move_count: u32,
    cursor: Point,
    hovering: bool,
    extracting: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    id: u64,
    issued_at: Instant,
    cursor_at_issue: Point,
}

/// Owns the hover lifecycle: debounce, movement filtering, extraction,
/// request correlation, and tooltip/highlight state.
///
/// Time is always passed in, never read from a clock, so tests drive the
/// machine deterministically. Translation requests go out through the
/// dispatch callback and come back via [`HoverEngine::on_response`];
/// cancellation is advisory, enforced by comparing the cancellation instant
/// against each request's issue instant.
pub struct HoverEngine {
    settings: Settings,
    phase: HoverPhase,
    session: Option<HoverSession>,
    extractor: Extractor,
    highlighter: Highlighter,
    frames: FrameCoordinator,
    frame_outbox: Vec<FrameMessage>,
    dispatch: Option<RequestDispatch>,
    tooltip: Option<TooltipPanel>,
    tooltip_container: Option<NodeId>,
    hover_deadline: Option<Instant>,
    timer_anchor: Point,
    hide_deadline: Option<Instant>,
    last_cursor: Point,
    next_request_id: u64,
    pending: Option<PendingRequest>,
    cancelled_at: Option<Instant>,
}

impl HoverEngine {
    pub fn new(settings: Settings) -> Self {
        Self::with_extractor(settings, Extractor::new())
    }

    pub fn with_extractor(settings: Settings, extractor: Extractor) -> Self {
        Self {
            settings,
            phase: HoverPhase::Idle,
            session: None,
            extractor,
            highlighter: Highlighter::new(),
            frames: FrameCoordinator::new(),
            frame_outbox: Vec::new(),
            dispatch: None,
            tooltip: None,
            tooltip_container: None,
            hover_deadline: None,
            timer_anchor: Point::default(),
            hide_deadline: None,
            last_cursor: Point::default(),
            next_request_id: 0,
            pending: None,
            cancelled_at: None,
        }
    }

    pub fn set_dispatch(&mut self, dispatch: RequestDispatch) {
        self.dispatch = Some(dispatch);
    }

    /// The overlay node hosting the tooltip panel; mouse-out toward it must
    /// not hide the tooltip.
    pub fn set_tooltip_container(&mut self, node: NodeId) {
        self.tooltip_container = Some(node);
    }

    pub fn phase(&self) -> HoverPhase {
        self.phase
    }

    pub fn tooltip(&self) -> Option<&TooltipPanel> {
        self.tooltip.as_ref()
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn is_hovering(&self) -> bool {
        self.session.as_ref().map(|s| s.hovering).unwrap_or(false)
    }

    /// Frame envelopes produced since the last call; the host posts them
    /// into the corresponding frames.
    pub fn take_frame_messages(&mut self) -> Vec<FrameMessage> {
        std::mem::take(&mut self.frame_outbox)
    }

    /// Replace the cached settings wholesale (store change notification).
    pub fn apply_settings(&mut self, settings: Settings) {
        let was_enabled = self.settings.enabled;
        self.settings = settings;
        if was_enabled && !self.settings.enabled {
            self.hide_tooltip();
            self.hover_deadline = None;
            self.hide_deadline = None;
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // --- pointer events ---

    pub fn on_mouse_over(&mut self, _page: &Page, target: NodeId, cursor: Point, now: Instant) {
        if !self.settings.enabled {
            return;
        }

        let same_element = self.session.as_ref().map(|s| s.target) == Some(target);
        let moved = if same_element {
            self.last_cursor.distance_to(cursor)
        } else {
            f64::MAX
        };

        self.hover_deadline = None;
        self.last_cursor = cursor;

        if moved > SAME_ELEMENT_RESET_PX || !same_element {
            if self.tooltip.is_some() {
                self.hide_tooltip();
            }
            self.cancel_pending(now);
            self.highlighter.clear();

            self.session = Some(HoverSession {
                target,
                started_at: now,
                move_count: 0,
                cursor,
                hovering: true,
                extracting: false,
            });
            self.phase = HoverPhase::PendingHover;
            tracing::debug!(node = target, x = cursor.x, y = cursor.y, "hover session started");
        } else if let Some(session) = &mut self.session {
            session.move_count += 1;
            session.cursor = cursor;
        }

        self.timer_anchor = cursor;
        self.hover_deadline = Some(now + Duration::from_millis(self.settings.hover_delay_ms));
    }

    pub fn on_mouse_move(&mut self, _page: &Page, cursor: Point, now: Instant) {
        let Some(session) = &mut self.session else {
            return;
        };
        if !session.hovering {
            return;
        }

        let distance = session.cursor.distance_to(cursor);
        if distance <= MOVE_STEP_MIN_PX {
            return;
        }

        session.move_count += 1;
        session.cursor = cursor;
        let move_count = session.move_count;
        self.last_cursor = cursor;

        if move_count > MOVE_COUNT_CEILING {
            tracing::debug!(move_count, "movement ceiling exceeded, cancelling hover");
            self.force_cancel(now);
        } else if distance > FORCE_CANCEL_JUMP_PX {
            tracing::debug!(distance, "large jump, cancelling hover");
            self.force_cancel(now);
        } else if distance > SAME_ELEMENT_RESET_PX {
            // Even modest drift removes the highlight to keep the page clean.
            self.highlighter.clear();
        }
    }

    pub fn on_mouse_out(
        &mut self,
        page: &Page,
        related_target: Option<NodeId>,
        now: Instant,
    ) {
        if !self.settings.enabled {
            return;
        }

        if let Some(session) = &mut self.session {
            session.hovering = false;
        }
        self.hover_deadline = None;
        self.highlighter.clear();

        // Moving from the element into the tooltip keeps it visible.
        if let (Some(tooltip_node), Some(related)) = (self.tooltip_container, related_target) {
            if self.tooltip.is_some() && page.is_descendant_of(related, tooltip_node) {
                return;
            }
        }

        if self.session.as_ref().map(|s| s.extracting).unwrap_or(false) {
            self.cancel_pending(now);
        }

        if self.tooltip.is_none() {
            return;
        }

        // Confirm after a short grace period that the cursor really left.
        self.hide_deadline = Some(now + MOUSE_OUT_GRACE);
    }

    pub fn on_click(&mut self, page: &Page, target: NodeId, now: Instant) {
        if self.tooltip.is_none() {
            return;
        }
        if let Some(tooltip_node) = self.tooltip_container {
            if page.is_descendant_of(target, tooltip_node) {
                return;
            }
        }
        self.cancel_pending(now);
        self.hide_tooltip();
    }

    /// Significant document change: cached extraction geometry and any
    /// visible tooltip may now be stale.
    pub fn on_page_mutation(&mut self, now: Instant) {
        self.extractor.invalidate_cache();
        if self.tooltip.is_some() {
            self.cancel_pending(now);
            self.hide_tooltip();
        }
    }

    pub fn on_scroll(&mut self, page: &Page) {
        self.highlighter.update_positions(page.scroll(), page.viewport());
    }

    // --- timers ---

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.hover_deadline, self.hide_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    /// Drive due deadlines. The host calls this from its event loop.
    pub fn poll(&mut self, page: &Page, now: Instant) {
        if self.frames.poll_timeout(now) {
            self.abort_extraction();
        }

        if let Some(deadline) = self.hide_deadline {
            if now >= deadline {
                self.hide_deadline = None;
                self.confirm_hide(page, now);
            }
        }

        if let Some(deadline) = self.hover_deadline {
            if now >= deadline {
                self.hover_deadline = None;
                self.timer_fired(page, now);
            }
        }
    }

    fn timer_fired(&mut self, page: &Page, now: Instant) {
        let qualified = match &self.session {
            Some(session) => {
                session.hovering
                    && !session.extracting
                    && session.move_count < MOVE_COUNT_CEILING
                    && now.duration_since(session.started_at)
                        >= Duration::from_millis(self.settings.hover_delay_ms)
                    && self.last_cursor.distance_to(self.timer_anchor) < TIMER_FIRE_TOLERANCE_PX
            }
            None => false,
        };

        if !qualified {
            tracing::debug!("hover conditions not met at timer fire");
            self.phase = HoverPhase::Idle;
            return;
        }

        self.begin_extraction(page, now);
    }

    fn confirm_hide(&mut self, page: &Page, now: Instant) {
        let over_tooltip = self
            .tooltip
            .as_ref()
            .map(|panel| {
                let scroll = page.scroll();
                Rect::new(
                    panel.position.x - scroll.x,
                    panel.position.y - scroll.y,
                    panel.width,
                    panel.height,
                )
                .contains(self.last_cursor)
            })
            .unwrap_or(false);
        let over_target = self
            .session
            .as_ref()
            .and_then(|s| page.rect(s.target))
            .map(|r| r.contains(self.last_cursor))
            .unwrap_or(false);

        if !over_tooltip && !over_target {
            self.cancel_pending(now);
            self.hide_tooltip();
        }
    }

    // --- extraction and translation ---

    fn begin_extraction(&mut self, page: &Page, now: Instant) {
        let Some(session) = &mut self.session else {
            return;
        };
        session.extracting = true;
        let target = session.target;
        let cursor = session.cursor;
        self.phase = HoverPhase::Extracting;

        if page.is_frame(target) {
            match self.frames.begin_extract(page, target, cursor, now) {
                Ok(envelope) => {
                    self.frame_outbox.push(envelope);
                }
                Err(CrossOriginDenied) => {
                    let sentinel = translate::cross_origin_sentinel();
                    self.request_translation(page, sentinel, None, now);
                }
            }
            return;
        }

        let extraction = self.extractor.extract_at(page, cursor);
        match extraction {
            Some(found) => {
                self.request_translation(page, found.text, found.range, now);
            }
            None => match extract::element_text_fallback(page, target) {
                Some(text) => self.request_translation(page, text, None, now),
                None => {
                    tracing::debug!("no translatable text at point");
                    self.abort_extraction();
                }
            },
        }
    }

    fn request_translation(
        &mut self,
        page: &Page,
        text: String,
        range: Option<TextRange>,
        now: Instant,
    ) {
        let capped = extract::cap_graphemes(text.trim(), extract::expand::MAX_SPAN_CHARS);
        let detected = language::detect(&capped, self.settings.language_mode);
        if detected == DetectedLanguage::Skip {
            tracing::debug!("language mode rules this text out, skipping lookup");
            self.highlighter.clear();
            self.abort_extraction();
            return;
        }

        if let Some(range) = range {
            // highlight_range replaces any previous boxes, so exactly one
            // span is ever highlighted.
            self.highlighter.highlight_range(page, &range);
        }

        self.next_request_id += 1;
        let job = TranslateJob {
            request_id: self.next_request_id,
            text: capped,
            source_language: detected.code().to_string(),
        };
        self.pending = Some(PendingRequest {
            id: job.request_id,
            issued_at: now,
            cursor_at_issue: self.last_cursor,
        });
        tracing::debug!(request_id = job.request_id, "translation request issued");
        if let Some(dispatch) = &self.dispatch {
            dispatch(job);
        }
    }

    /// Deliver a backend response. Stale or disqualified responses are
    /// silently dropped and never reach the renderer.
    pub fn on_response(
        &mut self,
        page: &Page,
        request_id: u64,
        result: TranslationResult,
        _now: Instant,
    ) {
        let Some(pending) = self.pending else {
            return;
        };
        if pending.id != request_id {
            tracing::debug!(request_id, "response for an unknown request id");
            return;
        }

        let cancelled = self
            .cancelled_at
            .map(|at| at > pending.issued_at)
            .unwrap_or(false);
        let drifted =
            self.last_cursor.distance_to(pending.cursor_at_issue) > RESPONSE_TOLERANCE_PX;
        let hovering = self.is_hovering();

        if cancelled || drifted || !hovering {
            tracing::debug!(
                request_id,
                cancelled,
                drifted,
                hovering,
                "discarding stale response"
            );
            self.pending = None;
            if let Some(session) = &mut self.session {
                session.extracting = false;
            }
            return;
        }

        self.pending = None;
        let anchor = self
            .session
            .as_ref()
            .and_then(|s| page.rect(s.target))
            .unwrap_or_else(|| Rect::new(self.last_cursor.x, self.last_cursor.y, 1.0, 1.0));
        self.tooltip = Some(tooltip::render(
            &result,
            anchor,
            page.viewport(),
            page.scroll(),
            &self.settings,
        ));
        if let Some(session) = &mut self.session {
            session.extracting = false;
        }
        self.phase = HoverPhase::Displaying;
    }

    /// Deliver a reply from a frame document.
    pub fn on_frame_message(&mut self, page: &Page, message: &FrameMessage, now: Instant) {
        match self.frames.on_message(message) {
            Some(FrameOutcome::Text(text)) => {
                if self.is_hovering() {
                    self.request_translation(page, text, None, now);
                } else {
                    self.abort_extraction();
                }
            }
            Some(FrameOutcome::Failed(reason)) => {
                tracing::debug!(%reason, "frame extraction failed");
                self.abort_extraction();
            }
            None => {}
        }
    }

    // --- teardown paths ---

    /// Hide the tooltip and reset hover state. Idempotent.
    pub fn hide_tooltip(&mut self) {
        self.tooltip = None;
        self.highlighter.clear();
        if let Some(session) = &mut self.session {
            session.hovering = false;
            session.extracting = false;
        }
        self.hide_deadline = None;
        self.phase = HoverPhase::Idle;
    }

    /// Record a cancellation instant so in-flight responses are dropped,
    /// and tear down anything the cancelled request produced.
    fn cancel_pending(&mut self, now: Instant) {
        if self.pending.is_some() || self.session.as_ref().map(|s| s.extracting).unwrap_or(false) {
            tracing::debug!("cancelling in-flight request");
        }
        self.cancelled_at = Some(now);
        self.hover_deadline = None;
        self.frames.cancel();
        if let Some(session) = &mut self.session {
            session.extracting = false;
        }
        if self.tooltip.is_some() {
            self.hide_tooltip();
        }
    }

    fn force_cancel(&mut self, now: Instant) {
        if let Some(session) = &mut self.session {
            session.hovering = false;
        }
        self.hover_deadline = None;
        self.highlighter.clear();
        self.cancel_pending(now);
        if self.tooltip.is_some() {
            self.hide_tooltip();
        }
        self.phase = HoverPhase::Idle;
    }

    fn abort_extraction(&mut self) {
        if let Some(session) = &mut self.session {
            session.extracting = false;
            session.hovering = false;
        }
        self.phase = HoverPhase::Idle;
    }
}
