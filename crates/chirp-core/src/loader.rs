//! The incremental-load controller: turns "the user is near the end
//! of the list" into at most one next-page request at a time.

use crate::pagination::{MoreFlag, PageState};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Where a view currently stands in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Exhausted,
}

/// Abstract notification from the rendered viewport. The controller
/// never sees a real viewport, only these events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityEvent {
    /// A genuine user scroll happened.
    Scrolled,
    /// The user scrolled near the end of the rendered view.
    NearEnd,
}

/// Capability interface for whatever watches the viewport. Anything
/// that can push `ProximityEvent`s down a channel will do, which keeps
/// the guard logic testable without a real scroll container.
pub trait ProximitySource {
    fn subscribe(&mut self) -> mpsc::Receiver<ProximityEvent>;
}

/// Per-view state machine gating next-page loads.
///
/// `idle -> loading` only fires when, in order: the initial full load
/// has settled, a genuine scroll has been seen since mount, the
/// cool-down since the last load start has elapsed, and no load is in
/// flight. Signals arriving too fast are dropped, never queued.
#[derive(Debug)]
pub struct LoadController {
    phase: LoadPhase,
    scrolled_since_mount: bool,
    last_start: Option<Instant>,
    cooldown: Duration,
}

impl LoadController {
    pub fn new(cooldown: Duration) -> Self {
        LoadController {
            phase: LoadPhase::Idle,
            scrolled_since_mount: false,
            last_start: None,
            cooldown,
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// A genuine user scroll was observed. Required once per mount
    /// before proximity may trigger anything, so a view that renders
    /// already near its end on first paint cannot self-trigger.
    pub fn note_scroll(&mut self) {
        self.scrolled_since_mount = true;
    }

    /// Proximity signal. Returns whether a next-page load should start
    /// now; if so the controller is already in `Loading`.
    pub fn on_near(&mut self, now: Instant, pages: &PageState) -> bool {
        self.try_begin(now, pages, true)
    }

    /// Imperative "load more" intent. Same guards minus the
    /// genuine-scroll requirement, which only applies to viewport
    /// signals.
    pub fn request(&mut self, now: Instant, pages: &PageState) -> bool {
        self.try_begin(now, pages, false)
    }

    fn try_begin(&mut self, now: Instant, pages: &PageState, require_scroll: bool) -> bool {
        if self.phase != LoadPhase::Idle {
            trace!(phase = ?self.phase, "not idle, signal dropped");
            return false;
        }
        if !pages.more().is_more() {
            trace!(more = ?pages.more(), "no more pages known to exist");
            return false;
        }
        if !pages.initial_loaded() {
            trace!("initial load has not settled yet");
            return false;
        }
        if require_scroll && !self.scrolled_since_mount {
            trace!("no genuine scroll since mount");
            return false;
        }
        if let Some(last) = self.last_start {
            if now.duration_since(last) <= self.cooldown {
                trace!("inside cool-down, signal dropped");
                return false;
            }
        }
        if pages.in_flight() {
            trace!("load already in flight");
            return false;
        }
        self.begin(now);
        true
    }

    /// Unconditionally enter `Loading`; used for the initial load and
    /// explicit refreshes, which are not proximity-gated.
    pub fn begin(&mut self, now: Instant) {
        debug!("load started");
        self.phase = LoadPhase::Loading;
        self.last_start = Some(now);
    }

    /// A page result arrived and was merged.
    pub fn finish(&mut self, more: MoreFlag) {
        self.phase = if more.is_end() {
            LoadPhase::Exhausted
        } else {
            LoadPhase::Idle
        };
    }

    /// The fetch failed. Back to `idle` so the next proximity signal
    /// may retry; no automatic retries, no backoff.
    pub fn fail(&mut self) {
        self.phase = LoadPhase::Idle;
    }

    /// Query parameter changed (different author, fresh mount): back
    /// to the mount state.
    pub fn reset(&mut self) {
        self.phase = LoadPhase::Idle;
        self.scrolled_since_mount = false;
        self.last_start = None;
    }
}
