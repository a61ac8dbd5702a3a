//! Deferred camera recentering.
//!
//! A disclosure change schedules a fit view a short time later so the drawing
//! surface has already received the new nodes when the camera moves. There is
//! a single pending slot: scheduling again replaces (cancels) the earlier
//! request instead of queueing a second animation.

use serde::Serialize;
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ViewportConfig;

pub trait Clock {
    /// Milliseconds on a monotonic-enough timeline chosen by the host.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock advanced by hand; used by tests and by hosts that pump their own
/// event loop.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitReason {
    Expand,
    Focus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitViewOptions {
    pub padding: f32,
    pub include_hidden_nodes: bool,
    pub duration: u64,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl FitViewOptions {
    pub fn for_reason(reason: FitReason, config: &ViewportConfig) -> Self {
        let max_zoom = match reason {
            FitReason::Expand => config.expand_max_zoom,
            FitReason::Focus => config.focus_max_zoom,
        };
        Self {
            padding: config.padding,
            include_hidden_nodes: false,
            duration: config.duration_ms,
            min_zoom: config.min_zoom,
            max_zoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingFit {
    due_ms: u64,
    options: FitViewOptions,
}

#[derive(Debug, Clone)]
pub struct FitViewScheduler {
    config: ViewportConfig,
    pending: Option<PendingFit>,
}

impl FitViewScheduler {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    /// Schedules a fit view `debounce_ms` after `now_ms`, replacing any
    /// request still pending.
    pub fn request(&mut self, reason: FitReason, now_ms: u64) {
        let due_ms = now_ms.saturating_add(self.config.debounce_ms);
        if self.pending.is_some() {
            log::debug!("replacing pending fit view with a new request due at {due_ms}");
        }
        self.pending = Some(PendingFit {
            due_ms,
            options: FitViewOptions::for_reason(reason, &self.config),
        });
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_ms(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.due_ms)
    }

    /// Hands out the pending request once it is due.
    pub fn poll(&mut self, now_ms: u64) -> Option<FitViewOptions> {
        let due = self.pending.as_ref()?.due_ms;
        if now_ms < due {
            return None;
        }
        self.pending.take().map(|pending| pending.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_the_debounce() {
        let mut scheduler = FitViewScheduler::new(ViewportConfig::default());
        scheduler.request(FitReason::Expand, 1_000);
        assert_eq!(scheduler.poll(1_050), None);
        let fired = scheduler.poll(1_100).unwrap();
        assert_eq!(fired.max_zoom, 0.8);
        assert_eq!(fired.duration, 800);
        assert_eq!(scheduler.poll(2_000), None);
    }

    #[test]
    fn newer_request_replaces_pending_one() {
        let mut scheduler = FitViewScheduler::new(ViewportConfig::default());
        scheduler.request(FitReason::Expand, 0);
        scheduler.request(FitReason::Focus, 80);
        assert_eq!(scheduler.poll(100), None);
        let fired = scheduler.poll(180).unwrap();
        assert_eq!(fired.max_zoom, 1.2);
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn cancel_drops_the_request() {
        let mut scheduler = FitViewScheduler::new(ViewportConfig::default());
        scheduler.request(FitReason::Expand, 0);
        scheduler.cancel();
        assert_eq!(scheduler.poll(10_000), None);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(5);
        clock.advance(10);
        assert_eq!(clock.now_ms(), 15);
        clock.set(2);
        assert_eq!(clock.now_ms(), 2);
    }
}
