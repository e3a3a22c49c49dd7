//! Deferred scroll requests, re-applied over several draw passes while the
//! layout settles.

/// Draw passes a scroll request stays pinned for. Row heights can keep
/// drifting for a few passes after a jump, so the target offset is recomputed
/// and re-applied this many times before the request expires.
pub const SCROLL_SETTLE_PASSES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingScroll {
    position: usize,
    passes_left: u32,
}

/// Holds at most one pending scroll target and replays it across draw passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollCoordinator {
    pending: Option<PendingScroll>,
}

impl ScrollCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a jump to `position`, an index into the effective row list
    /// (matched positions while a filter is active, the full index
    /// otherwise). A new request restarts the countdown and replaces any
    /// pending target.
    pub fn request(&mut self, position: usize) {
        self.pending = Some(PendingScroll {
            position,
            passes_left: SCROLL_SETTLE_PASSES,
        });
    }

    /// Advance the countdown for one draw pass. Returns the offset to force
    /// this pass, recomputed from the row height known right now; `None` once
    /// the request has expired. The fifth call returns the final offset and
    /// clears the request.
    pub fn on_draw(&mut self, row_height: f32) -> Option<f32> {
        let pending = self.pending.as_mut()?;
        let offset = pending.position as f32 * row_height;
        pending.passes_left -= 1;
        if pending.passes_left == 0 {
            self.pending = None;
        }
        Some(offset)
    }

    /// Target of the pending request, if one is still counting down.
    #[must_use]
    pub fn pending_target(&self) -> Option<usize> {
        self.pending.map(|pending| pending.position)
    }

    /// Drop any pending request without applying it.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
