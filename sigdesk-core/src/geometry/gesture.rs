//! Pointer-driven move/resize state machine.
//!
//! `idle -> dragging(move | resize) -> idle`. A gesture snapshots the overlay's
//! placement at pointer-down and every pointer-move recomputes the placement
//! from that snapshot, so rounding never accumulates across moves.

use tracing::debug;

use super::{NormalizedPlacement, PageDimension};
use crate::ids::OverlayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    /// Pointer went down on the overlay body.
    Move,
    /// Pointer went down on the bottom-right resize handle.
    Resize,
}

/// An in-progress drag. Exists only between pointer-down and pointer-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub overlay_id: OverlayId,
    pub page_number: u32,
    pub start_x: f64,
    pub start_y: f64,
    pub initial_placement: NormalizedPlacement,
    pub mode: GestureMode,
}

impl Interaction {
    /// Placement for the pointer at screen position `(x, y)`.
    ///
    /// The screen delta is converted using the pixel size of the page the
    /// gesture started on.
    pub fn placement_at(&self, x: f64, y: f64, page: &PageDimension) -> Option<NormalizedPlacement> {
        if page.width <= 0.0 || page.height <= 0.0 {
            return None;
        }
        let dx = (x - self.start_x) / page.width;
        let dy = (y - self.start_y) / page.height;
        Some(match self.mode {
            GestureMode::Move => self.initial_placement.moved_by(dx, dy),
            GestureMode::Resize => self.initial_placement.resized_by(dx, dy),
        })
    }
}

/// Holds at most one active gesture for a workspace.
#[derive(Debug, Default)]
pub struct GestureTracker {
    active: Option<Interaction>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&Interaction> {
        self.active.as_ref()
    }

    /// Start a gesture, replacing any gesture that never saw its pointer-up.
    pub fn begin(&mut self, interaction: Interaction) {
        if let Some(previous) = self.active.replace(interaction) {
            debug!(overlay = %previous.overlay_id, "Dropping unterminated gesture");
        }
    }

    /// Compute the placement for a pointer-move.
    ///
    /// Returns `None` when idle or when the gesture's page is not measured.
    pub fn update(
        &self,
        x: f64,
        y: f64,
        pages: &[PageDimension],
    ) -> Option<(OverlayId, NormalizedPlacement)> {
        let interaction = self.active.as_ref()?;
        let page = PageDimension::find(pages, interaction.page_number)?;
        let placement = interaction.placement_at(x, y, page)?;
        Some((interaction.overlay_id.clone(), placement))
    }

    /// Pointer-up: return to idle.
    pub fn end(&mut self) -> Option<Interaction> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageDimension {
        PageDimension::from_points(1, 600.0, 800.0)
    }

    fn interaction(mode: GestureMode) -> Interaction {
        Interaction {
            overlay_id: OverlayId::from("ov-1"),
            page_number: 1,
            start_x: 100.0,
            start_y: 100.0,
            initial_placement: NormalizedPlacement::default_for_page(1),
            mode,
        }
    }

    #[test]
    fn test_move_uses_page_pixel_size() {
        let mut tracker = GestureTracker::new();
        tracker.begin(interaction(GestureMode::Move));

        // 900 x 1200 px page: +90px = +0.1, +120px = +0.1
        let (id, placement) = tracker.update(190.0, 220.0, &[page()]).unwrap();
        assert_eq!(id.as_str(), "ov-1");
        assert!((placement.left - 0.3).abs() < 1e-9);
        assert!((placement.top - 0.3).abs() < 1e-9);
        assert_eq!(placement.width, 0.3);
    }

    #[test]
    fn test_moves_are_relative_to_the_snapshot() {
        let mut tracker = GestureTracker::new();
        tracker.begin(interaction(GestureMode::Move));

        tracker.update(1000.0, 1000.0, &[page()]).unwrap();
        let (_, back) = tracker.update(100.0, 100.0, &[page()]).unwrap();
        assert_eq!(back, NormalizedPlacement::default_for_page(1));
    }

    #[test]
    fn test_resize_grows_from_anchor() {
        let mut tracker = GestureTracker::new();
        tracker.begin(interaction(GestureMode::Resize));

        let (_, placement) = tracker.update(-5000.0, 190.0, &[page()]).unwrap();
        assert_eq!(placement.left, 0.2);
        assert_eq!(placement.top, 0.2);
        assert_eq!(placement.width, crate::geometry::MIN_SIZE_RATIO);
        assert!((placement.height - (0.18 + 90.0 / 1200.0)).abs() < 1e-9);
    }

    #[test]
    fn test_pointer_up_returns_to_idle() {
        let mut tracker = GestureTracker::new();
        tracker.begin(interaction(GestureMode::Move));
        assert!(tracker.is_dragging());

        let finished = tracker.end().unwrap();
        assert_eq!(finished.mode, GestureMode::Move);
        assert!(!tracker.is_dragging());
        assert!(tracker.update(150.0, 150.0, &[page()]).is_none());
        assert!(tracker.end().is_none());
    }

    #[test]
    fn test_unmeasured_page_is_a_no_op() {
        let mut tracker = GestureTracker::new();
        tracker.begin(interaction(GestureMode::Move));
        assert!(tracker.update(150.0, 150.0, &[]).is_none());
    }

    #[test]
    fn test_only_one_gesture_is_active() {
        let mut tracker = GestureTracker::new();
        tracker.begin(interaction(GestureMode::Move));
        let mut second = interaction(GestureMode::Resize);
        second.overlay_id = OverlayId::from("ov-2");
        tracker.begin(second);

        assert_eq!(tracker.active().unwrap().overlay_id.as_str(), "ov-2");
    }
}
