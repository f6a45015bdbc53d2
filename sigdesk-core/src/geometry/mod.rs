//! Overlay geometry: placement model and coordinate-space conversions.
//!
//! Three spaces are involved:
//!
//! - **Normalized space** - fractions (0..1) of the page width/height measured
//!   from the page's top-left corner. All placement editing happens here.
//! - **Pixel space** - the page rendered at [`DISPLAY_SCALE`], top-left origin.
//! - **Point space** - PDF user space at scale 1.0, bottom-left origin. The
//!   signing service only ever receives coordinates in this space.
//!
//! [`NormalizedPlacement`] and [`PointPlacement`] are distinct types so that a
//! conversion is the only way across the boundary.

mod gesture;

pub use gesture::{GestureMode, GestureTracker, Interaction};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SigdeskError};

/// Scale at which pages are rendered for on-screen placement.
pub const DISPLAY_SCALE: f64 = 1.5;

/// Smallest width/height an overlay may shrink to, as a page fraction.
pub const MIN_SIZE_RATIO: f64 = 0.05;

/// Clamp that tolerates `min > max` by favouring `max`, and maps NaN to `min`.
pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Geometry of one page, produced once per page when a document is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimension {
    /// 1-based page number.
    pub page_number: u32,
    /// Rendered width in pixels at [`DISPLAY_SCALE`].
    pub width: f64,
    /// Rendered height in pixels at [`DISPLAY_SCALE`].
    pub height: f64,
    /// Width in PDF points.
    pub width_points: f64,
    /// Height in PDF points.
    pub height_points: f64,
}

impl PageDimension {
    /// Build a page record from its point size, deriving the display size.
    pub fn from_points(page_number: u32, width_points: f64, height_points: f64) -> Self {
        Self {
            page_number,
            width: width_points * DISPLAY_SCALE,
            height: height_points * DISPLAY_SCALE,
            width_points,
            height_points,
        }
    }

    pub fn find(pages: &[PageDimension], page_number: u32) -> Option<&PageDimension> {
        pages.iter().find(|page| page.page_number == page_number)
    }

    fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width_points > 0.0 && self.height_points > 0.0
    }
}

/// Placement of a visible signature in normalized page-fraction space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPlacement {
    pub page: u32,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Placement in PDF point space, `y` measured from the page's bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPlacement {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Overlay box in rendered-pixel space, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A single numeric field edited in point space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointField {
    X,
    Y,
    Width,
    Height,
}

impl NormalizedPlacement {
    /// Build a placement, clamping it into the page.
    pub fn new(page: u32, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            left,
            top,
            width,
            height,
        }
        .clamped()
    }

    /// Placement given to freshly added overlays.
    pub fn default_for_page(page: u32) -> Self {
        Self {
            page,
            left: 0.2,
            top: 0.2,
            width: 0.3,
            height: 0.18,
        }
    }

    /// Force the rectangle back inside the page and above the size floor.
    ///
    /// Size is clamped first so the position bounds are computed from the
    /// final size.
    pub fn clamped(self) -> Self {
        let width = clamp(self.width, MIN_SIZE_RATIO, 1.0);
        let height = clamp(self.height, MIN_SIZE_RATIO, 1.0);
        Self {
            page: self.page,
            left: clamp(self.left, 0.0, 1.0 - width),
            top: clamp(self.top, 0.0, 1.0 - height),
            width,
            height,
        }
    }

    /// Same rectangle moved to another page.
    pub fn on_page(self, page: u32) -> Self {
        Self { page, ..self }
    }

    pub fn to_pixels(&self, page: &PageDimension) -> PixelRect {
        PixelRect {
            x: self.left * page.width,
            y: self.top * page.height,
            width: self.width * page.width,
            height: self.height * page.height,
        }
    }

    /// Convert to point space, flipping the vertical axis.
    pub fn to_points(&self, page: &PageDimension) -> PointPlacement {
        PointPlacement {
            page: self.page,
            x: self.left * page.width_points,
            y: (1.0 - (self.top + self.height)) * page.height_points,
            width: self.width * page.width_points,
            height: self.height * page.height_points,
        }
    }

    /// Translate by a normalized delta, keeping the size fixed.
    pub fn moved_by(&self, dx: f64, dy: f64) -> Self {
        Self {
            left: clamp(self.left + dx, 0.0, 1.0 - self.width),
            top: clamp(self.top + dy, 0.0, 1.0 - self.height),
            ..*self
        }
    }

    /// Grow or shrink from the fixed top-left anchor.
    pub fn resized_by(&self, dx: f64, dy: f64) -> Self {
        Self {
            width: clamp(self.width + dx, MIN_SIZE_RATIO, 1.0 - self.left),
            height: clamp(self.height + dy, MIN_SIZE_RATIO, 1.0 - self.top),
            ..*self
        }
    }

    /// Apply an edit of a single point-space field.
    ///
    /// Returns `None` for non-finite input or a page without area; the caller
    /// drops the edit in that case.
    pub fn with_point_field(
        &self,
        field: PointField,
        value: f64,
        page: &PageDimension,
    ) -> Option<Self> {
        if !value.is_finite() || !page.has_area() {
            return None;
        }

        let next = match field {
            PointField::X => Self {
                left: clamp(value / page.width_points, 0.0, 1.0 - self.width),
                ..*self
            },
            PointField::Width => Self {
                width: clamp(value / page.width_points, MIN_SIZE_RATIO, 1.0 - self.left),
                ..*self
            },
            PointField::Height => Self {
                height: clamp(value / page.height_points, MIN_SIZE_RATIO, 1.0 - self.top),
                ..*self
            },
            PointField::Y => {
                let bottom = clamp(value / page.height_points, 0.0, 1.0);
                Self {
                    top: clamp(1.0 - bottom - self.height, 0.0, 1.0 - self.height),
                    ..*self
                }
            }
        };
        Some(next)
    }
}

impl PointPlacement {
    /// Inverse of [`NormalizedPlacement::to_points`], clamped into the page.
    pub fn to_normalized(&self, page: &PageDimension) -> Option<NormalizedPlacement> {
        if !page.has_area() {
            return None;
        }
        let width = self.width / page.width_points;
        let height = self.height / page.height_points;
        let left = self.x / page.width_points;
        let top = 1.0 - self.y / page.height_points - height;
        Some(NormalizedPlacement::new(self.page, left, top, width, height))
    }
}

/// Resolve a placement against measured pages and convert it to point space.
pub fn placement_to_points(
    placement: &NormalizedPlacement,
    pages: &[PageDimension],
) -> Result<PointPlacement> {
    let page = PageDimension::find(pages, placement.page).ok_or_else(|| {
        SigdeskError::validation("Page metrics unavailable for selected page.")
    })?;
    Ok(placement.to_points(page))
}
