//! Blank page rasterizer and overlay painting for placement previews.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use super::{PageHandle, PageRasterizer, RasterSurface};
use crate::error::{Result, SigdeskError};
use crate::geometry::PixelRect;

/// Largest surface edge we are willing to allocate, in pixels.
const MAX_SURFACE_EDGE: f64 = 16_384.0;

/// Side of the square resize handle drawn at the bottom-right corner.
const HANDLE_SIZE: u32 = 14;

/// Renders each page as a white sheet with a thin border at display size.
///
/// Page content is not drawn; the surface exists so overlay boxes can be
/// checked against the page frame.
#[derive(Debug, Clone)]
pub struct OutlineRasterizer {
    pub background: Rgba<u8>,
    pub border: Rgba<u8>,
}

impl Default for OutlineRasterizer {
    fn default() -> Self {
        Self {
            background: Rgba([255, 255, 255, 255]),
            border: Rgba([148, 163, 184, 255]),
        }
    }
}

#[async_trait]
impl PageRasterizer for OutlineRasterizer {
    async fn rasterize(&self, page: &PageHandle) -> Result<RasterSurface> {
        let width = page.display.width.round();
        let height = page.display.height.round();
        if !(1.0..=MAX_SURFACE_EDGE).contains(&width) || !(1.0..=MAX_SURFACE_EDGE).contains(&height)
        {
            return Err(SigdeskError::Render(format!(
                "page {} has unusable display size {width}x{height}",
                page.page_number
            )));
        }

        let mut surface = RgbaImage::from_pixel(width as u32, height as u32, self.background);
        stroke_rect(&mut surface, 0, 0, width as u32, height as u32, 1, self.border);
        Ok(surface)
    }
}

/// Paint an overlay box onto a page surface.
///
/// The box is tinted, outlined with a 2px border and gets a resize handle at
/// its bottom-right corner.
pub fn paint_placement(surface: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    let (surface_w, surface_h) = surface.dimensions();
    let x0 = rect.x.max(0.0).round() as u32;
    let y0 = rect.y.max(0.0).round() as u32;
    let x1 = ((rect.x + rect.width).round().max(0.0) as u32).min(surface_w);
    let y1 = ((rect.y + rect.height).round().max(0.0) as u32).min(surface_h);
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let tint = Rgba([color[0], color[1], color[2], 31]);
    for y in y0..y1 {
        for x in x0..x1 {
            blend(surface.get_pixel_mut(x, y), tint);
        }
    }
    stroke_rect(surface, x0, y0, x1 - x0, y1 - y0, 2, color);

    let half = HANDLE_SIZE / 2;
    let hx0 = x1.saturating_sub(half);
    let hy0 = y1.saturating_sub(half);
    for y in hy0..(y1 + half).min(surface_h) {
        for x in hx0..(x1 + half).min(surface_w) {
            surface.put_pixel(x, y, color);
        }
    }
}

fn stroke_rect(
    surface: &mut RgbaImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    thickness: u32,
    color: Rgba<u8>,
) {
    let (surface_w, surface_h) = surface.dimensions();
    let x_end = (x + width).min(surface_w);
    let y_end = (y + height).min(surface_h);
    for py in y..y_end {
        for px in x..x_end {
            let on_edge = px < x + thickness
                || py < y + thickness
                || px + thickness >= x_end
                || py + thickness >= y_end;
            if on_edge {
                surface.put_pixel(px, py, color);
            }
        }
    }
}

fn blend(pixel: &mut Rgba<u8>, over: Rgba<u8>) {
    let alpha = over[3] as u32;
    for channel in 0..3 {
        let under = pixel[channel] as u32;
        pixel[channel] = ((over[channel] as u32 * alpha + under * (255 - alpha)) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{NormalizedPlacement, PageDimension};
    use crate::render::Viewport;

    fn handle(width: f64, height: f64) -> PageHandle {
        PageHandle {
            page_number: 1,
            view_box: [0.0, 0.0, width, height],
            rotation: 0,
            base: Viewport {
                scale: 1.0,
                width,
                height,
            },
            display: Viewport {
                scale: 1.5,
                width: width * 1.5,
                height: height * 1.5,
            },
        }
    }

    #[tokio::test]
    async fn test_surface_matches_display_viewport() {
        let surface = OutlineRasterizer::default()
            .rasterize(&handle(400.0, 300.0))
            .await
            .unwrap();
        assert_eq!(surface.dimensions(), (600, 450));
        assert_eq!(*surface.get_pixel(300, 200), Rgba([255, 255, 255, 255]));
        assert_eq!(*surface.get_pixel(0, 0), Rgba([148, 163, 184, 255]));
    }

    #[tokio::test]
    async fn test_degenerate_page_is_rejected() {
        let result = OutlineRasterizer::default().rasterize(&handle(0.0, 300.0)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_paint_placement_outlines_the_box() {
        let page = PageDimension::from_points(1, 400.0, 300.0);
        let mut surface = RgbaImage::from_pixel(600, 450, Rgba([255, 255, 255, 255]));
        let rect = NormalizedPlacement::default_for_page(1).to_pixels(&page);
        let color = Rgba([37, 99, 235, 255]);

        paint_placement(&mut surface, rect, color);

        // Border at the top-left corner of the box (120, 90).
        assert_eq!(*surface.get_pixel(120, 90), color);
        // Interior is tinted, not opaque.
        let inside = surface.get_pixel(200, 120);
        assert_ne!(*inside, color);
        assert!(inside[0] < 255);
        // Outside untouched.
        assert_eq!(*surface.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    }
}
