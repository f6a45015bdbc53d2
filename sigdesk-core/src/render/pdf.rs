//! Page geometry extraction with `lopdf`.
//!
//! Only the page tree is consulted: `/MediaBox`, `/CropBox` and `/Rotate`,
//! each of which may be inherited from an ancestor `/Pages` node.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::{PageHandle, Viewport};
use crate::error::{Result, SigdeskError};
use crate::geometry::{PageDimension, DISPLAY_SCALE};

/// US Letter, used when a page tree carries no usable `/MediaBox` at all.
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parse a PDF and compute both viewports for every page, in page order.
pub fn read_page_handles(bytes: &[u8]) -> Result<Vec<PageHandle>> {
    let doc = Document::load_mem(bytes).map_err(|e| SigdeskError::PdfParse(e.to_string()))?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(SigdeskError::PdfParse("document has no pages".into()));
    }

    let mut handles = Vec::with_capacity(pages.len());
    for (page_number, page_id) in pages {
        let media_box = inherited(&doc, page_id, b"MediaBox")
            .and_then(|obj| to_rect(&doc, obj))
            .unwrap_or(FALLBACK_MEDIA_BOX);
        let view_box = inherited(&doc, page_id, b"CropBox")
            .and_then(|obj| to_rect(&doc, obj))
            .and_then(|crop| intersect(crop, media_box))
            .unwrap_or(media_box);
        let rotation = inherited(&doc, page_id, b"Rotate")
            .and_then(|obj| resolve(&doc, obj).as_i64().ok())
            .map(normalize_rotation)
            .unwrap_or(0);

        let handle = PageHandle::new(page_number, view_box, rotation);
        debug!(
            page = page_number,
            width_points = handle.base.width,
            height_points = handle.base.height,
            rotation,
            "Measured page"
        );
        handles.push(handle);
    }

    Ok(handles)
}

/// Page metrics for a PDF binary, without caching any page handles.
pub fn measure_pages(bytes: &[u8]) -> Result<Vec<PageDimension>> {
    Ok(read_page_handles(bytes)?
        .iter()
        .map(PageHandle::dimension)
        .collect())
}

impl PageHandle {
    fn new(page_number: u32, view_box: [f64; 4], rotation: i64) -> Self {
        let mut width = (view_box[2] - view_box[0]).abs();
        let mut height = (view_box[3] - view_box[1]).abs();
        if rotation % 180 != 0 {
            std::mem::swap(&mut width, &mut height);
        }
        Self {
            page_number,
            view_box,
            rotation,
            base: Viewport {
                scale: 1.0,
                width,
                height,
            },
            display: Viewport {
                scale: DISPLAY_SCALE,
                width: width * DISPLAY_SCALE,
                height: height * DISPLAY_SCALE,
            },
        }
    }
}

/// Look up `key` on the page, walking `/Parent` links until found.
///
/// A `/Parent` chain that revisits a node ends the walk.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut visited = HashSet::new();
    let mut current = Some(page_id);
    while let Some(id) = current {
        if !visited.insert(id) {
            debug!(object = ?id, "Cyclic /Parent chain in page tree");
            return None;
        }
        let dict: &Dictionary = doc.get_object(id).and_then(|o| o.as_dict()).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn to_rect(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(arr) {
        *slot = to_f64(resolve(doc, item))?;
    }
    // Normalize so that [x0, y0] is the lower-left corner.
    Some([
        rect[0].min(rect[2]),
        rect[1].min(rect[3]),
        rect[0].max(rect[2]),
        rect[1].max(rect[3]),
    ])
}

fn to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

fn intersect(a: [f64; 4], b: [f64; 4]) -> Option<[f64; 4]> {
    let rect = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

/// Rotation is only meaningful in quarter turns; anything else is ignored.
fn normalize_rotation(raw: i64) -> i64 {
    let rotation = raw.rem_euclid(360);
    if rotation % 90 == 0 {
        rotation
    } else {
        0
    }
}
