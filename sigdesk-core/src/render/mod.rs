//! Page/viewport renderer.
//!
//! A [`PageRenderer`] owns everything derived from one document version: the
//! cached per-page handles, the raster surfaces, and the in-flight render
//! tasks. [`PageRenderer::cancel`] releases all of it, and every load starts
//! by cancelling so renders for a previous binary can never land on the new
//! document's surfaces.

mod outline;
mod pdf;
mod registry;

pub use outline::{paint_placement, OutlineRasterizer};
pub use pdf::{measure_pages, read_page_handles};
pub use registry::PreviewRegistry;

#[cfg(test)]
pub(crate) use pdf::fixtures;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SigdeskError};
use crate::geometry::PageDimension;
use crate::ids::DocumentId;

/// Raster output for one page.
pub type RasterSurface = image::RgbaImage;

/// Size of a page at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub width: f64,
    pub height: f64,
}

/// Cached geometry for one page of the loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageHandle {
    pub page_number: u32,
    /// Visible area in PDF user space, `[x0, y0, x1, y1]`.
    pub view_box: [f64; 4],
    /// Clockwise rotation in degrees (0, 90, 180 or 270).
    pub rotation: i64,
    /// Viewport at scale 1.0 (point space).
    pub base: Viewport,
    /// Viewport at the display scale (pixel space).
    pub display: Viewport,
}

impl PageHandle {
    pub fn dimension(&self) -> PageDimension {
        PageDimension {
            page_number: self.page_number,
            width: self.display.width,
            height: self.display.height,
            width_points: self.base.width,
            height_points: self.base.height,
        }
    }
}

/// Produces a raster surface for a page at its display viewport.
///
/// Implementations must be thread-safe (`Send + Sync`); renders for different
/// pages may run concurrently.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, page: &PageHandle) -> Result<RasterSurface>;
}

/// Lifecycle of a document preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Loading,
    Ready { page_count: usize },
    /// The PDF could not be parsed; signing must be blocked for it.
    Failed(String),
}

struct RendererShared {
    generation: AtomicU64,
    pages: DashMap<u32, PageHandle>,
    surfaces: DashMap<u32, RasterSurface>,
    tasks: DashMap<u32, JoinHandle<()>>,
    state: Mutex<PreviewState>,
    document_id: Mutex<Option<DocumentId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RendererShared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: PreviewState) {
        *lock(&self.state) = state;
    }
}

/// Loads one document's pages and renders them through a [`PageRasterizer`].
pub struct PageRenderer {
    shared: Arc<RendererShared>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl PageRenderer {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            shared: Arc::new(RendererShared {
                generation: AtomicU64::new(0),
                pages: DashMap::new(),
                surfaces: DashMap::new(),
                tasks: DashMap::new(),
                state: Mutex::new(PreviewState::Idle),
                document_id: Mutex::new(None),
            }),
            rasterizer,
        }
    }

    pub fn state(&self) -> PreviewState {
        lock(&self.shared.state).clone()
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        lock(&self.shared.document_id).clone()
    }

    /// Parse `bytes` and report every page's metrics as one ordered batch.
    ///
    /// Prior resources are released first. If this load is superseded while
    /// parsing, it returns [`SigdeskError::Cancelled`] and publishes nothing.
    #[instrument(level = "debug", skip(self, bytes), fields(document = %document_id, bytes = bytes.len()))]
    pub async fn load(&self, document_id: &DocumentId, bytes: Vec<u8>) -> Result<Vec<PageDimension>> {
        let generation = self.cancel();
        *lock(&self.shared.document_id) = Some(document_id.clone());
        self.shared.set_state(PreviewState::Loading);

        let parsed = tokio::task::spawn_blocking(move || read_page_handles(&bytes))
            .await
            .map_err(|e| SigdeskError::Render(format!("page metrics task failed: {e}")))?;

        // Publishing happens under the state lock so a concurrent cancel()
        // either precedes it or clears everything it wrote.
        let mut state = lock(&self.shared.state);
        if self.shared.generation() != generation {
            debug!("Load superseded, discarding page metrics");
            return Err(SigdeskError::Cancelled);
        }

        let handles = match parsed {
            Ok(handles) => handles,
            Err(err) => {
                warn!(error = %err, "Unable to load PDF preview");
                *state = PreviewState::Failed(err.to_string());
                return Err(err);
            }
        };

        for handle in &handles {
            self.shared.pages.insert(handle.page_number, handle.clone());
        }
        *state = PreviewState::Ready {
            page_count: handles.len(),
        };
        drop(state);
        info!(pages = handles.len(), "PDF preview loaded");

        Ok(handles.iter().map(PageHandle::dimension).collect())
    }

    /// Metrics of the currently cached pages, in page order.
    pub fn page_dimensions(&self) -> Vec<PageDimension> {
        let mut pages: Vec<PageDimension> = self
            .shared
            .pages
            .iter()
            .map(|entry| entry.value().dimension())
            .collect();
        pages.sort_by_key(|page| page.page_number);
        pages
    }

    /// Start rendering one cached page onto its surface.
    ///
    /// Must be called from within a tokio runtime. A render failure is logged
    /// and leaves the page blank; it never affects other pages.
    pub fn render(&self, page_number: u32) -> Result<()> {
        let handle = self
            .shared
            .pages
            .get(&page_number)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SigdeskError::Render(format!("page {page_number} is not loaded")))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SigdeskError::Render(format!("no async runtime available: {e}")))?;

        let generation = self.shared.generation();
        let shared = Arc::clone(&self.shared);
        let rasterizer = Arc::clone(&self.rasterizer);

        let task = runtime.spawn(async move {
            match rasterizer.rasterize(&handle).await {
                Ok(surface) => {
                    let _state = lock(&shared.state);
                    if shared.generation() == generation {
                        shared.surfaces.insert(handle.page_number, surface);
                    } else {
                        debug!(page = handle.page_number, "Discarding stale render");
                    }
                }
                Err(err) => {
                    warn!(page = handle.page_number, error = %err, "Failed to render PDF page");
                }
            }
        });

        if let Some(previous) = self.shared.tasks.insert(page_number, task) {
            previous.abort();
        }
        Ok(())
    }

    /// Start rendering every cached page.
    pub fn render_all(&self) -> Result<()> {
        let mut page_numbers: Vec<u32> = self.shared.pages.iter().map(|e| *e.key()).collect();
        page_numbers.sort_unstable();
        for page_number in page_numbers {
            self.render(page_number)?;
        }
        Ok(())
    }

    /// Wait for every in-flight render to finish.
    pub async fn settle(&self) {
        let page_numbers: Vec<u32> = self.shared.tasks.iter().map(|e| *e.key()).collect();
        for page_number in page_numbers {
            let Some((_, task)) = self.shared.tasks.remove(&page_number) else {
                continue;
            };
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(page = page_number, error = %err, "Render task aborted");
                }
            }
        }
    }

    /// Rendered surface for a page, if its render completed.
    pub fn surface(&self, page_number: u32) -> Option<RasterSurface> {
        self.shared
            .surfaces
            .get(&page_number)
            .map(|entry| entry.value().clone())
    }

    /// Release every cached page and abort in-flight renders.
    ///
    /// Idempotent. Returns the new generation; anything started under an
    /// older generation is discarded when it completes.
    pub fn cancel(&self) -> u64 {
        let mut state = lock(&self.shared.state);
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.tasks.retain(|_, task| {
            task.abort();
            false
        });
        self.shared.pages.clear();
        self.shared.surfaces.clear();
        *state = PreviewState::Idle;
        generation
    }
}

impl Drop for PageRenderer {
    fn drop(&mut self) {
        self.cancel();
    }
}
