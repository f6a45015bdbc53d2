//! Owning registry of per-document renderers.
//!
//! Every preview is acquired through the registry and released through it,
//! so removing a document always cancels its renders and frees its surfaces.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::{PageRasterizer, PageRenderer};
use crate::ids::DocumentId;

pub struct PreviewRegistry {
    rasterizer: Arc<dyn PageRasterizer>,
    renderers: DashMap<DocumentId, Arc<PageRenderer>>,
}

impl PreviewRegistry {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            rasterizer,
            renderers: DashMap::new(),
        }
    }

    /// Renderer for a document, created on first use.
    pub fn acquire(&self, document_id: &DocumentId) -> Arc<PageRenderer> {
        self.renderers
            .entry(document_id.clone())
            .or_insert_with(|| {
                debug!(document = %document_id, "Creating preview renderer");
                Arc::new(PageRenderer::new(Arc::clone(&self.rasterizer)))
            })
            .value()
            .clone()
    }

    pub fn get(&self, document_id: &DocumentId) -> Option<Arc<PageRenderer>> {
        self.renderers
            .get(document_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Cancel and drop a document's renderer. Returns whether one existed.
    pub fn release(&self, document_id: &DocumentId) -> bool {
        match self.renderers.remove(document_id) {
            Some((_, renderer)) => {
                renderer.cancel();
                debug!(document = %document_id, "Released preview renderer");
                true
            }
            None => false,
        }
    }

    pub fn release_all(&self) {
        self.renderers.retain(|_, renderer| {
            renderer.cancel();
            false
        });
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl Drop for PreviewRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
