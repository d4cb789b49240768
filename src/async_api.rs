//! Async render service
//!
//! Wraps a blocking [`Renderer`] for use from async handlers: each render runs
//! on tokio's blocking pool, the number of renders in flight is bounded by a
//! semaphore, and every render is bounded by a timeout.

use crate::template::{self, RenderRequest, TemplateOptions};
use crate::{Error, RenderConfig, Renderer, Result, Viewport};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// A finished card
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// PNG bytes
    pub png: Vec<u8>,
    /// Strong validator for HTTP caching (quoted)
    pub etag: String,
}

/// Entity tag for a document rendered at `viewport`
pub fn document_etag(html: &str, viewport: Viewport) -> String {
    let mut hasher = Sha256::new();
    hasher.update(viewport.width.to_le_bytes());
    hasher.update(viewport.height.to_le_bytes());
    hasher.update(html.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("\"{}\"", &digest[..32])
}

/// Async-friendly front for a [`Renderer`].
///
/// Cheap to clone; clones share the renderer and the concurrency limit.
#[derive(Clone)]
pub struct RenderService {
    inner: Arc<Inner>,
}

struct Inner {
    renderer: Arc<dyn Renderer>,
    template: TemplateOptions,
    viewport: Viewport,
    permits: Arc<Semaphore>,
    render_timeout: Duration,
}

impl RenderService {
    pub fn new(renderer: Arc<dyn Renderer>, template: TemplateOptions, config: &RenderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                renderer,
                template,
                viewport: config.viewport,
                permits: Arc::new(Semaphore::new(config.max_concurrent_renders.max(1))),
                render_timeout: Duration::from_millis(config.render_timeout_ms),
            }),
        }
    }

    /// The HTML document for `request`
    pub fn document(&self, request: &RenderRequest) -> String {
        template::render_html(request, &self.inner.template)
    }

    /// Entity tag the image for `request` will carry
    pub fn etag(&self, request: &RenderRequest) -> String {
        document_etag(&self.document(request), self.inner.viewport)
    }

    /// Renders currently allowed to start without waiting
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Render the card for `request`
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderedImage> {
        let html = self.document(request);
        let etag = document_etag(&html, self.inner.viewport);
        let png = self.render_document(html).await?;
        Ok(RenderedImage { png, etag })
    }

    /// Render an already built document
    pub async fn render_document(&self, html: String) -> Result<Vec<u8>> {
        let timeout = self.inner.render_timeout;
        let work = async {
            let permit = self
                .inner
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::ShuttingDown)?;
            let renderer = self.inner.renderer.clone();
            // The permit travels with the blocking task: a timed out render
            // keeps its slot until the browser work really ends.
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                renderer.render_png(&html)
            })
            .await?
        };
        let png = tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| Error::Timeout(timeout.as_millis() as u64))??;
        if png.is_empty() {
            return Err(Error::RenderError("Renderer returned an empty image".into()));
        }
        Ok(png)
    }

    /// Stop accepting renders and release the browser
    pub async fn close(&self) -> Result<()> {
        self.inner.permits.close();
        let renderer = self.inner.renderer.clone();
        tokio::task::spawn_blocking(move || renderer.close()).await?
    }
}
