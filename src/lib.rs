//! Annur OG image generator
//!
//! Renders Open Graph preview cards (1200×630 PNG) from four text fields by
//! laying them out as HTML/CSS and screenshotting the result in headless
//! Chrome.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **Two browser lifecycles**: one shared, health-checked browser for a
//!   long-running server, or a fresh browser per render for one-shot use
//! - **Escaped template**: request text never reaches the document unescaped
//!
//! # Example
//!
//! ```no_run
//! use annur_og::{template, BrowserMode, RenderConfig, RenderService};
//!
//! # async fn run() -> annur_og::Result<()> {
//! let config = RenderConfig::default();
//! let renderer = annur_og::new_renderer(BrowserMode::Shared, config.clone());
//! let service = RenderService::new(renderer, template::TemplateOptions::default(), &config);
//!
//! let image = service.render(&template::RenderRequest::default()).await?;
//! std::fs::write("card.png", &image.png).ok();
//! service.close().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod template;

pub mod lifecycle;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async façade over a blocking `Renderer`
pub mod async_api;
pub use async_api::{RenderService, RenderedImage};

// HTTP surface
pub mod server;

/// Width of an OG card in CSS pixels
pub const OG_WIDTH: u32 = 1200;
/// Height of an OG card in CSS pixels
pub const OG_HEIGHT: u32 = 630;

/// Configuration for rendering
///
/// The defaults match the production card: a 1200×630 viewport, a 30 second
/// page timeout and a 500ms network-idle settle window.
///
/// # Examples
///
/// ```
/// let cfg = annur_og::RenderConfig::default();
/// assert_eq!(cfg.viewport.width, 1200);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Viewport dimensions (also the screenshot clip)
    pub viewport: Viewport,
    /// Per-tab timeout for navigation and evaluation, in milliseconds
    pub timeout_ms: u64,
    /// How long the page must stay free of new network activity, in milliseconds
    pub settle_ms: u64,
    /// Upper bound for a whole render including queueing, in milliseconds
    pub render_timeout_ms: u64,
    /// Override for the Chrome/Chromium executable
    pub chrome_path: Option<PathBuf>,
    /// Drop and relaunch a shared browser that stops answering
    pub health_check: bool,
    /// How long the CDP connection may stay silent before it is dropped
    pub idle_browser_timeout_ms: u64,
    /// Maximum renders in flight at once
    pub max_concurrent_renders: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            timeout_ms: 30000,
            settle_ms: 500,
            render_timeout_ms: 60000,
            chrome_path: None,
            health_check: true,
            idle_browser_timeout_ms: 60 * 60 * 1000,
            max_concurrent_renders: num_cpus::get().max(1),
        }
    }
}

impl RenderConfig {
    /// Reject settings that cannot produce an image
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.max_concurrent_renders == 0 {
            return Err(Error::ConfigError("max_concurrent_renders must be at least 1".into()));
        }
        if self.render_timeout_ms == 0 {
            return Err(Error::ConfigError("render_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: OG_WIDTH,
            height: OG_HEIGHT,
        }
    }
}

/// How browser processes are managed across renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserMode {
    /// One lazily launched browser reused by every render
    #[default]
    Shared,
    /// A fresh browser launched and torn down for each render
    PerRequest,
}

/// Core trait for render backends
///
/// Implementations are blocking; [`RenderService`] moves calls off the async
/// runtime.
pub trait Renderer: Send + Sync {
    /// Render a complete HTML document and return PNG bytes of the viewport
    fn render_png(&self, html: &str) -> Result<Vec<u8>>;

    /// Release any browser process held by this renderer
    fn close(&self) -> Result<()>;
}

/// Create a Chrome-backed renderer for the given lifecycle
#[cfg(feature = "cdp")]
pub fn new_renderer(mode: BrowserMode, config: RenderConfig) -> std::sync::Arc<dyn Renderer> {
    match mode {
        BrowserMode::Shared => std::sync::Arc::new(cdp::SharedChromeRenderer::new(config)),
        BrowserMode::PerRequest => std::sync::Arc::new(cdp::EphemeralChromeRenderer::new(config)),
    }
}
