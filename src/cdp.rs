//! Chrome DevTools Protocol render backend

use crate::lifecycle::{Launcher, SharedBrowser};
use crate::{Error, RenderConfig, Renderer, Result};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// Extra Chrome flags for constrained hosts (containers, serverless sandboxes).
/// The sandbox itself is turned off through `LaunchOptions::sandbox`.
pub const CHROME_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
];

// Resolves once web fonts are ready and no resource has finished loading for
// `{{SETTLE_MS}}` milliseconds.
const NETWORK_IDLE_TEMPLATE: &str = r#"(async function(){
    if (document.fonts && document.fonts.ready) {
        await document.fonts.ready;
    }
    const settle = {{SETTLE_MS}};
    const count = function(){ return performance.getEntriesByType('resource').length; };
    let last = count();
    let quietSince = Date.now();
    while (Date.now() - quietSince < settle) {
        await new Promise(function(resolve){ setTimeout(resolve, 50); });
        const now = count();
        if (now !== last) {
            last = now;
            quietSince = Date.now();
        }
    }
    return last;
})()"#;

/// Build the launch options for one browser process
pub fn launch_options(config: &RenderConfig) -> Result<LaunchOptions<'static>> {
    LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .window_size(Some((config.viewport.width, config.viewport.height)))
        .path(config.chrome_path.clone())
        .idle_browser_timeout(Duration::from_millis(config.idle_browser_timeout_ms))
        .args(CHROME_ARGS.iter().map(OsStr::new).collect())
        .build()
        .map_err(|e| Error::ConfigError(format!("Failed to build launch options: {}", e)))
}

/// Launches headless Chrome with [`launch_options`]
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: RenderConfig,
}

impl ChromeLauncher {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl Launcher for ChromeLauncher {
    type Browser = Browser;

    fn launch(&self) -> Result<Browser> {
        let options = launch_options(&self.config)?;
        Browser::new(options).map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))
    }

    fn is_alive(&self, browser: &Browser) -> bool {
        match browser.get_version() {
            Ok(_) => true,
            Err(e) => {
                debug!("Browser health check failed: {}", e);
                false
            }
        }
    }
}

/// Encode a document as a `data:` URL so it loads without a server
pub fn data_url(html: &str) -> String {
    let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, html);
    format!("data:text/html;charset=utf-8;base64,{}", b64)
}

fn open_tab(browser: &Browser) -> Result<Arc<Tab>> {
    browser
        .new_tab()
        .map_err(|e| Error::InitializationError(format!("Failed to open tab: {}", e)))
}

/// Load `html` into `tab`, wait for network idle and capture the viewport
pub fn render_in_tab(tab: &Tab, html: &str, config: &RenderConfig) -> Result<Vec<u8>> {
    tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

    tab.navigate_to(&data_url(html))
        .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
    tab.wait_until_navigated()
        .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

    let idle_script = NETWORK_IDLE_TEMPLATE.replace("{{SETTLE_MS}}", &config.settle_ms.to_string());
    tab.evaluate(&idle_script, true)
        .map_err(|e| Error::LoadError(format!("Wait for network idle failed: {}", e)))?;

    let clip = Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: config.viewport.width as f64,
        height: config.viewport.height as f64,
        scale: 1.0,
    };
    tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
        .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
}

/// Render `html` in a fresh tab of `browser`; the tab is closed whatever the outcome
fn render_with_tab(tab: Arc<Tab>, html: &str, config: &RenderConfig) -> Result<Vec<u8>> {
    let result = render_in_tab(&tab, html, config);
    if let Err(e) = tab.close(false) {
        warn!("Failed to close tab: {}", e);
    }
    result
}

/// Renders every document in one long-lived browser
///
/// The browser is launched on the first render and reused afterwards; each
/// render gets its own tab.
pub struct SharedChromeRenderer {
    browser: SharedBrowser<ChromeLauncher>,
    config: RenderConfig,
}

impl SharedChromeRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            browser: SharedBrowser::new(ChromeLauncher::new(config.clone()), config.health_check),
            config,
        }
    }

    /// Whether the shared browser process is currently running
    pub fn is_launched(&self) -> bool {
        self.browser.is_launched()
    }
}

impl Renderer for SharedChromeRenderer {
    fn render_png(&self, html: &str) -> Result<Vec<u8>> {
        let browser = self.browser.acquire()?;
        let tab = match open_tab(&browser) {
            Ok(tab) => tab,
            Err(e) => {
                if self.config.health_check {
                    self.browser.invalidate(&browser);
                }
                return Err(e);
            }
        };
        render_with_tab(tab, html, &self.config)
    }

    fn close(&self) -> Result<()> {
        self.browser.shutdown();
        Ok(())
    }
}

/// Launches a browser for each render and tears it down afterwards
pub struct EphemeralChromeRenderer {
    launcher: ChromeLauncher,
    config: RenderConfig,
}

impl EphemeralChromeRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            launcher: ChromeLauncher::new(config.clone()),
            config,
        }
    }
}

impl Renderer for EphemeralChromeRenderer {
    fn render_png(&self, html: &str) -> Result<Vec<u8>> {
        let browser = self.launcher.launch()?;
        let tab = open_tab(&browser)?;
        let result = render_with_tab(tab, html, &self.config);
        // Dropping the handle terminates the child process
        drop(browser);
        result
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
