//! annur-og: Open Graph card renderer
//!
//! `serve` runs the long-running HTTP service; `render` renders one card to a
//! file with a browser launched just for that invocation.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use annur_og::server::{self, AppState};
use annur_og::template::{self, EllipsisPolicy, RenderRequest, TemplateOptions};
use annur_og::{BrowserMode, RenderConfig, RenderService};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "annur-og")]
#[command(version)]
#[command(about = "Renders Open Graph preview cards with headless Chrome")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Render a single card to a PNG file
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Path to Chrome/Chromium executable
    #[arg(long, env = "PUPPETEER_EXECUTABLE_PATH")]
    chrome_path: Option<PathBuf>,

    /// Per-tab timeout for loading the card, in milliseconds
    #[arg(long, env = "OG_PAGE_TIMEOUT_MS", default_value_t = 30000)]
    page_timeout_ms: u64,

    /// Quiet period that counts as network idle, in milliseconds
    #[arg(long, env = "OG_SETTLE_MS", default_value_t = 500)]
    settle_ms: u64,

    /// Upper bound for one render including queueing, in milliseconds
    #[arg(long, env = "OG_RENDER_TIMEOUT_MS", default_value_t = 60000)]
    render_timeout_ms: u64,

    /// Whether short content still gets a trailing ellipsis
    #[arg(long, env = "OG_ELLIPSIS", value_enum, default_value_t = Ellipsis::WhenTruncated)]
    ellipsis: Ellipsis,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Browser lifecycle
    #[arg(long, env = "OG_BROWSER_MODE", value_enum, default_value_t = Mode::Shared)]
    browser_mode: Mode,

    /// Maximum renders in flight (defaults to the CPU count)
    #[arg(long, env = "OG_MAX_CONCURRENT_RENDERS")]
    max_concurrent_renders: Option<usize>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long, default_value = template::DEFAULT_TITLE)]
    title: String,

    #[arg(long, default_value = template::DEFAULT_VOICE)]
    voice: String,

    #[arg(long, default_value = template::DEFAULT_DATE)]
    date: String,

    #[arg(long, default_value = template::DEFAULT_CONTENT)]
    content: String,

    /// Where to write the PNG
    #[arg(short, long, default_value = "og-image.png")]
    output: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// One browser reused across requests
    Shared,
    /// A fresh browser per request
    PerRequest,
}

impl From<Mode> for BrowserMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Shared => BrowserMode::Shared,
            Mode::PerRequest => BrowserMode::PerRequest,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Ellipsis {
    WhenTruncated,
    Always,
}

impl From<Ellipsis> for EllipsisPolicy {
    fn from(ellipsis: Ellipsis) -> Self {
        match ellipsis {
            Ellipsis::WhenTruncated => EllipsisPolicy::WhenTruncated,
            Ellipsis::Always => EllipsisPolicy::Always,
        }
    }
}

impl EngineArgs {
    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            timeout_ms: self.page_timeout_ms,
            settle_ms: self.settle_ms,
            render_timeout_ms: self.render_timeout_ms,
            chrome_path: self.chrome_path.clone(),
            ..Default::default()
        }
    }

    fn template_options(&self) -> TemplateOptions {
        TemplateOptions { ellipsis: self.ellipsis.into(), ..Default::default() }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let env_filter =
        EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let result = match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Render(args) => run_render(args).await,
    };
    if let Err(e) = result {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = args.engine.render_config();
    if let Some(limit) = args.max_concurrent_renders {
        config.max_concurrent_renders = limit;
    }
    config.validate()?;

    let mode = BrowserMode::from(args.browser_mode);
    let renderer = annur_og::new_renderer(mode, config.clone());
    let service = RenderService::new(renderer, args.engine.template_options(), &config);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "Annur OG Generator listening on {} ({:?} browser, {} concurrent renders)",
        addr,
        mode,
        config.max_concurrent_renders
    );

    server::serve(listener, AppState::new(service), server::shutdown_signal()).await?;
    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn run_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = args.engine.render_config();
    config.validate()?;

    let renderer = annur_og::new_renderer(BrowserMode::PerRequest, config.clone());
    let service = RenderService::new(renderer, args.engine.template_options(), &config);
    let request = RenderRequest {
        title: args.title,
        voice: args.voice,
        date: args.date,
        content: args.content,
    };

    let image = service.render(&request).await.context("Failed to generate image")?;
    tokio::fs::write(&args.output, &image.png)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Wrote {} ({} bytes)", args.output.display(), image.png.len());
    Ok(())
}
