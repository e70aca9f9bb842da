use anyhow::Result;
use captura::recorder::{ContainerEncoder, ContainerFormat, FfmpegEncoder};
use captura::session::EncoderFactory;
use captura::{
    AppState, Config, CoordinatorConfig, SessionCoordinator, SyntheticBackend,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "captura")]
#[command(about = "Headless screen recording session service")]
struct Args {
    /// Config file path, without extension
    #[arg(short, long, default_value = "config/captura")]
    config: String,

    /// Override the configured HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Could not load config {}: {e}; using defaults", args.config);
            Config::default()
        }
    };

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    if cfg.service.embedded {
        info!("Running in an embedded context; capture denials will suggest a top-level window");
    }

    let probe = FfmpegEncoder::new(ContainerFormat::Webm);
    if !probe.is_available().await {
        warn!("ffmpeg not found on PATH; recordings cannot be assembled until it is installed");
    }

    let backend = Arc::new(SyntheticBackend::default());
    let encoder_factory: Arc<dyn EncoderFactory> = Arc::new(|| {
        Box::new(FfmpegEncoder::new(ContainerFormat::Webm)) as Box<dyn ContainerEncoder>
    });

    let session = SessionCoordinator::spawn(
        backend,
        encoder_factory,
        cfg.initial_settings(),
        CoordinatorConfig {
            embedded_context: cfg.service.embedded,
            ..CoordinatorConfig::default()
        },
    );

    let state = AppState::new(session, cfg.recording.output_dir.clone());
    let router = captura::create_router(state);

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, router).await?;

    Ok(())
}
