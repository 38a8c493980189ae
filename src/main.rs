//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use twitch_vod::adapters::persistence::JsonChatCache;
use twitch_vod::adapters::tools::YtDlpDownloader;
use twitch_vod::adapters::twitch::{GqlChatSource, HelixCatalog};
use twitch_vod::adapters::ui::tui::TuiInputPort;
use twitch_vod::ports::{ChatCache, ChatPageSource, InputPort, VideoDownloaderPort, VodCatalog};
use twitch_vod::shared::AppConfig;
use twitch_vod::usecases::{ChatService, VodService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    twitch_vod::adapters::ui::init_ui();

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let settings = cfg.chat_settings().map_err(|e| anyhow::anyhow!("{}", e))?;

    let output_dir = cfg.output_dir_or_default();
    let output_dir_abs = output_dir
        .canonicalize()
        .unwrap_or_else(|_| output_dir.clone());
    info!(path = %output_dir_abs.display(), "output directory");
    info!(
        max_pages = settings.max_pages,
        attempts = settings.retry.max_attempts,
        "chat pipeline settings"
    );

    // --- Chat: GQL pages + JSON artifact cache ---
    let source: Arc<dyn ChatPageSource> = Arc::new(
        GqlChatSource::new(cfg.api_timeout()).map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let cache: Arc<dyn ChatCache> = Arc::new(JsonChatCache::new(&output_dir));
    let chat_service = Arc::new(ChatService::new(source, cache, settings));

    // --- Metadata: Helix, only with app credentials ---
    let catalog: Option<Arc<dyn VodCatalog>> = if cfg.is_catalog_configured() {
        info!("Helix catalog enabled (TWITCH_CLIENT_ID, TWITCH_CLIENT_SECRET)");
        Some(Arc::new(
            HelixCatalog::new(
                cfg.client_id.clone().unwrap_or_default(),
                cfg.client_secret.clone().unwrap_or_default(),
                cfg.api_timeout(),
                cfg.retry_policy(),
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?
            .with_access_token(cfg.user_access_token.clone()),
        ))
    } else {
        warn!("TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET not set; channel lookups disabled");
        None
    };

    // --- Video: yt-dlp on PATH ---
    let cookies = cfg.cookies_path();
    if cfg.cookies_file.is_some() && cookies.is_none() {
        warn!("TWITCH_COOKIES_FILE does not exist; downloading without cookies");
    }
    let video: Arc<dyn VideoDownloaderPort> =
        Arc::new(YtDlpDownloader::new(None::<&str>, cookies));

    let vod_service = Arc::new(VodService::new(
        catalog,
        video,
        chat_service,
        &output_dir,
        cfg.download_quality_or_default(),
    ));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(vod_service));

    // --- Run (main menu -> latest VOD / chat / full fetch) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
