use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lockstep=info,tower_http=debug")),
        )
        .init();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;

    // CLI --web-dir overrides config file
    let web_dir: Option<PathBuf> = args
        .web_dir
        .or(config.server.web_dir.clone())
        .map(PathBuf::from)
        .filter(|p| {
            if p.is_dir() {
                true
            } else {
                tracing::warn!(
                    "Viewer page directory {:?} does not exist, skipping static file serving",
                    p
                );
                false
            }
        });

    let video_dir: Option<PathBuf> = config
        .media
        .video_dir
        .clone()
        .map(PathBuf::from)
        .filter(|p| {
            if p.is_dir() {
                true
            } else {
                tracing::warn!(
                    "Video directory {:?} does not exist, library will be unavailable",
                    p
                );
                false
            }
        });

    let public_url = config
        .server
        .public_url
        .clone()
        .unwrap_or_else(|| {
            let bind = &config.server.bind_address;
            let bind_for_clients = if bind.starts_with("0.0.0.0:") {
                bind.replacen("0.0.0.0", "localhost", 1)
            } else if bind.starts_with("[::]:") {
                bind.replacen("[::]", "localhost", 1)
            } else {
                bind.to_string()
            };
            format!("http://{bind_for_clients}")
        });

    let library = Arc::new(lockstep_core::library::VideoLibrary::new(
        video_dir.clone(),
        public_url.clone(),
    ));
    let bus = lockstep_core::events::EventBus::default();
    let state = lockstep_core::AppState {
        coordinator: lockstep_core::coordinator::Coordinator::spawn(library.clone(), bus),
        library,
        config: lockstep_core::AppConfig {
            public_url: public_url.clone(),
            server_name: config.server.server_name.clone(),
        },
    };

    let mut router = lockstep_api::build_router().merge(lockstep_ws::sync_router());

    // Raw video bytes under /video with Range support so <video> can seek.
    let video_status = if let Some(ref dir) = video_dir {
        router = router.nest_service("/video", tower_http::services::ServeDir::new(dir));
        format!("Serving from {dir:?}")
    } else {
        "Not configured".to_string()
    };

    let router = router.with_state(state);

    let web_ui_status;
    let app = if let Some(ref dir) = web_dir {
        let index_path = dir.join("index.html");
        let spa_fallback = tower_http::services::ServeFile::new(&index_path);
        let serve_dir = tower_http::services::ServeDir::new(dir).not_found_service(spa_fallback);
        web_ui_status = format!("Serving from {dir:?}");
        router.fallback_service(serve_dir)
    } else {
        web_ui_status = "None (API-only mode)".to_string();
        router
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;

    print_startup_banner(
        &config.server.bind_address,
        &public_url,
        &video_status,
        &web_ui_status,
    );

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        println!();
        tracing::info!("Shutting down (ctrl-c)...");
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

fn print_startup_banner(bind_address: &str, public_url: &str, video_status: &str, web_ui_status: &str) {
    println!();
    println!("  _               _        _");
    println!(" | |    ___   ___| | _____| |_ ___ _ __");
    println!(" | |   / _ \\ / __| |/ / __| __/ _ \\ '_ \\");
    println!(" | |__| (_) | (__|   <\\__ \\ ||  __/ |_) |");
    println!(" |_____\\___/ \\___|_|\\_\\___/\\__\\___| .__/");
    println!("                                  |_|");
    println!();
    println!("  Listening:   http://{}", bind_address);
    println!("  Public URL:  {}", public_url);
    println!("  Videos:      {}", video_status);
    println!("  Viewer page: {}", web_ui_status);
    println!("  Sync:        {}/sync", public_url);
    println!();
}
