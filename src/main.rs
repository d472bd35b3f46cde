use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod domain;
mod error;
mod model;
mod models;
mod notify;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::notify::push::PushDispatcher;
use crate::utils::change_feed::ChangeFeed;
use crate::utils::settings_cache::SettingsCache;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Buffered change events per SSE subscriber before it starts skipping.
const CHANGE_FEED_CAPACITY: usize = 256;

#[get("/")]
async fn index() -> impl Responder {
    "HR portal is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {e:#}");
        std::io::Error::other(e.to_string())
    })?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await.map_err(|e| {
        error!(error = %e, "Database initialisation failed");
        std::io::Error::other(format!("{e:#}"))
    })?;

    let settings_cache = Data::new(SettingsCache::from_config(&config));
    let change_feed = Data::new(ChangeFeed::new(CHANGE_FEED_CAPACITY));
    let push = Data::new(PushDispatcher::from_gateway(config.push_gateway_url.clone()));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    info!(addr = %server_addr, prefix = %config.api_prefix, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard {_:.*} matches JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(settings_cache.clone())
            .app_data(change_feed.clone())
            .app_data(push.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
