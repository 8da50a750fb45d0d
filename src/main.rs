mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::completion_service::OpenRouterClient;
use crate::services::flashcard_generation_service::FlashcardGenerationService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "invalid configuration");
        std::io::Error::other(e)
    })?;

    // Client OpenRouter construit une seule fois, partagé par tous les workers
    let client = OpenRouterClient::new(&config.completion).map_err(|e| {
        error!(error = %e, "cannot build the OpenRouter client");
        std::io::Error::other(e)
    })?;
    let generator = web::Data::new(FlashcardGenerationService::new(Arc::new(client)));
    info!(model = %generator.model(), "flashcard generator ready");

    info!("Connecting to database...");
    let db = db::establish_connection(&config).await.map_err(|e| {
        error!(error = %e, "failed to connect to database");
        std::io::Error::other(e)
    })?;
    info!("Database connected");

    let auth = web::Data::new(config.auth.clone());
    let (host, port) = (config.host.clone(), config.port);

    info!(%host, port, "Starting server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db.clone()))
            .app_data(generator.clone())
            .app_data(auth.clone())
            .configure(routes::configure_routes)
    })
        .bind((host.as_str(), port))?
        .run()
        .await
}
