use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::models::dto::HealthResponse;

/// GET /health - Vérifie aussi que la base répond
#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let database_ok = db.ping().await.is_ok();

    let response = HealthResponse {
        status: if database_ok { "ok" } else { "degraded" }.to_string(),
        service: env!("CARGO_PKG_NAME"),
        database: database_ok,
        time: Utc::now(),
    };

    if database_ok {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
