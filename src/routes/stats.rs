use actix_web::{get, web, HttpResponse};
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::json;

use crate::middleware::AuthUser;
use crate::models::dto::{SystemStatsResponse, UserStatsResponse};
use crate::services::stats_service::StatsService;

/// GET /stats - Statistiques IA de l'utilisateur connecté
#[get("")]
pub async fn user_stats(
    db: web::Data<DatabaseConnection>,
    auth_user: AuthUser,
) -> HttpResponse {
    let stats = async {
        Ok::<_, DbErr>(UserStatsResponse {
            ai_acceptance_rate: StatsService::user_acceptance_rate(&db, auth_user.user_id).await?,
            ai_flashcards_percentage: StatsService::user_ai_share(&db, auth_user.user_id).await?,
        })
    }
    .await;

    match stats {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": format!("Database error: {}", e) })),
    }
}

/// GET /stats/system - Statistiques globales (tous les utilisateurs)
#[get("/system")]
pub async fn system_stats(
    db: web::Data<DatabaseConnection>,
    _auth_user: AuthUser,
) -> HttpResponse {
    let stats = async {
        Ok::<_, DbErr>(SystemStatsResponse {
            ai_acceptance_rate: StatsService::system_acceptance_rate(&db).await?,
            ai_flashcards_percentage: StatsService::system_ai_share(&db).await?,
            total_flashcards: StatsService::system_total_flashcards(&db).await?,
            total_users: StatsService::system_total_users(&db).await?,
        })
    }
    .await;

    match stats {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": format!("Database error: {}", e) })),
    }
}

pub fn stats_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stats")
            .service(user_stats)
            .service(system_stats)
    );
}
