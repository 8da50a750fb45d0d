use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde_json::json;
use tracing::{error, warn};
use validator::Validate;

use crate::errors::{CompletionError, DraftError, GenerationError, ReviewError};
use crate::middleware::AuthUser;
use crate::models::dto::{CreateGenerationRequest, GenerationResponse, ReviewRequest, ReviewResponse};
use crate::services::flashcard_generation_service::FlashcardGenerationService;
use crate::services::generation_service::{GenerationService, ReviewOutcome};

/// POST /generations - Génère un brouillon à partir du texte source
#[post("")]
pub async fn create_generation(
    db: web::Data<DatabaseConnection>,
    generator: web::Data<FlashcardGenerationService>,
    auth_user: AuthUser,
    request: web::Json<CreateGenerationRequest>,
) -> HttpResponse {
    if let Err(errors) = request.validate() {
        return HttpResponse::UnprocessableEntity().json(errors);
    }

    match GenerationService::create_draft(&db, &generator, auth_user.user_id, &request.source_text).await {
        Ok(generation) => HttpResponse::Created().json(GenerationResponse::from(generation)),
        Err(e) => draft_error_response(e, auth_user.user_id),
    }
}

#[get("")]
pub async fn list_generations(
    db: web::Data<DatabaseConnection>,
    auth_user: AuthUser,
) -> HttpResponse {
    match GenerationService::list_for_user(&db, auth_user.user_id).await {
        Ok(generations) => {
            let response: Vec<GenerationResponse> = generations.into_iter().map(GenerationResponse::from).collect();
            HttpResponse::Ok().json(response)
        }
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": format!("Database error: {}", e) })),
    }
}

#[get("/{id}")]
pub async fn get_generation(
    db: web::Data<DatabaseConnection>,
    auth_user: AuthUser,
    path: web::Path<i32>,
) -> HttpResponse {
    match GenerationService::find_for_user(&db, auth_user.user_id, path.into_inner()).await {
        Ok(Some(generation)) => HttpResponse::Ok().json(GenerationResponse::from(generation)),
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "Not Found" })),
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": format!("Database error: {}", e) })),
    }
}

/// POST /generations/{id}/review - Sauvegarde les cartes cochées (éditées ou non)
#[post("/{id}/review")]
pub async fn review_generation(
    db: web::Data<DatabaseConnection>,
    auth_user: AuthUser,
    path: web::Path<i32>,
    request: web::Json<ReviewRequest>,
) -> HttpResponse {
    let result =
        GenerationService::review_selected(&db, auth_user.user_id, path.into_inner(), &request.selections).await;
    review_response(result)
}

/// POST /generations/{id}/accept-all - Sauvegarde toutes les cartes sans modification
#[post("/{id}/accept-all")]
pub async fn accept_all(
    db: web::Data<DatabaseConnection>,
    auth_user: AuthUser,
    path: web::Path<i32>,
) -> HttpResponse {
    let result = GenerationService::review_all(&db, auth_user.user_id, path.into_inner()).await;
    review_response(result)
}

fn review_response(result: Result<ReviewOutcome, ReviewError>) -> HttpResponse {
    match result {
        Ok(outcome) => HttpResponse::Ok().json(ReviewResponse {
            saved_count: outcome.saved_count,
            accepted_unedited_count: outcome.accepted_unedited_count,
            accepted_edited_count: outcome.accepted_edited_count,
        }),
        Err(ReviewError::NotFound) => HttpResponse::NotFound().json(json!({ "error": "Not Found" })),
        Err(ReviewError::AlreadyReviewed) => HttpResponse::Conflict().json(json!({
            "error": "This generation has already been reviewed"
        })),
        Err(ReviewError::EmptySelection) => HttpResponse::UnprocessableEntity().json(json!({
            "error": "Select at least one flashcard to save"
        })),
        Err(e @ ReviewError::InvalidFlashcard { .. }) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": e.to_string() }))
        }
        Err(ReviewError::Database(e)) => {
            error!(error = %e, "review transaction failed");
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to save flashcards" }))
        }
    }
}

/// Traduit les erreurs de génération en réponses utilisateur
fn draft_error_response(err: DraftError, user_id: i32) -> HttpResponse {
    match err {
        DraftError::InvalidSourceText(errors) => HttpResponse::UnprocessableEntity().json(errors),
        DraftError::Generation(GenerationError::BlankSource) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": "Source text cannot be blank" }))
        }
        DraftError::Generation(GenerationError::Completion(e)) => completion_error_response(e, user_id),
        DraftError::Database(e) => {
            error!(error = %e, user_id, "failed to save generation");
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to save generation" }))
        }
    }
}

fn completion_error_response(err: CompletionError, user_id: i32) -> HttpResponse {
    match err {
        CompletionError::RateLimit(_) => HttpResponse::TooManyRequests().json(json!({
            "error": "The flashcard generator is busy. Please try again later."
        })),
        CompletionError::Authentication(ref message) => {
            // Mauvaise clé API : problème de configuration serveur, pas de l'utilisateur
            error!(user_id, message = %message, "OpenRouter authentication failed, check the API key");
            service_unavailable()
        }
        CompletionError::InsufficientCredits(_) | CompletionError::Configuration(_) => {
            error!(user_id, error = %err, "flashcard generation unavailable");
            service_unavailable()
        }
        CompletionError::Network(_) => HttpResponse::GatewayTimeout().json(json!({
            "error": "Could not reach the flashcard generator. Please check your connection and try again."
        })),
        other => {
            warn!(user_id, status = ?other.status(), error = %other, "flashcard generation failed");
            HttpResponse::BadGateway().json(json!({
                "error": "Failed to generate flashcards. Please try again."
            }))
        }
    }
}

fn service_unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({
        "error": "The flashcard generation service is temporarily unavailable."
    }))
}

pub fn generations_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/generations")
            .service(create_generation)
            .service(list_generations)
            .service(get_generation)
            .service(review_generation)
            .service(accept_all)
    );
}
