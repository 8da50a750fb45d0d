use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest, HttpResponse};
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::utils::jwt;

/// Utilisateur authentifié, extrait du header Authorization.
/// Toutes les routes de génération/stats sont limitées à ses propres données.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
}

fn unauthorized(message: String) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": message
    }));
    actix_web::error::InternalError::from_response("", response).into()
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, Error> {
    // 1. Secret partagé avec le service d'auth
    let secret = match req.app_data::<web::Data<AuthConfig>>() {
        Some(config) => config.jwt_secret.clone(),
        None => {
            tracing::error!("AuthConfig missing from app data");
            return Err(actix_web::error::ErrorInternalServerError("authentication is not configured"));
        }
    };

    // 2. Header Authorization: "Bearer <token>"
    let auth_str = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header".to_string()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization format (expected: Bearer <token>)".to_string()))?;

    // 3. Vérifier le token JWT
    let claims = jwt::verify_token(token, &secret).map_err(unauthorized)?;

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
    })
}
