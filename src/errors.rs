// ============================================================================
// ERREURS
// ============================================================================
//
// Description:
//   Taxonomie fermée des erreurs du pipeline de génération.
//   Les routes font le `match` pour choisir le statut HTTP et le message.
//
// Points d'attention:
//   - Aucune erreur n'est retentée ni absorbée par les services
//   - CompletionError couvre aussi les réponses invalides du modèle
//
// ============================================================================

use sea_orm::DbErr;
use thiserror::Error;

/// Erreurs du client de complétion (OpenRouter)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("provider server error: {0}")]
    Server(String),

    #[error("API error ({}): {message}", display_status(.status))]
    Api { status: Option<u16>, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("response parse error: {0}")]
    ResponseParse(String),
}

impl CompletionError {
    /// Statut HTTP d'origine quand il est connu
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::Authentication(_) => Some(401),
            CompletionError::InvalidRequest(_) => Some(400),
            CompletionError::RateLimit(_) => Some(429),
            CompletionError::InsufficientCredits(_) => Some(402),
            CompletionError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

fn display_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Erreurs de l'orchestrateur de génération
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Source text cannot be blank")]
    BlankSource,

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Erreurs de création d'un brouillon de génération
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("invalid source text: {0}")]
    InvalidSourceText(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Erreurs de la revue (acceptation) d'une génération
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("generation not found")]
    NotFound,

    #[error("generation already reviewed")]
    AlreadyReviewed,

    #[error("no flashcards selected")]
    EmptySelection,

    #[error("flashcard {index} is invalid: {reason}")]
    InvalidFlashcard { index: usize, reason: String },

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Erreurs de chargement de la configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),
}
