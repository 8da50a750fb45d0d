//pour les requêtes et réponses de l'API
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::generation::{self, Candidate};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: &'static str,
    pub database: bool,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGenerationRequest {
    #[validate(length(
        min = 1000,
        max = 10000,
        message = "source text must be between 1000 and 10000 characters"
    ))]
    pub source_text: String,
}

/// Choix de l'utilisateur pour une candidate (clé = index dans la liste d'origine)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CandidateSelection {
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    // Mapping clairsemé : {"0": {...}, "2": {...}}
    #[serde(default)]
    pub selections: BTreeMap<usize, CandidateSelection>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub saved_count: usize,
    pub accepted_unedited_count: usize,
    pub accepted_edited_count: usize,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub id: i32,
    pub source_text: String,
    pub model: Option<String>,
    pub generation_duration: Option<i32>,
    pub generated_count: i32,
    pub reviewed: bool,
    // Absent une fois la génération revue : plus rien à éditer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<Candidate>>,
    pub accepted_unedited_count: Option<i32>,
    pub accepted_edited_count: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl From<generation::Model> for GenerationResponse {
    fn from(model: generation::Model) -> Self {
        let candidates = model.is_draft().then(|| model.candidates());
        Self {
            id: model.id,
            source_text: model.source_text,
            model: model.model,
            generation_duration: model.generation_duration,
            generated_count: model.generated_count,
            reviewed: model.reviewed,
            candidates,
            accepted_unedited_count: model.accepted_unedited_count,
            accepted_edited_count: model.accepted_edited_count,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub ai_acceptance_rate: f64,
    pub ai_flashcards_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct SystemStatsResponse {
    pub ai_acceptance_rate: f64,
    pub ai_flashcards_percentage: f64,
    pub total_flashcards: u64,
    pub total_users: u64,
}
