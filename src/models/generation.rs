// ============================================================================
// MODÈLE : GENERATIONS
// ============================================================================
//
// Description:
//   Une demande de génération IA : texte source, métadonnées de l'appel au
//   modèle et liste ordonnée des cartes candidates (JSONB).
//
// Cycle de vie:
//   1. create_draft insère la ligne avec reviewed = false, compteurs NULL
//   2. review_selected / review_all la passent à reviewed = true en une seule
//      transaction et fixent accepted_unedited_count / accepted_edited_count
//   3. Plus aucune modification ensuite
//
// Points d'attention:
//   - generated_flashcards peut contenir n'importe quoi (anciennes lignes,
//     JSON corrompu) : candidates() retourne alors une liste vide sans erreur
//   - ON DELETE CASCADE depuis users
//   - Les flashcards liées perdent seulement leur generation_id (SET NULL)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Carte candidate proposée par le modèle, pas encore une Flashcard
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub front: String,
    pub back: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "generations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    #[sea_orm(column_type = "Text")]
    pub source_text: String,

    pub model: Option<String>,

    // Durée de l'appel au modèle en millisecondes
    pub generation_duration: Option<i32>,

    pub generated_count: i32,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub generated_flashcards: Option<Json>,

    pub reviewed: bool,

    pub accepted_unedited_count: Option<i32>,

    pub accepted_edited_count: Option<i32>,

    pub created_at: DateTime,

    pub updated_at: DateTime,
}

impl Model {
    /// Cartes candidates dans l'ordre d'origine.
    /// Toute valeur stockée illisible est traitée comme une liste vide.
    pub fn candidates(&self) -> Vec<Candidate> {
        match &self.generated_flashcards {
            Some(value @ Json::Array(_)) => serde_json::from_value(value.clone()).unwrap_or_default(),
            // Anciennes lignes : tableau JSON encodé dans une chaîne
            Some(Json::String(raw)) => serde_json::from_str(raw).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn is_draft(&self) -> bool {
        !self.reviewed
    }
}

/// Sérialise les candidates pour la colonne JSONB
pub fn candidates_to_json(candidates: &[Candidate]) -> Json {
    Json::Array(
        candidates
            .iter()
            .map(|c| serde_json::json!({ "front": c.front, "back": c.back }))
            .collect(),
    )
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::flashcard::Entity")]
    Flashcard,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::flashcard::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flashcard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
