use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const FRONT_MAX_CHARS: usize = 200;
pub const BACK_MAX_CHARS: usize = 500;

/// Provenance d'une carte
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum FlashcardSource {
    #[sea_orm(string_value = "manual")]
    Manual,
    // Acceptée telle que proposée par le modèle
    #[sea_orm(string_value = "ai_full")]
    AiFull,
    // Acceptée après modification par l'utilisateur
    #[sea_orm(string_value = "ai_edited")]
    AiEdited,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flashcards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    // NULL pour les cartes manuelles, ou si la génération a été supprimée
    pub generation_id: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub front: String,

    #[sea_orm(column_type = "Text")]
    pub back: String,

    pub source: FlashcardSource,

    pub created_at: DateTime,

    pub updated_at: DateTime,
}

/// Vérifie les bornes recto/verso d'une carte, retourne la raison du refus
pub fn check_bounds(front: &str, back: &str) -> Result<(), String> {
    if front.trim().is_empty() {
        return Err("front cannot be blank".to_string());
    }
    if back.trim().is_empty() {
        return Err("back cannot be blank".to_string());
    }
    if front.chars().count() > FRONT_MAX_CHARS {
        return Err(format!("front too long (max {} characters)", FRONT_MAX_CHARS));
    }
    if back.chars().count() > BACK_MAX_CHARS {
        return Err(format!("back too long (max {} characters)", BACK_MAX_CHARS));
    }
    Ok(())
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

    #[sea_orm(
        belongs_to = "super::generation::Entity",
        from = "Column::GenerationId",
        to = "super::generation::Column::Id",
        on_delete = "SetNull"
    )]
    Generation,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::generation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Generation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
