use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// Table gérée par le service d'authentification externe.
// Ici elle ne sert que de racine de propriété (cascade) et pour les stats système.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::generation::Entity")]
    Generation,

    #[sea_orm(has_many = "super::flashcard::Entity")]
    Flashcard,
}

impl Related<super::generation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Generation.def()
    }
}

impl Related<super::flashcard::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flashcard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
