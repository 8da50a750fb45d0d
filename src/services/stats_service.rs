use sea_orm::*;

use crate::models::flashcard::{self, FlashcardSource};
use crate::models::{generation, users};

pub struct StatsService;

#[derive(Debug, FromQueryResult)]
struct GenerationTotals {
    generated: Option<i64>,
    accepted_unedited: Option<i64>,
    accepted_edited: Option<i64>,
}

impl StatsService {
    /// (Σ acceptées non éditées + Σ acceptées éditées) / Σ générées * 100
    pub async fn user_acceptance_rate(db: &DatabaseConnection, user_id: i32) -> Result<f64, DbErr> {
        Self::acceptance_rate(db, Some(user_id)).await
    }

    /// Part des cartes de l'utilisateur qui viennent du modèle (ai_full + ai_edited)
    pub async fn user_ai_share(db: &DatabaseConnection, user_id: i32) -> Result<f64, DbErr> {
        Self::ai_share(db, Some(user_id)).await
    }

    pub async fn system_acceptance_rate(db: &DatabaseConnection) -> Result<f64, DbErr> {
        Self::acceptance_rate(db, None).await
    }

    pub async fn system_ai_share(db: &DatabaseConnection) -> Result<f64, DbErr> {
        Self::ai_share(db, None).await
    }

    pub async fn system_total_flashcards(db: &DatabaseConnection) -> Result<u64, DbErr> {
        flashcard::Entity::find().count(db).await
    }

    pub async fn system_total_users(db: &DatabaseConnection) -> Result<u64, DbErr> {
        users::Entity::find().count(db).await
    }

    // Les compteurs NULL (générations pas encore revues) sont ignorés par SUM
    async fn acceptance_rate(db: &DatabaseConnection, user_id: Option<i32>) -> Result<f64, DbErr> {
        let mut query = generation::Entity::find()
            .select_only()
            .column_as(generation::Column::GeneratedCount.sum(), "generated")
            .column_as(generation::Column::AcceptedUneditedCount.sum(), "accepted_unedited")
            .column_as(generation::Column::AcceptedEditedCount.sum(), "accepted_edited");

        if let Some(user_id) = user_id {
            query = query.filter(generation::Column::UserId.eq(user_id));
        }

        let totals = query.into_model::<GenerationTotals>().one(db).await?;

        Ok(match totals {
            Some(t) => percentage(
                t.accepted_unedited.unwrap_or(0) + t.accepted_edited.unwrap_or(0),
                t.generated.unwrap_or(0),
            ),
            None => 0.0,
        })
    }

    async fn ai_share(db: &DatabaseConnection, user_id: Option<i32>) -> Result<f64, DbErr> {
        let mut all = flashcard::Entity::find();
        let mut ai = flashcard::Entity::find()
            .filter(flashcard::Column::Source.is_in([FlashcardSource::AiFull, FlashcardSource::AiEdited]));

        if let Some(user_id) = user_id {
            all = all.filter(flashcard::Column::UserId.eq(user_id));
            ai = ai.filter(flashcard::Column::UserId.eq(user_id));
        }

        let total = all.count(db).await?;
        let ai_count = ai.count(db).await?;

        Ok(percentage(ai_count as i64, total as i64))
    }
}

/// part / total * 100 arrondi à une décimale, 0 si total nul
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::CandidateSelection;
    use crate::services::flashcard_generation_service::FlashcardGenerationService;
    use crate::services::generation_service::GenerationService;
    use crate::test_support::{seed_flashcard, seed_user, setup_db, FakeCompletion};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn reviewed_generation(db: &DatabaseConnection, user_id: i32, keep: usize, edit: usize) {
        let generator = FlashcardGenerationService::new(Arc::new(FakeCompletion::replying(json!({
            "flashcards": (0..4)
                .map(|i| json!({ "question": format!("Q{i}"), "answer": format!("A{i}") }))
                .collect::<Vec<_>>()
        }))));
        let generation = GenerationService::create_draft(db, &generator, user_id, &"y".repeat(1000))
            .await
            .unwrap();

        let selections: BTreeMap<usize, CandidateSelection> = (0..keep + edit)
            .map(|i| {
                let back = if i < keep { format!("A{i}") } else { format!("A{i} (edited)") };
                (i, CandidateSelection { selected: true, front: format!("Q{i}"), back })
            })
            .collect();

        GenerationService::review_selected(db, user_id, generation.id, &selections)
            .await
            .unwrap();
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[tokio::test]
    async fn empty_database_yields_zero() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;

        assert_eq!(StatsService::user_acceptance_rate(&db, user_id).await.unwrap(), 0.0);
        assert_eq!(StatsService::user_ai_share(&db, user_id).await.unwrap(), 0.0);
        assert_eq!(StatsService::system_acceptance_rate(&db).await.unwrap(), 0.0);
        assert_eq!(StatsService::system_ai_share(&db).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn acceptance_rate_sums_both_counters() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice@example.com").await;
        let bob = seed_user(&db, "bob@example.com").await;

        // alice : 4 générées, 1 + 2 acceptées ; bob : 4 générées, 1 acceptée
        reviewed_generation(&db, alice, 1, 2).await;
        reviewed_generation(&db, bob, 1, 0).await;

        assert_eq!(StatsService::user_acceptance_rate(&db, alice).await.unwrap(), 75.0);
        assert_eq!(StatsService::user_acceptance_rate(&db, bob).await.unwrap(), 25.0);
        assert_eq!(StatsService::system_acceptance_rate(&db).await.unwrap(), 50.0);
    }

    #[tokio::test]
    async fn ai_share_counts_ai_sources_only() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice@example.com").await;
        let bob = seed_user(&db, "bob@example.com").await;

        reviewed_generation(&db, alice, 1, 1).await;
        seed_flashcard(&db, alice, FlashcardSource::Manual).await;
        seed_flashcard(&db, bob, FlashcardSource::Manual).await;

        assert_eq!(StatsService::user_ai_share(&db, alice).await.unwrap(), 66.7);
        assert_eq!(StatsService::user_ai_share(&db, bob).await.unwrap(), 0.0);
        assert_eq!(StatsService::system_ai_share(&db).await.unwrap(), 50.0);
        assert_eq!(StatsService::system_total_flashcards(&db).await.unwrap(), 4);
        assert_eq!(StatsService::system_total_users(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unreviewed_drafts_count_in_denominator_only() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice@example.com").await;

        reviewed_generation(&db, alice, 2, 0).await;
        let generator = FlashcardGenerationService::new(Arc::new(FakeCompletion::replying(json!({
            "flashcards": [{ "question": "Q", "answer": "A" }, { "question": "Q2", "answer": "A2" },
                           { "question": "Q3", "answer": "A3" }, { "question": "Q4", "answer": "A4" }]
        }))));
        GenerationService::create_draft(&db, &generator, alice, &"z".repeat(1000))
            .await
            .unwrap();

        assert_eq!(StatsService::user_acceptance_rate(&db, alice).await.unwrap(), 25.0);
    }
}
