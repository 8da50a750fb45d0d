use std::collections::BTreeMap;

use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};
use validator::Validate;

use crate::errors::{DraftError, ReviewError};
use crate::models::dto::{CandidateSelection, CreateGenerationRequest};
use crate::models::flashcard::{self, FlashcardSource};
use crate::models::generation::{self, candidates_to_json, Candidate};
use crate::services::flashcard_generation_service::FlashcardGenerationService;

/// Résultat d'une revue validée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub saved_count: usize,
    pub accepted_unedited_count: usize,
    pub accepted_edited_count: usize,
}

/// Carte à créer, calculée avant toute écriture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFlashcard {
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
}

pub struct GenerationService;

impl GenerationService {
    /// Valide le texte, appelle le modèle puis insère le brouillon.
    /// Sur erreur (validation, modèle, base), rien n'est écrit.
    pub async fn create_draft(
        db: &DatabaseConnection,
        generator: &FlashcardGenerationService,
        user_id: i32,
        source_text: &str,
    ) -> Result<generation::Model, DraftError> {
        CreateGenerationRequest {
            source_text: source_text.to_string(),
        }
        .validate()?;

        let output = generator.generate(source_text).await?;
        let now = chrono::Utc::now().naive_utc();

        let draft = generation::ActiveModel {
            user_id: Set(user_id),
            source_text: Set(source_text.to_string()),
            model: Set(Some(output.metadata.model.clone())),
            generation_duration: Set(Some(i32::try_from(output.metadata.duration_ms).unwrap_or(i32::MAX))),
            generated_count: Set(i32::try_from(output.metadata.generated_count).unwrap_or(i32::MAX)),
            generated_flashcards: Set(Some(candidates_to_json(&output.candidates))),
            reviewed: Set(false),
            accepted_unedited_count: Set(None),
            accepted_edited_count: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let saved = draft.insert(db).await?;

        info!(
            generation_id = saved.id,
            user_id,
            generated_count = saved.generated_count,
            "draft generation saved"
        );

        Ok(saved)
    }

    /// Accepte les candidates sélectionnées (éditées ou non) en une transaction
    pub async fn review_selected(
        db: &DatabaseConnection,
        user_id: i32,
        generation_id: i32,
        selections: &BTreeMap<usize, CandidateSelection>,
    ) -> Result<ReviewOutcome, ReviewError> {
        Self::review(db, user_id, generation_id, |candidates| plan_selected(candidates, selections)).await
    }

    /// Accepte toutes les candidates telles quelles (ai_full).
    /// Une liste de candidates vide ou illisible donne EmptySelection et le brouillon reste intact.
    pub async fn review_all(
        db: &DatabaseConnection,
        user_id: i32,
        generation_id: i32,
    ) -> Result<ReviewOutcome, ReviewError> {
        Self::review(db, user_id, generation_id, |candidates| Ok(plan_all(candidates))).await
    }

    /// Transaction commune aux deux revues :
    ///   1. charge la génération (propriétaire uniquement)
    ///   2. refuse si déjà revue
    ///   3. calcule les cartes à créer (aucune écriture si invalide ou vide)
    ///   4. réclame la génération avec UPDATE ... WHERE reviewed = false
    ///   5. insère les cartes puis commit
    async fn review<F>(
        db: &DatabaseConnection,
        user_id: i32,
        generation_id: i32,
        plan: F,
    ) -> Result<ReviewOutcome, ReviewError>
    where
        F: FnOnce(&[Candidate]) -> Result<Vec<PlannedFlashcard>, ReviewError>,
    {
        let txn = db.begin().await?;

        let generation = generation::Entity::find_by_id(generation_id)
            .filter(generation::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(ReviewError::NotFound)?;

        if generation.reviewed {
            return Err(ReviewError::AlreadyReviewed);
        }

        let planned = plan(&generation.candidates())?;
        if planned.is_empty() {
            return Err(ReviewError::EmptySelection);
        }

        let edited = planned.iter().filter(|p| p.source == FlashcardSource::AiEdited).count();
        let outcome = ReviewOutcome {
            saved_count: planned.len(),
            accepted_unedited_count: planned.len() - edited,
            accepted_edited_count: edited,
        };

        let now = chrono::Utc::now().naive_utc();

        // Une revue concurrente a pu passer entre la lecture et ici
        let claimed = generation::Entity::update_many()
            .col_expr(generation::Column::Reviewed, Expr::value(true))
            .col_expr(
                generation::Column::AcceptedUneditedCount,
                Expr::value(outcome.accepted_unedited_count as i32),
            )
            .col_expr(
                generation::Column::AcceptedEditedCount,
                Expr::value(outcome.accepted_edited_count as i32),
            )
            .col_expr(generation::Column::UpdatedAt, Expr::value(now))
            .filter(generation::Column::Id.eq(generation_id))
            .filter(generation::Column::Reviewed.eq(false))
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            warn!(generation_id, user_id, "concurrent review detected, aborting");
            return Err(ReviewError::AlreadyReviewed);
        }

        let cards = planned.into_iter().map(|p| flashcard::ActiveModel {
            user_id: Set(user_id),
            generation_id: Set(Some(generation_id)),
            front: Set(p.front),
            back: Set(p.back),
            source: Set(p.source),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        });

        flashcard::Entity::insert_many(cards).exec(&txn).await?;
        txn.commit().await?;

        info!(
            generation_id,
            user_id,
            saved = outcome.saved_count,
            unedited = outcome.accepted_unedited_count,
            edited = outcome.accepted_edited_count,
            "generation reviewed"
        );

        Ok(outcome)
    }

    pub async fn find_for_user(
        db: &DatabaseConnection,
        user_id: i32,
        generation_id: i32,
    ) -> Result<Option<generation::Model>, DbErr> {
        generation::Entity::find_by_id(generation_id)
            .filter(generation::Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    /// Générations de l'utilisateur, plus récentes d'abord
    pub async fn list_for_user(db: &DatabaseConnection, user_id: i32) -> Result<Vec<generation::Model>, DbErr> {
        generation::Entity::find()
            .filter(generation::Column::UserId.eq(user_id))
            .order_by_desc(generation::Column::CreatedAt)
            .order_by_desc(generation::Column::Id)
            .all(db)
            .await
    }
}

/// Détection d'édition positionnelle : la soumission d'index i n'est comparée
/// qu'à la candidate d'origine d'index i. Sans candidate à cet index, la carte
/// est considérée non éditée.
pub fn plan_selected(
    candidates: &[Candidate],
    selections: &BTreeMap<usize, CandidateSelection>,
) -> Result<Vec<PlannedFlashcard>, ReviewError> {
    selections
        .iter()
        .filter(|(_, selection)| selection.selected)
        .map(|(&index, selection)| -> Result<PlannedFlashcard, ReviewError> {
            flashcard::check_bounds(&selection.front, &selection.back)
                .map_err(|reason| ReviewError::InvalidFlashcard { index, reason })?;

            let was_edited = candidates
                .get(index)
                .is_some_and(|original| original.front != selection.front || original.back != selection.back);

            Ok(PlannedFlashcard {
                front: selection.front.trim().to_string(),
                back: selection.back.trim().to_string(),
                source: if was_edited {
                    FlashcardSource::AiEdited
                } else {
                    FlashcardSource::AiFull
                },
            })
        })
        .collect()
}

pub fn plan_all(candidates: &[Candidate]) -> Vec<PlannedFlashcard> {
    candidates
        .iter()
        .map(|c| PlannedFlashcard {
            front: c.front.clone(),
            back: c.back.clone(),
            source: FlashcardSource::AiFull,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CompletionError, GenerationError};
    use crate::test_support::{all_flashcards, all_generations, seed_user, setup_db, FakeCompletion};
    use serde_json::json;
    use std::sync::Arc;

    fn three_cards() -> serde_json::Value {
        json!({
            "flashcards": [
                { "question": "What is Rails?", "answer": "A web framework" },
                { "question": "What language is Rails written in?", "answer": "Ruby" },
                { "question": "Who created Rails?", "answer": "David Heinemeier Hansson" }
            ]
        })
    }

    fn generator(reply: serde_json::Value) -> FlashcardGenerationService {
        FlashcardGenerationService::new(Arc::new(FakeCompletion::replying(reply)))
    }

    fn select(front: &str, back: &str) -> CandidateSelection {
        CandidateSelection {
            selected: true,
            front: front.to_string(),
            back: back.to_string(),
        }
    }

    fn source_text() -> String {
        "Rails is a web framework written in Ruby. ".chars().cycle().take(1200).collect()
    }

    async fn draft(db: &DatabaseConnection, user_id: i32) -> generation::Model {
        GenerationService::create_draft(db, &generator(three_cards()), user_id, &source_text())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_draft_persists_unreviewed_generation() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;

        let generation = draft(&db, user_id).await;

        assert_eq!(generation.generated_count, 3);
        assert!(!generation.reviewed);
        assert_eq!(generation.accepted_unedited_count, None);
        assert_eq!(generation.accepted_edited_count, None);
        assert_eq!(generation.model.as_deref(), Some("openai/gpt-4o-mini"));

        let stored = GenerationService::find_for_user(&db, user_id, generation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.candidates().len(), 3);
        assert_eq!(stored.candidates()[1].back, "Ruby");
    }

    #[tokio::test]
    async fn create_draft_rejects_out_of_bounds_source_without_calling_model() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let fake = Arc::new(FakeCompletion::replying(three_cards()));
        let generator = FlashcardGenerationService::new(fake.clone());

        for text in ["short".to_string(), "x".repeat(10_001)] {
            let result = GenerationService::create_draft(&db, &generator, user_id, &text).await;
            assert!(matches!(result, Err(DraftError::InvalidSourceText(_))));
        }

        assert_eq!(fake.calls(), 0);
        assert!(all_generations(&db).await.is_empty());
    }

    #[tokio::test]
    async fn rate_limited_generation_leaves_no_row() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generator = FlashcardGenerationService::new(Arc::new(FakeCompletion::failing(
            CompletionError::RateLimit("Rate limit exceeded".to_string()),
        )));

        let result = GenerationService::create_draft(&db, &generator, user_id, &source_text()).await;

        assert!(matches!(
            result,
            Err(DraftError::Generation(GenerationError::Completion(CompletionError::RateLimit(_))))
        ));
        assert!(all_generations(&db).await.is_empty());
    }

    #[tokio::test]
    async fn review_selected_tracks_edits_and_rejections() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        let mut selections = BTreeMap::new();
        selections.insert(0, select("What is Rails?", "A web framework"));
        selections.insert(1, select("What language is Rails written in?", "The Ruby language"));
        selections.insert(
            2,
            CandidateSelection {
                selected: false,
                ..select("Who created Rails?", "David Heinemeier Hansson")
            },
        );

        let outcome = GenerationService::review_selected(&db, user_id, generation.id, &selections)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReviewOutcome {
                saved_count: 2,
                accepted_unedited_count: 1,
                accepted_edited_count: 1
            }
        );

        let cards = all_flashcards(&db).await;
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| c.generation_id == Some(generation.id) && c.user_id == user_id));
        assert_eq!(cards.iter().filter(|c| c.source == FlashcardSource::AiFull).count(), 1);
        let edited = cards.iter().find(|c| c.source == FlashcardSource::AiEdited).unwrap();
        assert_eq!(edited.back, "The Ruby language");

        let stored = GenerationService::find_for_user(&db, user_id, generation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.reviewed);
        assert_eq!(stored.accepted_unedited_count, Some(1));
        assert_eq!(stored.accepted_edited_count, Some(1));
    }

    #[tokio::test]
    async fn second_review_is_rejected_without_new_flashcards() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        GenerationService::review_all(&db, user_id, generation.id).await.unwrap();

        let mut selections = BTreeMap::new();
        selections.insert(0, select("Changed", "Changed"));

        assert!(matches!(
            GenerationService::review_selected(&db, user_id, generation.id, &selections).await,
            Err(ReviewError::AlreadyReviewed)
        ));
        assert!(matches!(
            GenerationService::review_all(&db, user_id, generation.id).await,
            Err(ReviewError::AlreadyReviewed)
        ));

        assert_eq!(all_flashcards(&db).await.len(), 3);
        let stored = all_generations(&db).await.remove(0);
        assert_eq!(stored.accepted_unedited_count, Some(3));
        assert_eq!(stored.accepted_edited_count, Some(0));
    }

    #[tokio::test]
    async fn empty_selection_keeps_generation_draft() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        let mut selections = BTreeMap::new();
        selections.insert(
            0,
            CandidateSelection {
                selected: false,
                ..select("What is Rails?", "A web framework")
            },
        );

        for selections in [BTreeMap::new(), selections] {
            assert!(matches!(
                GenerationService::review_selected(&db, user_id, generation.id, &selections).await,
                Err(ReviewError::EmptySelection)
            ));
        }

        assert!(all_flashcards(&db).await.is_empty());
        assert!(all_generations(&db).await[0].is_draft());
    }

    #[tokio::test]
    async fn invalid_edit_aborts_whole_review() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        let mut selections = BTreeMap::new();
        selections.insert(0, select("What is Rails?", "A web framework"));
        selections.insert(1, select("What language is Rails written in?", &"x".repeat(501)));

        assert!(matches!(
            GenerationService::review_selected(&db, user_id, generation.id, &selections).await,
            Err(ReviewError::InvalidFlashcard { index: 1, .. })
        ));
        assert!(all_flashcards(&db).await.is_empty());
        assert!(all_generations(&db).await[0].is_draft());
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_the_claim() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        // L'UPDATE conditionnel passe, l'insertion des cartes échoue ensuite
        db.execute_unprepared("DROP TABLE flashcards").await.unwrap();

        assert!(matches!(
            GenerationService::review_all(&db, user_id, generation.id).await,
            Err(ReviewError::Database(_))
        ));

        let stored = &all_generations(&db).await[0];
        assert!(!stored.reviewed);
        assert_eq!(stored.accepted_unedited_count, None);
        assert_eq!(stored.accepted_edited_count, None);
    }

    #[tokio::test]
    async fn review_is_scoped_to_owner() {
        let db = setup_db().await;
        let owner = seed_user(&db, "owner@example.com").await;
        let intruder = seed_user(&db, "intruder@example.com").await;
        let generation = draft(&db, owner).await;

        assert!(matches!(
            GenerationService::review_all(&db, intruder, generation.id).await,
            Err(ReviewError::NotFound)
        ));
        assert!(GenerationService::find_for_user(&db, intruder, generation.id)
            .await
            .unwrap()
            .is_none());
        assert!(all_flashcards(&db).await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_reviews_insert_once() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        let (first, second) = tokio::join!(
            GenerationService::review_all(&db, user_id, generation.id),
            GenerationService::review_all(&db, user_id, generation.id)
        );

        let succeeded = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);
        assert_eq!(all_flashcards(&db).await.len(), 3);
    }

    #[tokio::test]
    async fn review_all_of_unreadable_payload_is_empty_selection() {
        let db = setup_db().await;
        let user_id = seed_user(&db, "a@example.com").await;
        let generation = draft(&db, user_id).await;

        let mut corrupted: generation::ActiveModel = generation.clone().into();
        corrupted.generated_flashcards = Set(Some(json!("{not json")));
        corrupted.update(&db).await.unwrap();

        assert!(matches!(
            GenerationService::review_all(&db, user_id, generation.id).await,
            Err(ReviewError::EmptySelection)
        ));
    }

    #[tokio::test]
    async fn list_for_user_returns_only_own_generations() {
        let db = setup_db().await;
        let owner = seed_user(&db, "owner@example.com").await;
        let other = seed_user(&db, "other@example.com").await;
        let first = draft(&db, owner).await;
        let second = draft(&db, owner).await;
        draft(&db, other).await;

        let listed = GenerationService::list_for_user(&db, owner).await.unwrap();

        let ids: Vec<i32> = listed.iter().map(|g| g.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
    }

    #[test]
    fn edit_detection_is_positional() {
        let candidates = vec![
            Candidate { front: "Q0".to_string(), back: "A0".to_string() },
            Candidate { front: "Q1".to_string(), back: "A1".to_string() },
        ];

        let mut selections = BTreeMap::new();
        // Contenu de la candidate 1 soumis à l'index 0 : compté comme édité
        selections.insert(0, select("Q1", "A1"));
        selections.insert(1, select("Q1", "A1"));
        // Pas de candidate d'origine : non éditée
        selections.insert(7, select("Extra", "Card"));

        let planned = plan_selected(&candidates, &selections).unwrap();
        let sources: Vec<FlashcardSource> = planned.iter().map(|p| p.source).collect();

        assert_eq!(
            sources,
            vec![FlashcardSource::AiEdited, FlashcardSource::AiFull, FlashcardSource::AiFull]
        );
    }

    #[test]
    fn plan_all_never_marks_edited() {
        let candidates = vec![Candidate { front: "Q".to_string(), back: "A".to_string() }];
        let planned = plan_all(&candidates);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].source, FlashcardSource::AiFull);
    }
}
