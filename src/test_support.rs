// Outils partagés par les tests : base SQLite en mémoire et faux client de complétion
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, Set,
};
use serde_json::Value;

use crate::errors::CompletionError;
use crate::models::{flashcard, generation, users};
use crate::services::completion_service::CompletionClient;

/// Base SQLite en mémoire avec le schéma dérivé des entités
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // Une seule connexion : chaque connexion SQLite en mémoire a sa propre base
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(&schema.create_table_from_entity(users::Entity)))
        .await
        .unwrap();
    db.execute(backend.build(&schema.create_table_from_entity(generation::Entity)))
        .await
        .unwrap();
    db.execute(backend.build(&schema.create_table_from_entity(flashcard::Entity)))
        .await
        .unwrap();

    db
}

pub async fn seed_user(db: &DatabaseConnection, email: &str) -> i32 {
    let user = users::ActiveModel {
        email: Set(email.to_string()),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    user.insert(db).await.unwrap().id
}

pub async fn seed_flashcard(
    db: &DatabaseConnection,
    user_id: i32,
    source: flashcard::FlashcardSource,
) -> flashcard::Model {
    let now = chrono::Utc::now().naive_utc();
    flashcard::ActiveModel {
        user_id: Set(user_id),
        generation_id: Set(None),
        front: Set("Front".to_string()),
        back: Set("Back".to_string()),
        source: Set(source),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn all_flashcards(db: &DatabaseConnection) -> Vec<flashcard::Model> {
    flashcard::Entity::find().all(db).await.unwrap()
}

pub async fn all_generations(db: &DatabaseConnection) -> Vec<generation::Model> {
    generation::Entity::find().all(db).await.unwrap()
}

type RecordedRequest = (String, String, Option<Value>);

/// Faux client : réponse ou erreur fixée, compte les appels
pub struct FakeCompletion {
    reply: Result<Value, CompletionError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<RecordedRequest>>,
}

impl FakeCompletion {
    pub fn replying(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(error: CompletionError) -> Self {
        Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    fn model(&self) -> &str {
        "openai/gpt-4o-mini"
    }

    async fn complete(
        &self,
        system_message: &str,
        user_message: &str,
        response_format: Option<&Value>,
    ) -> Result<Value, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((
            system_message.to_string(),
            user_message.to_string(),
            response_format.cloned(),
        ));
        self.reply.clone()
    }
}
