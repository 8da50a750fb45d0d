use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::info;

use crate::errors::{CompletionError, GenerationError};
use crate::models::flashcard::{BACK_MAX_CHARS, FRONT_MAX_CHARS};
use crate::models::generation::Candidate;
use crate::services::completion_service::CompletionClient;

const SYSTEM_PROMPT: &str = "\
You are an expert educational content creator specializing in flashcard generation.
Your task is to create high-quality flashcards from the provided text.

Guidelines:
- Focus on key concepts, definitions, and important facts
- Each question should be clear and unambiguous
- Answers should be concise but complete
- Include context in the question when necessary
- Avoid yes/no questions; prefer questions that require understanding
- Generate between 5 and 15 flashcards depending on content richness
- Ensure questions test understanding, not just memorization
- Questions should be self-contained (include necessary context)
- Answers should be specific and accurate
";

/// Schéma strict imposé à la réponse du modèle
fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "flashcards_generation",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "flashcards": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "question": {
                                    "type": "string",
                                    "description": "The question on the front of the flashcard"
                                },
                                "answer": {
                                    "type": "string",
                                    "description": "The answer on the back of the flashcard"
                                }
                            },
                            "required": ["question", "answer"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["flashcards"],
                "additionalProperties": false
            }
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationMetadata {
    pub model: String,
    pub duration_ms: u64,
    pub generated_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub candidates: Vec<Candidate>,
    pub metadata: GenerationMetadata,
}

/// Orchestrateur : texte source → cartes candidates validées
#[derive(Clone)]
pub struct FlashcardGenerationService {
    client: Arc<dyn CompletionClient>,
}

impl FlashcardGenerationService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Un seul appel au modèle. Les erreurs du client remontent telles quelles.
    pub async fn generate(&self, source_text: &str) -> Result<GenerationOutput, GenerationError> {
        if source_text.trim().is_empty() {
            return Err(GenerationError::BlankSource);
        }

        let start = Instant::now();
        let format = response_format();

        let response = self
            .client
            .complete(SYSTEM_PROMPT, &build_user_message(source_text), Some(&format))
            .await?;

        let candidates = validate_and_extract(&response)?;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            model = %self.client.model(),
            duration_ms,
            generated_count = candidates.len(),
            "flashcards generated"
        );

        Ok(GenerationOutput {
            metadata: GenerationMetadata {
                model: self.client.model().to_string(),
                duration_ms,
                generated_count: candidates.len(),
            },
            candidates,
        })
    }
}

fn build_user_message(source_text: &str) -> String {
    format!(
        "Generate educational flashcards from the following text:\n\n\
         {}\n\n\
         Create flashcards that will help a student learn and retain the key information from this text.\n\
         Focus on the most important concepts and facts.\n",
        source_text
    )
}

/// Fail-fast : la première carte invalide rejette toute la réponse
fn validate_and_extract(response: &Value) -> Result<Vec<Candidate>, CompletionError> {
    let cards = response
        .get("flashcards")
        .and_then(Value::as_array)
        .ok_or_else(|| CompletionError::ResponseParse("Invalid flashcards format in response".to_string()))?;

    if cards.is_empty() {
        return Err(CompletionError::ResponseParse("No flashcards generated".to_string()));
    }

    cards.iter().map(validate_candidate).collect()
}

fn validate_candidate(card: &Value) -> Result<Candidate, CompletionError> {
    let question = card.get("question").and_then(Value::as_str).unwrap_or_default();
    let answer = card.get("answer").and_then(Value::as_str).unwrap_or_default();

    if question.trim().is_empty() {
        return Err(CompletionError::ResponseParse("Flashcard question cannot be blank".to_string()));
    }
    if answer.trim().is_empty() {
        return Err(CompletionError::ResponseParse("Flashcard answer cannot be blank".to_string()));
    }
    if question.chars().count() > FRONT_MAX_CHARS {
        return Err(CompletionError::ResponseParse(format!(
            "Flashcard question too long (max {} characters)",
            FRONT_MAX_CHARS
        )));
    }
    if answer.chars().count() > BACK_MAX_CHARS {
        return Err(CompletionError::ResponseParse(format!(
            "Flashcard answer too long (max {} characters)",
            BACK_MAX_CHARS
        )));
    }

    Ok(Candidate {
        front: question.trim().to_string(),
        back: answer.trim().to_string(),
    })
}
