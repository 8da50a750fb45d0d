/*
services/completion_service.rs
├─ CompletionClient (trait)          ← interface utilisée par l'orchestrateur
├─ OpenRouterClient                  ← un seul POST par appel, pas de retry
├─ classify_http_error()             ← statut HTTP → CompletionError
└─ parse_completion_body()           ← erreur provider (même en 200) puis contenu
*/
use std::env;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::config::CompletionConfig;
use crate::errors::CompletionError;

const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

//trait = Interface
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Identifiant du modèle envoyé au provider
    fn model(&self) -> &str;

    /// Envoie une conversation (system + user) et retourne le contenu de la réponse.
    /// Avec `response_format`, le contenu est décodé comme JSON structuré;
    /// sinon il est retourné sous la forme {"content": "<texte>"}.
    async fn complete(
        &self,
        system_message: &str,
        user_message: &str,
        response_format: Option<&Value>,
    ) -> Result<Value, CompletionError>;
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: String,
    referer: String,
    app_title: String,
}

impl OpenRouterClient {
    /// Construit le client à partir de la configuration statique.
    /// La clé API vient de la config, sinon de OPENROUTER_API_KEY.
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        Self::with_env(config, |name| env::var(name).ok())
    }

    /// Comme `new`, avec une lecture de l'environnement fournie par l'appelant
    pub fn with_env(
        config: &CompletionConfig,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| lookup_env(API_KEY_ENV).filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| {
                CompletionError::Configuration(format!(
                    "OpenRouter API key is missing. Provide api_key in configuration or set {}.",
                    API_KEY_ENV
                ))
            })?;

        if config.model.trim().is_empty() {
            return Err(CompletionError::Configuration("Model name is required.".to_string()));
        }

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the OpenRouter client. This should ONLY be used in development!");
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| CompletionError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.api_endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            referer: config.referer.clone(),
            app_title: config.app_title.clone(),
        })
    }

    fn build_request_body(
        &self,
        system_message: &str,
        user_message: &str,
        response_format: Option<&Value>,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_message },
                { "role": "user", "content": user_message }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        if let Some(format) = response_format {
            body["response_format"] = format.clone();
        }

        body
    }

    /// POST unique vers l'endpoint. Retourne le corps brut d'une réponse 2xx.
    async fn send(&self, body: &Value) -> Result<String, CompletionError> {
        debug!(
            model = %self.model,
            temperature = self.temperature,
            max_tokens = self.max_tokens,
            system_message = %truncate_chars(body["messages"][0]["content"].as_str().unwrap_or_default(), 100),
            user_message = %truncate_chars(body["messages"][1]["content"].as_str().unwrap_or_default(), 100),
            structured = body.get("response_format").is_some(),
            "OpenRouter request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header("HTTP-Referer", self.referer.as_str())
            .header("X-Title", self.app_title.as_str())
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let text = response.text().await.map_err(network_error)?;

        debug!(
            status = status.as_u16(),
            body = %truncate_chars(&text, 500),
            "OpenRouter response"
        );

        if status.is_success() {
            Ok(text)
        } else {
            Err(classify_http_error(status.as_u16(), &text))
        }
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_message: &str,
        user_message: &str,
        response_format: Option<&Value>,
    ) -> Result<Value, CompletionError> {
        let body = self.build_request_body(system_message, user_message, response_format);
        let raw = self.send(&body).await?;
        parse_completion_body(&raw, response_format.is_some())
    }
}

fn network_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Network(format!("Network timeout: {}", e))
    } else {
        CompletionError::Network(format!("Network failure: {}", e))
    }
}

/// Mappe un statut HTTP non-2xx sur la taxonomie d'erreurs
pub fn classify_http_error(status: u16, body: &str) -> CompletionError {
    let message = extract_error_message(body);

    match status {
        400 => CompletionError::InvalidRequest(message),
        401 => {
            CompletionError::Authentication("Invalid API key. Please check your OpenRouter credentials.".to_string())
        }
        402 => CompletionError::InsufficientCredits(
            "Insufficient credits. Please add funds to your OpenRouter account.".to_string(),
        ),
        429 => CompletionError::RateLimit("Rate limit exceeded. Please try again later.".to_string()),
        500..=599 => {
            CompletionError::Server(format!("OpenRouter server error ({}). Please try again later.", status))
        }
        _ => CompletionError::Api {
            status: Some(status),
            message,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => parsed["error"]["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string(),
        Err(_) => body.to_string(),
    }
}

/// Mappe une erreur embarquée dans le corps ({"error": {code, message}}).
/// Le code peut être numérique (statut HTTP du provider amont) ou textuel.
fn classify_provider_error(error: &Value) -> CompletionError {
    let message = error["message"]
        .as_str()
        .unwrap_or("Unknown error from provider")
        .to_string();
    let code = &error["code"];

    error!(code = %code, message = %message, "OpenRouter provider error");

    if let Some(status) = code.as_u64() {
        return match status {
            400 => CompletionError::InvalidRequest(message),
            401 => CompletionError::Authentication(message),
            402 => CompletionError::InsufficientCredits(message),
            429 => CompletionError::RateLimit(message),
            500..=599 => CompletionError::Server(format!("Provider error: {}", message)),
            other => CompletionError::Api {
                status: u16::try_from(other).ok(),
                message,
            },
        };
    }

    match code.as_str() {
        Some("invalid_request_error") => CompletionError::InvalidRequest(message),
        Some("authentication_error") => CompletionError::Authentication(message),
        Some("insufficient_credits") | Some("payment_required") => CompletionError::InsufficientCredits(message),
        Some("rate_limit_error") => CompletionError::RateLimit(message),
        Some("server_error") => CompletionError::Server(format!("Provider error: {}", message)),
        _ => CompletionError::Api {
            status: None,
            message: format!("{} ({})", message, code),
        },
    }
}

/// Analyse le corps d'une réponse 2xx
pub fn parse_completion_body(raw: &str, structured: bool) -> Result<Value, CompletionError> {
    let body: Value = serde_json::from_str(raw)
        .map_err(|e| CompletionError::ResponseParse(format!("Failed to parse response: {}", e)))?;

    // Le provider peut signaler une erreur même avec un HTTP 200
    // Un objet vide vaut absence d'erreur
    if let Some(error) = body
        .get("error")
        .filter(|e| !e.is_null() && e.as_object().is_none_or(|o| !o.is_empty()))
    {
        return Err(classify_provider_error(error));
    }

    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            error!(body = %truncate_chars(raw, 500), "No content in OpenRouter response");
            CompletionError::ResponseParse("No content in API response".to_string())
        })?;

    if structured {
        serde_json::from_str(content)
            .map_err(|e| CompletionError::ResponseParse(format!("Failed to parse response: {}", e)))
    } else {
        Ok(json!({ "content": content }))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
