// ============================================================================
// CONFIGURATION
// ============================================================================
//
// Description:
//   Chargée une seule fois au démarrage (après dotenv) puis passée aux
//   services. Aucun service ne relit l'environnement par la suite, sauf le
//   repli OPENROUTER_API_KEY du client de complétion.
//
// Variables:
//   - DATABASE_URL (obligatoire)
//   - APP_HOST / APP_PORT
//   - JWT_SECRET
//   - OPENROUTER_* : voir CompletionConfig
//
// ============================================================================

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::errors::ConfigError;

pub const DEFAULT_API_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const INSECURE_JWT_SECRET: &str = "default-insecure-key-change-this";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub completion: CompletionConfig,
}

/// Secret partagé avec le service d'authentification externe
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Paramètres statiques du client OpenRouter
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_endpoint: String,
    pub model: String,
    /// None => repli sur la variable OPENROUTER_API_KEY à la construction du client
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Développement uniquement
    pub accept_invalid_certs: bool,
    pub referer: String,
    pub app_title: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
            referer: "https://flashcards.app".to_string(),
            app_title: "Flashcards App".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not found in .env, using default (INSECURE)");
            INSECURE_JWT_SECRET.to_string()
        });

        Ok(Self {
            database_url,
            host: env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("APP_PORT", env::var("APP_PORT").ok(), 8080),
            auth: AuthConfig { jwt_secret },
            completion: CompletionConfig::from_env(),
        })
    }
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            api_endpoint: var("OPENROUTER_API_URL").unwrap_or(defaults.api_endpoint),
            model: var("OPENROUTER_MODEL").unwrap_or(defaults.model),
            api_key: var("OPENROUTER_API_KEY"),
            temperature: parse_or("OPENROUTER_TEMPERATURE", var("OPENROUTER_TEMPERATURE"), defaults.temperature),
            max_tokens: parse_or("OPENROUTER_MAX_TOKENS", var("OPENROUTER_MAX_TOKENS"), defaults.max_tokens),
            connect_timeout: Duration::from_secs(parse_or(
                "OPENROUTER_CONNECT_TIMEOUT_SECS",
                var("OPENROUTER_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            timeout: Duration::from_secs(parse_or(
                "OPENROUTER_TIMEOUT_SECS",
                var("OPENROUTER_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )),
            accept_invalid_certs: parse_or(
                "OPENROUTER_ACCEPT_INVALID_CERTS",
                var("OPENROUTER_ACCEPT_INVALID_CERTS"),
                false,
            ),
            referer: var("OPENROUTER_REFERER").unwrap_or(defaults.referer),
            app_title: var("OPENROUTER_APP_TITLE").unwrap_or(defaults.app_title),
        }
    }
}

/// Parse une valeur optionnelle, retombe sur le défaut si absente ou invalide
fn parse_or<T: FromStr + Copy + std::fmt::Debug>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %value, ?default, "invalid value, using default");
            default
        }),
    }
}
