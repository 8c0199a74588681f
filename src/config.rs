//! Configuration management for DeepDive.
//!
//! Loads configuration from environment variables (and an optional `.env`
//! file) covering:
//! - HTTP server binding and route prefix
//! - SQLite database location
//! - The external AI microservice and its timeouts
//! - JWT verification, rate limiting and the document renderer

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ai: AiServiceConfig,
    pub auth: AuthConfig,
    pub export: ExportConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub environment: Environment,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AiServiceConfig {
    /// Base URL of the AI microservice, without the `/api/v1` suffix.
    pub base_url: String,
    /// Timeout for workspace tasks, chat and translation calls.
    pub timeout: Duration,
    /// Timeout for report generation.
    pub report_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Renderer for docx/pptx/pdf output. Binary formats are unavailable when unset.
    pub renderer_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Length of one quota window.
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub model_ttl: Duration,
}

/// Deployment environment. Error stacks are only exposed in development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "4000").parse().unwrap_or(4000),
                api_prefix: normalize_prefix(&env_or("API_PREFIX", "/api/v1")),
                environment: env_or("APP_ENV", "production")
                    .parse()
                    .unwrap_or(Environment::Production),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/deepdive.db"),
            },
            ai: AiServiceConfig {
                base_url: env_or("AI_SERVICE_URL", "http://localhost:5000")
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_millis(
                    env_or("AI_SERVICE_TIMEOUT", "60000").parse().unwrap_or(60_000),
                ),
                report_timeout: Duration::from_millis(
                    env_or("AI_REPORT_TIMEOUT", "120000").parse().unwrap_or(120_000),
                ),
            },
            auth: AuthConfig {
                jwt_secret: env_or("JWT_SECRET", "deepdive-secret-key-change-in-production"),
            },
            export: ExportConfig {
                renderer_url: env::var("DOCUMENT_RENDERER_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
            rate_limit: RateLimitConfig {
                enabled: env_or("RATE_LIMIT_ENABLED", "true").parse().unwrap_or(true),
                window: Duration::from_secs(
                    env_or("RATE_LIMIT_WINDOW_SECS", "60").parse().unwrap_or(60),
                ),
            },
            cache: CacheConfig {
                model_ttl: Duration::from_secs(
                    env_or("MODEL_CACHE_TTL_SECS", "300").parse().unwrap_or(300),
                ),
            },
        }
    }

    /// Configuration for tests: in-memory database, no rate limiting and a
    /// fixed JWT secret. Point `ai.base_url` at a mock server as needed.
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                api_prefix: "/api/v1".to_string(),
                environment: Environment::Test,
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
            },
            ai: AiServiceConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                timeout: Duration::from_secs(5),
                report_timeout: Duration::from_secs(5),
            },
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
            },
            export: ExportConfig { renderer_url: None },
            rate_limit: RateLimitConfig {
                enabled: false,
                window: Duration::from_secs(60),
            },
            cache: CacheConfig {
                model_ttl: Duration::from_secs(300),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
