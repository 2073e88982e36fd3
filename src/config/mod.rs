use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server URL; `None` selects the in-memory store
    pub url: Option<String>,
    pub max_connections: u32,
    pub database_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub token_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    pub indent_json: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_SHUTDOWN_TIMEOUT_SECS") {
            self.server.shutdown_timeout_secs = v.parse().unwrap_or(self.server.shutdown_timeout_secs);
        }
        if let Ok(v) = env::var("SERVER_BODY_LIMIT_BYTES") {
            self.server.body_limit_bytes = v.parse().unwrap_or(self.server.body_limit_bytes);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_NAME") {
            self.database.database_name = v;
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_PRIVATE_KEY_PATH") {
            self.security.private_key_path = v;
        }
        if let Ok(v) = env::var("SECURITY_PUBLIC_KEY_PATH") {
            self.security.public_key_path = v;
        }
        if let Ok(v) = env::var("SECURITY_TOKEN_EXPIRY_HOURS") {
            self.security.token_expiry_hours = v.parse().unwrap_or(self.security.token_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Renderer overrides
        if let Ok(v) = env::var("RENDERER_INDENT_JSON") {
            self.renderer.indent_json = v.parse().unwrap_or(self.renderer.indent_json);
        }

        self
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "server.shutdown_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "server.body_limit_bytes",
                reason: "must be greater than zero".into(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "database.max_connections",
                reason: "must be greater than zero".into(),
            });
        }
        if self.security.token_expiry_hours == 0 {
            return Err(ConfigError::Invalid {
                field: "security.token_expiry_hours",
                reason: "must be greater than zero".into(),
            });
        }
        if self.security.private_key_path.is_empty() || self.security.public_key_path.is_empty() {
            return Err(ConfigError::Invalid {
                field: "security.private_key_path",
                reason: "signing key paths must be set".into(),
            });
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
                shutdown_timeout_secs: 5,
                body_limit_bytes: 10 * 1024 * 1024, // 10MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                database_name: "slumber_dev".to_string(),
            },
            security: SecurityConfig {
                private_key_path: "keys/demo.rsa".to_string(),
                public_key_path: "keys/demo.rsa.pub".to_string(),
                token_expiry_hours: 72,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            renderer: RendererConfig { indent_json: true },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
                shutdown_timeout_secs: 15,
                body_limit_bytes: 5 * 1024 * 1024, // 5MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                database_name: "slumber_staging".to_string(),
            },
            security: SecurityConfig {
                private_key_path: "keys/staging.rsa".to_string(),
                public_key_path: "keys/staging.rsa.pub".to_string(),
                token_expiry_hours: 72,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            renderer: RendererConfig { indent_json: false },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
                shutdown_timeout_secs: 30,
                body_limit_bytes: 2 * 1024 * 1024, // 2MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                database_name: "slumber".to_string(),
            },
            security: SecurityConfig {
                private_key_path: "/etc/slumber-api/keys/server.rsa".to_string(),
                public_key_path: "/etc/slumber-api/keys/server.rsa.pub".to_string(),
                token_expiry_hours: 72,
                enable_cors: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            renderer: RendererConfig { indent_json: false },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.database.url.is_none());
        assert_eq!(config.security.token_expiry_hours, 72);
        assert!(config.renderer.indent_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.renderer.indent_json);
        assert!(!config.security.enable_cors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = AppConfig::development();
        config.server.shutdown_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "server.shutdown_timeout_secs", .. })
        ));
    }
}
