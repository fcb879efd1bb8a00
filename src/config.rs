use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub identity: IdentityConfig,
    #[validate(nested)]
    pub credits: CreditsConfig,
    pub application: ApplicationConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    #[validate(range(min = 1024))]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub url: String,
}

/// External identity provider (auth service exposing `GET /auth/v1/user`)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentityConfig {
    #[validate(url)]
    pub base_url: String,
    pub api_key: String,
    /// Deadline for verifying one token; the ledger call is never cut short
    #[validate(range(min = 100))]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreditsConfig {
    /// Upper bound (inclusive) on credits a single request may consume
    #[validate(range(min = 1))]
    pub max_amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    pub environment: Environment,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl ApplicationConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // config.yml is optional; serverless deployments usually configure through env only
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.max_body_bytes", 1024 * 1024)?
            .set_default("identity.timeout_ms", 10_000)?
            .set_default("credits.max_amount", 10)?
            .set_default("application.environment", "production")?
            .set_default("application.log_format", "text")?
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("PIXELIFT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_body_bytes: 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/pixelift".to_string(),
            },
            identity: IdentityConfig {
                base_url: "https://auth.example.com".to_string(),
                api_key: "anon-key".to_string(),
                timeout_ms: 5_000,
            },
            credits: CreditsConfig { max_amount: 10 },
            application: ApplicationConfig {
                environment: Environment::Development,
                log_format: LogFormat::Text,
            },
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_url_identity_base() {
        let mut config = valid_config();
        config.identity.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_max_amount() {
        let mut config = valid_config();
        config.credits.max_amount = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_parsing() {
        let app: ApplicationConfig =
            serde_json::from_value(serde_json::json!({ "environment": "production" })).unwrap();
        assert!(app.is_production());
        assert_eq!(app.log_format, LogFormat::Text);
    }

    // Only test touching PIXELIFT__* variables, so the env mutations do not race
    #[test]
    fn test_load_from_environment() {
        std::env::set_var("PIXELIFT__DATABASE__URL", "postgres://localhost/pixelift_test");
        std::env::set_var("PIXELIFT__IDENTITY__BASE_URL", "http://127.0.0.1:54321");
        std::env::set_var("PIXELIFT__IDENTITY__API_KEY", "test-anon-key");
        std::env::remove_var("PIXELIFT__CREDITS__MAX_AMOUNT");

        let config = Config::load().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert_eq!(config.identity.timeout_ms, 10_000);
        assert_eq!(config.identity.api_key, "test-anon-key");
        assert_eq!(config.credits.max_amount, 10);
        assert!(config.application.is_production());
        assert_eq!(config.application.log_format, LogFormat::Text);

        std::env::set_var("PIXELIFT__CREDITS__MAX_AMOUNT", "25");
        std::env::set_var("PIXELIFT__APPLICATION__ENVIRONMENT", "development");

        let config = Config::load().unwrap();
        assert_eq!(config.credits.max_amount, 25);
        assert!(!config.application.is_production());

        std::env::set_var("PIXELIFT__CREDITS__MAX_AMOUNT", "0");
        assert!(Config::load().is_err());

        for key in [
            "PIXELIFT__DATABASE__URL",
            "PIXELIFT__IDENTITY__BASE_URL",
            "PIXELIFT__IDENTITY__API_KEY",
            "PIXELIFT__CREDITS__MAX_AMOUNT",
            "PIXELIFT__APPLICATION__ENVIRONMENT",
        ] {
            std::env::remove_var(key);
        }
    }
}
