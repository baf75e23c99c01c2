use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Selects which host redirect URLs handed to the billing provider point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unknown environment '{other}' (expected development or production)"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub secret_key: String,
    pub price_id: String,
    pub api_base: String,
}

impl BillingConfig {
    #[must_use]
    pub fn new(secret_key: impl Into<String>, price_id: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            price_id: price_id.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Connection string for the store, e.g. "sqlite://./data/quire.db".
    pub database_url: String,
    pub environment: Environment,
    /// Public base URL in production (e.g., "https://blog.example.com").
    /// Development always uses http://localhost:<port>.
    pub public_base_url: Option<String>,
    pub billing: BillingConfig,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Checks that every required value is present.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("database url is required".to_string()));
        }
        if self.billing.secret_key.trim().is_empty() {
            return Err(Error::Config("billing secret key is required".to_string()));
        }
        if self.billing.price_id.trim().is_empty() {
            return Err(Error::Config("billing price id is required".to_string()));
        }
        self.redirect_base_url().map(|_| ())
    }

    /// Base URL that billing-provider redirects return to.
    pub fn redirect_base_url(&self) -> Result<String> {
        match self.environment {
            Environment::Development => Ok(format!("http://localhost:{}", self.port)),
            Environment::Production => self
                .public_base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    Error::Config("public base url is required in production".to_string())
                }),
        }
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_url: String::new(),
            environment: Environment::Development,
            public_base_url: None,
            billing: BillingConfig::new("", ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> ServerConfig {
        ServerConfig {
            database_url: "sqlite://./data/quire.db".to_string(),
            billing: BillingConfig::new("sk_test_123", "price_123"),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("DEV".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_development_redirects_to_localhost() {
        let config = configured();
        assert!(config.validate().is_ok());
        assert_eq!(config.redirect_base_url().unwrap(), "http://localhost:3000");
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_production_requires_public_url() {
        let mut config = configured();
        config.environment = Environment::Production;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.public_base_url = Some("https://blog.example.com/".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.redirect_base_url().unwrap(),
            "https://blog.example.com"
        );
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_missing_billing_values_are_rejected() {
        assert!(matches!(
            ServerConfig::default().validate(),
            Err(Error::Config(_))
        ));

        let mut config = configured();
        config.billing.price_id = " ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        let mut config = configured();
        config.database_url = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(m)) if m.contains("database url")));
    }
}
