use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub review_db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub admin_key: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("BIDTECH_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BIDTECH_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("BIDTECH_HOST", "0.0.0.0");
        let port: u16 = var("BIDTECH_PORT", "5000")
            .parse()
            .context("BIDTECH_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("BIDTECH_HOST must be an IP address")?;

        let ttl_days: i64 = var("BIDTECH_TOKEN_TTL_DAYS", "7")
            .parse()
            .context("BIDTECH_TOKEN_TTL_DAYS must be a whole number of days")?;
        if ttl_days <= 0 {
            bail!("BIDTECH_TOKEN_TTL_DAYS must be positive");
        }

        Ok(Self {
            addr,
            db_path: var("BIDTECH_DB_PATH", "bidtech.db").into(),
            review_db_path: var("BIDTECH_REVIEW_DB_PATH", "bidtech-reviews.db").into(),
            jwt_secret,
            token_ttl: chrono::Duration::days(ttl_days),
            admin_key: get("BIDTECH_ADMIN_KEY").filter(|k| !k.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("BIDTECH_JWT_SECRET", "s3cret-for-tests")]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("bidtech.db"));
        assert_eq!(cfg.review_db_path, PathBuf::from("bidtech-reviews.db"));
        assert_eq!(cfg.token_ttl, chrono::Duration::days(7));
        assert!(cfg.admin_key.is_none());
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("BIDTECH_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("BIDTECH_JWT_SECRET", "s3cret-for-tests"),
            ("BIDTECH_HOST", "127.0.0.1"),
            ("BIDTECH_PORT", "8080"),
            ("BIDTECH_TOKEN_TTL_DAYS", "1"),
            ("BIDTECH_ADMIN_KEY", "ops"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.token_ttl, chrono::Duration::days(1));
        assert_eq!(cfg.admin_key.as_deref(), Some("ops"));

        assert!(config(&[("BIDTECH_JWT_SECRET", "x"), ("BIDTECH_PORT", "http")]).is_err());
        assert!(config(&[("BIDTECH_JWT_SECRET", "x"), ("BIDTECH_TOKEN_TTL_DAYS", "0")]).is_err());
    }
}
