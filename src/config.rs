use std::{fmt::Display, str::FromStr};

use anyhow::{bail, Context};
use jsonwebtoken::Algorithm;
use serde::Deserialize;

/// Longest accepted access token lifetime: one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
    pub password_min_length: usize,
    pub http: HttpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                lookup("POSTGRES_USER").unwrap_or_else(|| "app".into()),
                lookup("POSTGRES_PASSWORD").unwrap_or_else(|| "app".into()),
                lookup("POSTGRES_SERVER").unwrap_or_else(|| "db".into()),
                parse_or::<u16, _>(&lookup, "POSTGRES_PORT", 5432)?,
                lookup("POSTGRES_DB").unwrap_or_else(|| "app_db".into()),
            ),
        };

        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let jwt = JwtConfig {
            secret,
            algorithm: parse_algorithm(lookup("JWT_ALGORITHM").as_deref().unwrap_or("HS256"))?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "itembox".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "itembox-users".into()),
            ttl_minutes: parse_or(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
        };
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&jwt.ttl_minutes) {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {MAX_TOKEN_TTL_MINUTES}");
        }

        let hashing = HashingConfig {
            memory_kib: parse_or(&lookup, "HASH_MEMORY_KIB", 19 * 1024)?,
            iterations: parse_or(&lookup, "HASH_ITERATIONS", 2)?,
            parallelism: parse_or(&lookup, "HASH_PARALLELISM", 1)?,
        };

        let http = HttpConfig {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            jwt,
            hashing,
            password_min_length: parse_or(&lookup, "PASSWORD_MIN_LENGTH", 8)?,
            http,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}")),
    }
}

fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    match raw.to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => bail!("unsupported JWT_ALGORITHM {other:?}; expected HS256, HS384 or HS512"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(cfg.database_url, "postgres://app:app@db:5432/app_db");
        assert_eq!(cfg.jwt.algorithm, Algorithm::HS256);
        assert_eq!(cfg.jwt.ttl_minutes, 30);
        assert_eq!(cfg.password_min_length, 8);
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.db_max_connections, 10);
    }

    #[test]
    fn database_url_wins_over_parts() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://u:p@localhost/x"),
            ("POSTGRES_SERVER", "ignored"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url, "postgres://u:p@localhost/x");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn blank_secret_is_an_error() {
        assert!(AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "  ")])).is_err());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_EXPIRE_MINUTES"));
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for raw in ["0", "-5", "525601", "10000000000"] {
            let err = AppConfig::from_lookup(lookup_from(&[
                ("JWT_SECRET", "s3cret"),
                ("ACCESS_TOKEN_EXPIRE_MINUTES", raw),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("ACCESS_TOKEN_EXPIRE_MINUTES"), "{raw}");
        }

        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "525600"),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt.ttl_minutes, MAX_TOKEN_TTL_MINUTES);
    }

    #[test]
    fn unsupported_algorithm_is_an_error() {
        assert!(AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_ALGORITHM", "RS256"),
        ]))
        .is_err());

        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_ALGORITHM", "hs512"),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt.algorithm, Algorithm::HS512);
    }
}
