//! Runtime settings shared by the handlers.

use std::path::PathBuf;

use chrono::TimeDelta;
use thiserror::Error;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SECRET_KEY must be at least {MIN_SECRET_LEN} bytes (got {0})")]
    SecretTooShort(usize),

    #[error("token lifetime must be between 1 and {MAX_TOKEN_TTL_MINUTES} minutes (got {0})")]
    InvalidTtl(i64),
}

/// Token signing configuration. The secret has no default.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    token_ttl: TimeDelta,
}

impl AuthConfig {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_minutes: i64) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort(secret.len()));
        }
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(ConfigError::InvalidTtl(ttl_minutes));
        }
        let token_ttl =
            TimeDelta::try_minutes(ttl_minutes).ok_or(ConfigError::InvalidTtl(ttl_minutes))?;
        Ok(Self { secret, token_ttl })
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn token_ttl(&self) -> TimeDelta {
        self.token_ttl
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Filesystem locations and CORS policy.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Directory holding `results_<stamp>.txt` evaluation reports.
    pub evaluation_dir: PathBuf,
    /// Fine-tuned model directory (for the `model_info.json` sidecar).
    pub model_path: PathBuf,
    /// Allowed CORS origins. Empty disables cross-origin access.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            evaluation_dir: PathBuf::from("evaluation"),
            model_path: PathBuf::from("model/fine_tuned_model"),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Local frontend dev servers.
pub fn default_cors_origins() -> Vec<String> {
    ["http://localhost:3000", "http://localhost:5173"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_rejected() {
        let err = AuthConfig::new("too-short", 30).unwrap_err();
        assert!(matches!(err, ConfigError::SecretTooShort(9)));
    }

    #[test]
    fn non_positive_ttl_rejected() {
        let err = AuthConfig::new([7u8; 32].to_vec(), 0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTtl(0)));
    }

    #[test]
    fn oversized_ttl_rejected() {
        let secret = "k".repeat(40);
        for minutes in [MAX_TOKEN_TTL_MINUTES + 1, 1_000_000_000_000, i64::MAX] {
            let err = AuthConfig::new(secret.clone(), minutes).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidTtl(m) if m == minutes));
        }
        let cfg = AuthConfig::new(secret, MAX_TOKEN_TTL_MINUTES).unwrap();
        assert_eq!(cfg.token_ttl(), TimeDelta::days(365));
    }

    #[test]
    fn debug_hides_secret() {
        let cfg = AuthConfig::new("s".repeat(40), 30).unwrap();
        let out = format!("{cfg:?}");
        assert!(!out.contains("ssss"));
        assert_eq!(cfg.token_ttl(), TimeDelta::minutes(30));
    }

    #[test]
    fn origins_split_and_trimmed() {
        assert_eq!(
            parse_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(parse_origins("").is_empty());
    }
}
