//! Configuration for the content server
//!
//! Every setting comes from a `CONTENT_*` environment variable. The data
//! directory follows this precedence:
//! 1. CONTENT_DATA_DIR environment variable
//! 2. ~/.local/share/community-content (production default)
//! 3. ./data (fallback for development)

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::http::AuthPolicy;
use crate::persistence::BackendKind;
use crate::versioning::VersioningConfig;

const DEFAULT_DATA_DIR: &str = ".local/share/community-content";
const DEV_DATA_DIR: &str = "./data";
const DEFAULT_BIND: &str = "127.0.0.1:3001";
const DEFAULT_MAX_UPLOAD_MB: usize = 50;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("{var} must be set when CONTENT_AUTH={scheme}")]
    MissingSecret {
        var: &'static str,
        scheme: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub backend: BackendKind,
    pub database_path: PathBuf,
    pub bind: SocketAddr,
    /// Set when collection files should be committed to git.
    pub versioning: Option<VersioningConfig>,
    pub auth: AuthPolicy,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = match (var("CONTENT_DATA_DIR"), var("HOME")) {
            (Some(dir), _) => PathBuf::from(dir),
            (None, Some(home)) => PathBuf::from(home).join(DEFAULT_DATA_DIR),
            (None, None) => PathBuf::from(DEV_DATA_DIR),
        };

        let upload_dir = var("CONTENT_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("uploads"));

        let backend = match var("CONTENT_BACKEND") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                var: "CONTENT_BACKEND",
                reason,
            })?,
            None => BackendKind::default(),
        };

        let database_path = var("CONTENT_DATABASE_URL")
            .map(|url| database_path_from_url(&url))
            .unwrap_or_else(|| data_dir.join("content.db"));

        let bind_raw = var("CONTENT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|e| ConfigError::Invalid {
            var: "CONTENT_BIND",
            reason: format!("{bind_raw:?}: {e}"),
        })?;

        let versioning = match var("CONTENT_GIT_REPO") {
            Some(repo) => Some(VersioningConfig {
                repo: PathBuf::from(repo),
                push: parse_flag("CONTENT_GIT_PUSH", var("CONTENT_GIT_PUSH"))?,
            }),
            None => None,
        };

        let auth = auth_policy(&var)?;

        let max_upload_mb = match var("CONTENT_MAX_UPLOAD_MB") {
            Some(v) => v.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                var: "CONTENT_MAX_UPLOAD_MB",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        Ok(Self {
            data_dir,
            upload_dir,
            backend,
            database_path,
            bind,
            versioning,
            auth,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn parse_flag(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                reason: format!("expected true or false, got {v:?}"),
            }),
        },
    }
}

fn auth_policy(var: &impl Fn(&str) -> Option<String>) -> Result<AuthPolicy, ConfigError> {
    let scheme = var("CONTENT_AUTH").unwrap_or_else(|| "bearer".to_string());
    let secret = |name: &'static str, scheme: &'static str| {
        var(name).ok_or(ConfigError::MissingSecret { var: name, scheme })
    };

    match scheme.trim().to_ascii_lowercase().as_str() {
        "basic" => Ok(AuthPolicy::Basic {
            user: secret("CONTENT_AUTH_USER", "basic")?,
            password: secret("CONTENT_AUTH_PASSWORD", "basic")?,
        }),
        "bearer" => Ok(AuthPolicy::Bearer {
            token: secret("CONTENT_AUTH_TOKEN", "bearer")?,
        }),
        "admin-email" => Ok(AuthPolicy::AdminEmail {
            email: secret("CONTENT_ADMIN_EMAIL", "admin-email")?,
        }),
        "none" => Ok(AuthPolicy::Open),
        other => Err(ConfigError::Invalid {
            var: "CONTENT_AUTH",
            reason: format!("unknown scheme {other:?} (expected basic, bearer, admin-email or none)"),
        }),
    }
}
