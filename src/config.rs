//! Configuration manager for Janua.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Signing keys are derived from `secret_key`; anything shorter is refused
/// at startup.
pub const MIN_SECRET_KEY_LENGTH: usize = 32;

fn default_port() -> u16 {
    8000
}

fn default_success_redirect() -> String {
    "/".to_owned()
}

fn default_access_token_ttl() -> u64 {
    900 // 15 minutes.
}

fn default_refresh_token_ttl() -> u64 {
    86_400 // 1 day.
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Public URL of current instance. Also the token issuer.
    pub url: String,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Signs tokens and session cookies. At least 32 bytes.
    #[serde(default, skip_serializing)]
    pub secret_key: String,
    /// Where browsers land after login and registration.
    #[serde(default = "default_success_redirect")]
    pub success_redirect: String,
    /// Access token validity window, in seconds.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
    /// Refresh token validity window, in seconds.
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to database configuration.
    #[serde(skip_serializing)]
    pub database: Option<Database>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: String::default(),
            url: String::default(),
            port: default_port(),
            secret_key: String::default(),
            success_redirect: default_success_redirect(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            version: String::default(),
            path: PathBuf::default(),
            database: None,
            argon2: None,
        }
    }
}

/// Database configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Database {
    /// Connection URL. `postgres://…` in production, `sqlite://…` for
    /// development.
    pub url: String,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH).to_path_buf();
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &default_path
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                // normalize URLs.
                config.url = self.normalize_url(&config.url)?;

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }

    /// Cheap argon2 parameters and a fixed secret, for tests only.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            name: "janua".to_owned(),
            url: "http://localhost:8000/".to_owned(),
            secret_key: "0123456789abcdef0123456789abcdef0123456789abcdef"
                .to_owned(),
            argon2: Some(Argon2 {
                memory_cost: 8 * 1024,
                iterations: 1,
                parallelism: 1,
                hash_length: 32,
            }),
            ..Default::default()
        }
    }
}
