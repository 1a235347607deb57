//! Application configuration.
//!
//! Loaded from an optional YAML file, then overridden by environment variables prefixed with
//! `BLOG_`. Nested values use a double underscore, e.g. `BLOG_AUTH__TOKEN_TTL=1h`.

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// CLI args for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BLOG_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Directory holding the JSON data files. Unset keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// HMAC key used to sign bearer tokens
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// `iss` claim of issued tokens
    pub issuer: String,
    /// `aud` claim of issued tokens
    pub audience: String,
    /// Lifetime of an issued token
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    /// bcrypt work factor for password hashes
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4141,
            data_dir: Some(PathBuf::from("data")),
            secret_key: None,
            auth: AuthConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "blog-service".to_string(),
            audience: "blog-service-clients".to_string(),
            token_ttl: Duration::from_secs(12 * 60 * 60),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("BLOG_").split("__").ignore(&["config"]))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.secret_key.as_deref().map_or(true, str::is_empty) {
            return Err("secret_key is required. Set BLOG_SECRET_KEY or add secret_key to the config file.".to_string());
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(format!("auth.bcrypt_cost must be between 4 and 31, got {}", self.auth.bcrypt_cost));
        }
        if self.auth.token_ttl.is_zero() {
            return Err("auth.token_ttl must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The signing key. Only valid after [`Config::validate`] has passed.
    pub fn secret(&self) -> &str {
        self.secret_key.as_deref().unwrap_or_default()
    }
}
