/*
 * Responsibility
 * - environment-driven settings for the dummy provider
 * - validation of required values (startup fails on bad config)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::{env, fmt};

#[derive(Debug)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    /// Issuer URI embedded in signed ID tokens (`iss` claim).
    pub issuer: String,
    /// Authorization code lifetime (seconds).
    pub code_expiry_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("IDP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("IDP_PORT"))?;

        let issuer =
            env::var("IDP_ISSUER").unwrap_or_else(|_| format!("http://localhost:{}", port));

        let code_expiry_seconds = env::var("IDP_CODE_EXPIRY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        Ok(Config {
            addr,
            issuer,
            code_expiry_seconds,
        })
    }
}
