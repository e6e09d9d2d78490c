/*
 * Responsibility
 * - load and validate all runtime configuration from environment variables
 * - fail fast on missing/invalid values (startup only, never at request time)
 */
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Ok(Self::Production),
            Ok("development") | Err(_) => Ok(Self::Development),
            Ok(other) => Err(ConfigError::Invalid {
                name: "APP_ENV",
                reason: format!("unknown environment `{other}`"),
            }),
        }
    }
}

/// Which backend keeps sessions and in-flight login state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreKind {
    Memory,
    Valkey { url: String },
}

/// Frontend URLs the auth handlers redirect to. All derived from
/// `FRONTEND_URL` so a deployment only configures the base once.
#[derive(Debug, Clone)]
pub struct Redirects {
    /// Frontend origin, also the allowed CORS origin.
    pub origin: String,
    pub dashboard: String,
    pub pending_approval: String,
    pub login: String,
}

impl Redirects {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            origin: base.to_string(),
            dashboard: format!("{base}/dashboard"),
            pending_approval: format!("{base}/pending-approval"),
            login: format!("{base}/login"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer: String,
    pub authorize_url: String,
    pub token_url: String,
    pub jwks_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub state_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub env: AppEnv,
    pub database_url: String,
    pub redirects: Redirects,
    pub oidc: OidcConfig,
    pub session_store: SessionStoreKind,
    pub session_ttl: Duration,
    pub default_role: String,
    pub require_approval: bool,
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{e}"),
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = match optional("PORT") {
            None => 3000,
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?,
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let env = AppEnv::from_env()?;
        let database_url = required("DATABASE_URL")?;

        let frontend_url =
            optional("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".into());
        let redirects = Redirects::from_base(&frontend_url);

        let issuer = optional("OIDC_ISSUER").unwrap_or_else(|| "http://localhost:3001".into());
        let issuer_base = issuer.trim_end_matches('/').to_string();
        let oidc = OidcConfig {
            authorize_url: optional("OIDC_AUTHORIZE_URL")
                .unwrap_or_else(|| format!("{issuer_base}/authorize")),
            token_url: optional("OIDC_TOKEN_URL")
                .unwrap_or_else(|| format!("{issuer_base}/token")),
            jwks_url: optional("OIDC_JWKS_URL")
                .unwrap_or_else(|| format!("{issuer_base}/jwks.json")),
            client_id: optional("OIDC_CLIENT_ID").unwrap_or_else(|| "my-dummy-client-id".into()),
            client_secret: optional("OIDC_CLIENT_SECRET")
                .unwrap_or_else(|| "my-dummy-client-secret".into()),
            redirect_uri: optional("OIDC_REDIRECT_URI")
                .unwrap_or_else(|| format!("http://localhost:{port}/auth/openid/callback")),
            scopes: "openid profile email".into(),
            state_ttl: Duration::from_secs(parse_u64("STATE_TTL_SECONDS", 600)?),
            issuer,
        };

        let session_store = match optional("SESSION_STORE").as_deref() {
            None | Some("memory") => SessionStoreKind::Memory,
            Some("valkey") => SessionStoreKind::Valkey {
                url: required("VALKEY_URL")?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_STORE",
                    reason: format!("unknown backend `{other}` (expected memory|valkey)"),
                });
            }
        };

        let session_ttl = Duration::from_secs(parse_u64("SESSION_TTL_SECONDS", 604_800)?);

        let default_role = optional("DEFAULT_ROLE").unwrap_or_else(|| "User".into());

        let require_approval = match optional("REQUIRE_APPROVAL").as_deref() {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "REQUIRE_APPROVAL",
                    reason: format!("expected true|false, got `{other}`"),
                });
            }
        };

        Ok(Self {
            addr,
            env,
            database_url,
            redirects,
            oidc,
            session_store,
            session_ttl,
            default_role,
            require_approval,
        })
    }

    pub fn secure_cookies(&self) -> bool {
        self.env == AppEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_derive_from_base_and_trim_trailing_slash() {
        let r = Redirects::from_base("http://localhost:5173/");
        assert_eq!(r.origin, "http://localhost:5173");
        assert_eq!(r.dashboard, "http://localhost:5173/dashboard");
        assert_eq!(r.pending_approval, "http://localhost:5173/pending-approval");
        assert_eq!(r.login, "http://localhost:5173/login");
    }
}
